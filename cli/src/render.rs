use engine::{Display, ObjectRef};

/// Plain-text rendering of a display list, one card per display. An
/// observation convenience for the terminal, not a UI layer.
pub fn render_displays(displays: &[Display]) -> String {
    if displays.is_empty() {
        return "(no displays)".to_string();
    }
    let mut out = String::new();
    for (i, display) in displays.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_display(display, 0, &mut out);
    }
    out
}

fn header(title: &str, kind: &str) -> String {
    if title.is_empty() {
        format!("[{}]", kind)
    } else {
        format!("[{}] {}", kind, first_line(title))
    }
}

fn render_display(display: &Display, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match display {
        Display::Print { text, title } => {
            out.push_str(&format!("{}{}\n", pad, header(title, "print")));
            for line in text.lines() {
                out.push_str(&format!("{}  {}\n", pad, line));
            }
        }
        Display::Plot {
            args,
            kwargs,
            title,
        } => {
            out.push_str(&format!("{}{}\n", pad, header(title, "plot")));
            let options = if kwargs.is_empty() {
                "none".to_string()
            } else {
                kwargs.keys().cloned().collect::<Vec<_>>().join(", ")
            };
            out.push_str(&format!(
                "{}  {} series, options: {}\n",
                pad,
                args.len(),
                options
            ));
        }
        Display::Object { object, title } => {
            out.push_str(&format!("{}{}\n", pad, header(title, "help")));
            let line = match object {
                ObjectRef::Function { name, params } => {
                    format!("function {}({})", name, params.join(", "))
                }
                ObjectRef::Builtin { signature, .. } => format!("builtin {}", signature),
                ObjectRef::Type { name } => format!("type {}", name),
            };
            out.push_str(&format!("{}  {}\n", pad, line));
        }
        Display::Displays { children, title } => {
            out.push_str(&format!("{}{}\n", pad, header(title, "group")));
            for child in children {
                render_display(child, indent + 1, out);
            }
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
