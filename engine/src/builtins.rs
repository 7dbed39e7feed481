use std::collections::BTreeMap;

use crate::display::{Display, ObjectRef};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::Value;

/// Printed values are truncated to this many characters.
pub const PRINT_LIMIT: usize = 10_000;

type BuiltinFn = fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value, RuntimeError>;

/// A native function injected into every script scope.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    /// Human-readable call signature, shown on help cards.
    pub signature: &'static str,
    func: BuiltinFn,
}

impl Builtin {
    pub fn call(
        &self,
        args: Vec<Value>,
        named: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        (self.func)(args, named)
    }
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "plot",
        signature: "plot(*args, title=\"\", **kwargs)",
        func: builtin_plot,
    },
    Builtin {
        name: "print",
        signature: "print(value, title=\"\")",
        func: builtin_print,
    },
    Builtin {
        name: "help",
        signature: "help(value, title=\"\")",
        func: builtin_help,
    },
    Builtin {
        name: "len",
        signature: "len(value)",
        func: builtin_len,
    },
    Builtin {
        name: "range",
        signature: "range(start, stop, step)",
        func: builtin_range,
    },
    Builtin {
        name: "sum",
        signature: "sum(values)",
        func: builtin_sum,
    },
    Builtin {
        name: "min",
        signature: "min(values)",
        func: builtin_min,
    },
    Builtin {
        name: "max",
        signature: "max(values)",
        func: builtin_max,
    },
    Builtin {
        name: "mean",
        signature: "mean(values)",
        func: builtin_mean,
    },
    Builtin {
        name: "abs",
        signature: "abs(n)",
        func: builtin_abs,
    },
    Builtin {
        name: "sqrt",
        signature: "sqrt(n)",
        func: builtin_sqrt,
    },
    Builtin {
        name: "floor",
        signature: "floor(n)",
        func: builtin_floor,
    },
    Builtin {
        name: "ceil",
        signature: "ceil(n)",
        func: builtin_ceil,
    },
    Builtin {
        name: "round",
        signature: "round(n)",
        func: builtin_round,
    },
    Builtin {
        name: "str",
        signature: "str(value)",
        func: builtin_str,
    },
];

/// A fresh environment seeded with the standard injected names. Rebuilt for
/// every whole-script run and shared (not reset) across the blocks within
/// one run.
pub fn standard_environment() -> Environment {
    let mut env = Environment::new();
    for builtin in BUILTINS {
        env.set(builtin.name, Value::Builtin(*builtin));
    }
    env
}

/// Describe a value for a help card. Non-callable values coerce to their
/// runtime type.
pub fn object_ref(value: &Value) -> ObjectRef {
    match value {
        Value::Function(def) => ObjectRef::Function {
            name: def.name.clone(),
            params: def.params.clone(),
        },
        Value::Builtin(builtin) => ObjectRef::Builtin {
            name: builtin.name.to_string(),
            signature: builtin.signature.to_string(),
        },
        other => ObjectRef::Type {
            name: other.type_name().to_string(),
        },
    }
}

pub fn truncate_printed(text: String) -> String {
    if text.len() <= PRINT_LIMIT {
        text
    } else {
        text.chars().take(PRINT_LIMIT).collect()
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn no_named(name: &str, named: &[(String, Value)]) -> Result<(), RuntimeError> {
    match named.first() {
        Some((argument, _)) => Err(RuntimeError::UnknownNamedArgument {
            name: name.to_string(),
            argument: argument.clone(),
        }),
        None => Ok(()),
    }
}

/// Split a `title` named argument off, rejecting any other named argument.
fn take_title(name: &str, named: Vec<(String, Value)>) -> Result<String, RuntimeError> {
    let mut title = String::new();
    for (argument, value) in named {
        if argument == "title" {
            match value {
                Value::Str(text) => title = text,
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "Str title".to_string(),
                        got: other.type_name().to_string(),
                    });
                }
            }
        } else {
            return Err(RuntimeError::UnknownNamedArgument {
                name: name.to_string(),
                argument,
            });
        }
    }
    Ok(title)
}

fn number(name: &str, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::TypeMismatch {
            expected: format!("Number argument to {}()", name),
            got: other.type_name().to_string(),
        }),
    }
}

fn number_list(name: &str, value: &Value) -> Result<Vec<f64>, RuntimeError> {
    match value {
        Value::List(items) => items.iter().map(|v| number(name, v)).collect(),
        other => Err(RuntimeError::TypeMismatch {
            expected: format!("List argument to {}()", name),
            got: other.type_name().to_string(),
        }),
    }
}

fn builtin_plot(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    let mut title = String::new();
    let mut kwargs = BTreeMap::new();
    for (argument, value) in named {
        if argument == "title" {
            match value {
                Value::Str(text) => title = text,
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "Str title".to_string(),
                        got: other.type_name().to_string(),
                    });
                }
            }
        } else {
            kwargs.insert(argument, value.to_json()?);
        }
    }
    let args = args
        .iter()
        .map(Value::to_json)
        .collect::<Result<Vec<_>, _>>()?;
    let plot = Display::Plot {
        args,
        kwargs,
        title,
    };
    Ok(Value::Display(Display::Displays {
        children: vec![plot],
        title: String::new(),
    }))
}

fn builtin_print(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("print", &args, 1)?;
    let title = take_title("print", named)?;
    Ok(Value::Display(Display::Print {
        text: truncate_printed(args[0].to_string()),
        title,
    }))
}

fn builtin_help(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("help", &args, 1)?;
    let title = take_title("help", named)?;
    Ok(Value::Display(Display::Object {
        object: object_ref(&args[0]),
        title,
    }))
}

fn builtin_len(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("len", &args, 1)?;
    no_named("len", &named)?;
    match &args[0] {
        Value::List(items) => Ok(Value::Number(items.len() as f64)),
        Value::Str(text) => Ok(Value::Number(text.chars().count() as f64)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "List or Str argument to len()".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

fn builtin_range(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    no_named("range", &named)?;
    let (start, stop, step) = match args.len() {
        1 => (0.0, number("range", &args[0])?, 1.0),
        2 => (number("range", &args[0])?, number("range", &args[1])?, 1.0),
        3 => (
            number("range", &args[0])?,
            number("range", &args[1])?,
            number("range", &args[2])?,
        ),
        n => {
            return Err(RuntimeError::Custom(format!(
                "range() takes 1 to 3 arguments, got {}",
                n
            )));
        }
    };
    if step == 0.0 {
        return Err(RuntimeError::Custom(
            "range() step must not be zero".to_string(),
        ));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < stop) || (step < 0.0 && current > stop) {
        items.push(Value::Number(current));
        current += step;
    }
    Ok(Value::List(items))
}

fn builtin_sum(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("sum", &args, 1)?;
    no_named("sum", &named)?;
    let values = number_list("sum", &args[0])?;
    Ok(Value::Number(values.iter().sum()))
}

/// `min`/`max` accept either a single list or two-plus numbers.
fn extremum_values(name: &str, args: &[Value]) -> Result<Vec<f64>, RuntimeError> {
    let values = match args {
        [single] => number_list(name, single)?,
        args if args.len() >= 2 => args
            .iter()
            .map(|v| number(name, v))
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(RuntimeError::Custom(format!(
                "{}() expects a list or at least two numbers",
                name
            )));
        }
    };
    if values.is_empty() {
        return Err(RuntimeError::Custom(format!("{}() of an empty list", name)));
    }
    Ok(values)
}

fn builtin_min(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    no_named("min", &named)?;
    let values = extremum_values("min", &args)?;
    Ok(Value::Number(values.iter().copied().fold(f64::INFINITY, f64::min)))
}

fn builtin_max(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    no_named("max", &named)?;
    let values = extremum_values("max", &args)?;
    Ok(Value::Number(
        values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ))
}

fn builtin_mean(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("mean", &args, 1)?;
    no_named("mean", &named)?;
    let values = number_list("mean", &args[0])?;
    if values.is_empty() {
        return Err(RuntimeError::Custom("mean() of an empty list".to_string()));
    }
    Ok(Value::Number(
        values.iter().sum::<f64>() / values.len() as f64,
    ))
}

fn unary_numeric(
    name: &str,
    args: Vec<Value>,
    named: Vec<(String, Value)>,
    f: fn(f64) -> f64,
) -> Result<Value, RuntimeError> {
    expect_arity(name, &args, 1)?;
    no_named(name, &named)?;
    Ok(Value::Number(f(number(name, &args[0])?)))
}

fn builtin_abs(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    unary_numeric("abs", args, named, f64::abs)
}

fn builtin_sqrt(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    unary_numeric("sqrt", args, named, f64::sqrt)
}

fn builtin_floor(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    unary_numeric("floor", args, named, f64::floor)
}

fn builtin_ceil(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    unary_numeric("ceil", args, named, f64::ceil)
}

fn builtin_round(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    unary_numeric("round", args, named, f64::round)
}

fn builtin_str(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    expect_arity("str", &args, 1)?;
    no_named("str", &named)?;
    Ok(Value::Str(args[0].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let builtin = BUILTINS
            .iter()
            .find(|b| b.name == name)
            .expect("unknown builtin");
        builtin.call(args, Vec::new())
    }

    #[test]
    fn plot_wraps_a_single_plot_in_a_display_group() {
        let value = call("plot", vec![Value::Number(1.0), Value::Number(2.0)])
            .expect("plot failed");
        let Value::Display(Display::Displays { children, title }) = value else {
            panic!("expected a display group");
        };
        assert_eq!(title, "");
        assert_eq!(children.len(), 1);
        let Display::Plot { args, .. } = &children[0] else {
            panic!("expected a plot child");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn plot_routes_named_arguments_to_kwargs_except_title() {
        let builtin = BUILTINS.iter().find(|b| b.name == "plot").unwrap();
        let value = builtin
            .call(
                vec![],
                vec![
                    ("title".to_string(), Value::Str("t".to_string())),
                    ("color".to_string(), Value::Str("red".to_string())),
                ],
            )
            .expect("plot failed");
        let Value::Display(Display::Displays { children, .. }) = value else {
            panic!("expected a display group");
        };
        let Display::Plot { kwargs, title, .. } = &children[0] else {
            panic!("expected a plot child");
        };
        assert_eq!(title, "t");
        assert_eq!(kwargs.len(), 1);
        assert!(kwargs.contains_key("color"));
    }

    #[test]
    fn print_truncates_long_text() {
        let long = "x".repeat(PRINT_LIMIT + 500);
        let value = call("print", vec![Value::Str(long)]).expect("print failed");
        let Value::Display(Display::Print { text, .. }) = value else {
            panic!("expected a print display");
        };
        assert_eq!(text.len(), PRINT_LIMIT);
    }

    #[test]
    fn help_coerces_data_values_to_their_type() {
        let value = call("help", vec![Value::Number(1.0)]).expect("help failed");
        let Value::Display(Display::Object { object, .. }) = value else {
            panic!("expected an object display");
        };
        assert_eq!(
            object,
            ObjectRef::Type {
                name: "Number".to_string()
            }
        );
    }

    #[test]
    fn range_matches_python_conventions() {
        let Value::List(items) = call("range", vec![Value::Number(3.0)]).unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Value::Number(0.0));
        assert_eq!(items[2], Value::Number(2.0));
    }

    #[test]
    fn aggregates() {
        let xs = Value::List(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(9.0),
        ]);
        assert_eq!(call("sum", vec![xs.clone()]).unwrap(), Value::Number(12.0));
        assert_eq!(call("min", vec![xs.clone()]).unwrap(), Value::Number(1.0));
        assert_eq!(call("max", vec![xs.clone()]).unwrap(), Value::Number(9.0));
        assert_eq!(call("mean", vec![xs]).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn unknown_named_arguments_are_rejected() {
        let builtin = BUILTINS.iter().find(|b| b.name == "len").unwrap();
        let err = builtin
            .call(
                vec![Value::Str("x".to_string())],
                vec![("bogus".to_string(), Value::Null)],
            )
            .expect_err("should fail");
        assert!(matches!(err, RuntimeError::UnknownNamedArgument { .. }));
    }
}
