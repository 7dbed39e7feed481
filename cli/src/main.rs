mod render;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use engine::{EngineConfig, EvalState, Scratch, Store, StoreError, Worker, run_script, segment};

const SUBCOMMANDS: &[&str] = &["run", "watch", "help"];

#[derive(Parser)]
#[command(name = "rill", version, about = "Incremental research-script evaluator")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Engine settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a script once and print its displays
    Run(RunArgs),

    /// Re-evaluate a script whenever its file changes
    Watch(WatchArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Script file to evaluate
    file: String,

    /// Evaluate this selection against the script's final scope
    #[arg(short, long)]
    selection: Option<String>,

    /// Read the selection from a file
    #[arg(long, conflicts_with = "selection")]
    selection_file: Option<PathBuf>,

    /// Parse only, don't evaluate (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed AST
    #[arg(long)]
    ast: bool,

    /// List the segmented code blocks with their line ranges
    #[arg(long)]
    blocks: bool,

    /// Print displays as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct WatchArgs {
    /// Script file to watch and evaluate
    file: String,

    /// Print displays as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "run" so `rill script.rl` works like
    // `rill run script.rl`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            if let Some(pos) = args.iter().position(|a| *a == first_pos) {
                args.insert(pos, "run".to_string());
            }
        }
    }

    let cli = Cli::parse_from(&args);
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Command::Run(run_args) => do_run(run_args, &config, cli.no_color),
        Command::Watch(watch_args) => do_watch(watch_args, &config),
    }
}

fn load_config(path: Option<&Path>) -> EngineConfig {
    let Some(path) = path else {
        return EngineConfig::default();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: cannot read '{}': {}", path.display(), err);
            process::exit(1);
        }
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: invalid config '{}': {}", path.display(), err);
            process::exit(1);
        }
    }
}

fn read_source(file: &str) -> String {
    match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read '{}': {}", file, err);
            process::exit(1);
        }
    }
}

fn scratch_for(config: &EngineConfig) -> Scratch {
    let result = match &config.scratch_dir {
        Some(dir) => Scratch::new(dir),
        None => Scratch::in_temp_dir(),
    };
    match result {
        Ok(scratch) => scratch,
        Err(err) => {
            eprintln!("error: cannot create scratch directory: {}", err);
            process::exit(1);
        }
    }
}

fn do_run(args: RunArgs, config: &EngineConfig, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = read_source(&args.file);

    if args.check || args.ast {
        // Set up codespan file database for parse diagnostics
        let mut files = SimpleFiles::new();
        let file_id = files.add(args.file.clone(), source.clone());
        let script = match rill::Parser::new(source.clone(), file_id).parse() {
            Ok(script) => script,
            Err(error) => {
                let writer = StandardStream::stderr(color_choice);
                let term_config = term::Config::default();
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(
                    &mut writer.lock(),
                    &term_config,
                    &files,
                    &diagnostic,
                );
                process::exit(1);
            }
        };
        if args.ast {
            println!("{:#?}", script);
        } else {
            eprintln!("ok: {} parsed successfully", args.file);
        }
        return;
    }

    if args.blocks {
        match segment(&source) {
            Ok(blocks) => {
                for block in blocks {
                    let (start, end) = block.line_range;
                    let preview = block.text.lines().next().unwrap_or("");
                    println!("lines [{}, {}): {}", start, end, preview);
                }
            }
            Err(err) => {
                eprintln!("{}", err.trace);
                process::exit(1);
            }
        }
        return;
    }

    let selection = match (&args.selection, &args.selection_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                eprintln!("error: cannot read '{}': {}", path.display(), err);
                process::exit(1);
            }
        },
        (None, None) => None,
    };

    let scratch = scratch_for(config);
    let outcome = run_script(&source, selection.as_deref(), &scratch);

    match outcome.error {
        Some(trace) => {
            eprintln!("{}", trace);
            process::exit(1);
        }
        None => print_displays(&outcome.displays, args.json),
    }
}

fn print_displays(displays: &[engine::Display], json: bool) {
    if json {
        match serde_json::to_string_pretty(displays) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                eprintln!("error: cannot serialize displays: {}", err);
                process::exit(1);
            }
        }
    } else {
        println!("{}", render::render_displays(displays));
    }
}

fn report(result: Result<(), StoreError>) {
    if let Err(err) = result {
        eprintln!("error: {}", err);
    }
}

fn mtime(file: &str) -> Option<SystemTime> {
    std::fs::metadata(file).and_then(|meta| meta.modified()).ok()
}

fn do_watch(args: WatchArgs, config: &EngineConfig) {
    let source = read_source(&args.file);

    let store = Arc::new(Store::new());
    let project = store.create_project("watch");
    let module = match store.create_module(project, args.file.clone(), source) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    };

    let worker = match Worker::new(Arc::clone(&store), config) {
        Ok(worker) => worker,
        Err(err) => {
            eprintln!("error: cannot start worker: {}", err);
            process::exit(1);
        }
    };

    let poll = Duration::from_millis(config.poll_interval_ms);
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| worker.run(&stop));

        // checkpoint, then request the initial evaluation, the same way an
        // editor's execute action does
        report(store.mark_module(module));
        report(store.request(module, None));

        let mut last_mtime = mtime(&args.file);
        let mut last_state = EvalState::Empty;

        loop {
            std::thread::sleep(poll);

            if let Some(current) = mtime(&args.file) {
                if Some(current) != last_mtime {
                    last_mtime = Some(current);
                    match std::fs::read_to_string(&args.file) {
                        Ok(text) => {
                            report(store.update_module(module, text));
                            report(store.mark_module(module));
                            report(store.request(module, None));
                            eprintln!("-- change detected, re-evaluating");
                        }
                        Err(err) => eprintln!("error: cannot read '{}': {}", args.file, err),
                    }
                }
            }

            let ctx = store.context();
            if ctx.state == EvalState::Complete && last_state != EvalState::Complete {
                match &ctx.error {
                    Some(trace) => eprintln!("{}", trace),
                    None => print_displays(&ctx.displays, args.json),
                }
            }
            last_state = ctx.state;
        }
    });
}
