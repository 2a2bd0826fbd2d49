use jsconsole::*;
use std::time::Duration;

#[derive(clap::Parser)]
#[command(name = "js", version, about = "Interactive JavaScript console")]
struct Cli {
    /// Execute script
    #[arg(short, long)]
    eval: Option<String>,

    /// JavaScript file to execute
    file: Option<std::path::PathBuf>,

    /// Abort an evaluation that runs longer than this many milliseconds
    #[arg(long = "timeout-ms", value_name = "N")]
    timeout_ms: Option<u64>,

    /// Refuse any operation with a side effect outside the evaluation
    #[arg(long)]
    dry_run: bool,

    /// Evaluate as strict mode code
    #[arg(long)]
    strict: bool,
}

impl Cli {
    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logger (controlled by RUST_LOG)
    env_logger::init();

    #[cfg(windows)]
    {
        // The evaluator recurses on the native stack; Windows threads default to 1MB.
        let builder = std::thread::Builder::new().stack_size(8 * 1024 * 1024);
        let handler = builder.spawn(run_main)?;
        return handler.join().map_err(|_| "evaluation thread panicked")?;
    }

    #[cfg(not(windows))]
    run_main()
}

fn run_main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = <Cli as clap::Parser>::parse();

    let (script, filename) = if let Some(script) = cli.eval.clone() {
        (script, "<eval>".to_string())
    } else if let Some(ref file) = cli.file {
        match std::fs::read_to_string(file) {
            Ok(content) => (content, file.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file {}: {e}", file.display());
                std::process::exit(1);
            }
        }
    } else {
        // No script argument -> start the interactive, persistent REPL
        run_persistent_repl(&cli)?;
        return Ok(());
    };

    let realm = Realm::new();
    let mut options = EvaluateOptions::default()
        .realm(realm.clone())
        .filename(filename.as_str())
        .strict(cli.strict)
        .throw_on_side_effect(cli.dry_run);
    if let Some(timeout) = cli.timeout() {
        options = options.timeout(timeout);
    }
    let result = evaluate(&script, options).and_then(Evaluation::into_value);
    match result {
        Ok(value) => {
            if let Err(err) = realm.run_event_loop() {
                eprintln!("{err}");
                std::process::exit(1);
            }
            if !matches!(value, Value::Undefined) {
                println!("{}", format_value(&value));
            }
        }
        Err(err) => {
            eprintln!("{err}");
            if let JSError::SyntaxError { line, column, .. } = &err {
                eprintln!("  in file: {filename}:{line}:{column}");
            }
            std::process::exit(1);
        }
    }
    Ok(())
}

// Persistent rustyline-powered REPL loop extracted into a helper to keep `main()` small.
#[allow(clippy::println_empty_string)]
fn run_persistent_repl(cli: &Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use rustyline::Editor;
    use rustyline::error::ReadlineError;
    use std::path::PathBuf;

    let ver = clap::crate_version!();
    println!("jsconsole v{ver}. Type '.exit' or Ctrl-D to quit.");

    let mut rl = match Editor::<(), rustyline::history::FileHistory>::new() {
        Ok(e) => e,
        Err(err) => {
            eprintln!("Failed to initialize line editor: {err}");
            std::process::exit(1);
        }
    };

    let history_path: Option<PathBuf> = std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".jsconsole_history"));
    if let Some(ref p) = history_path
        && let Err(e) = rl.load_history(p)
    {
        log::debug!("no history loaded from {}: {e}", p.display());
    }

    let repl = Repl::new().with_timeout(cli.timeout()).with_strict(cli.strict).with_dry_run(cli.dry_run);

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "> " } else { "... " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty() && (trimmed == "exit" || trimmed == ".exit") {
                    break;
                }

                if buffer.is_empty() {
                    buffer = line;
                } else {
                    buffer.push('\n');
                    buffer.push_str(&line);
                }

                if !Repl::is_complete_input(&buffer) {
                    continue;
                }

                if buffer.trim().is_empty() {
                    buffer.clear();
                    continue;
                }

                rl.add_history_entry(buffer.as_str())?;

                match repl.eval(&buffer) {
                    Ok(val) => println!("{}", format_value(&val)),
                    Err(e) => eprintln!("{e}"),
                }

                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                println!("");
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    if let Some(ref p) = history_path
        && let Err(e) = rl.save_history(p)
    {
        log::warn!("could not save history to {}: {e}", p.display());
    }
    Ok(())
}
