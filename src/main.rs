use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use shark::{Config, Interpreter};

const DEFAULT_SCRIPT: &str = "index.shark";

/// Shark is a small interpreted language for mathematics and statistics.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// Print version.
    #[arg(short = 'v', long, short_alias = 'V', action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Maximum number of nested function calls before a RecursionError.
    #[arg(long, global = true, default_value_t = shark::interpreter::DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs a Shark source file.
    #[command(alias = "init")]
    Run { file: PathBuf },
    /// Starts an interactive session.
    Repl,
    /// Prints the version.
    Version,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run_file(path: &Path, config: Config) -> Result<(), String> {
    let source = fs::read_to_string(path)
        .map_err(|_| format!("File '{}' not found", path.display()))?;

    let mut interpreter = Interpreter::new(config);
    shark::execute_with(&source, &mut interpreter)
        .map(|_| ())
        .map_err(|err| err.to_string())
}

/// A chunk is ready to run once its last line closes a statement or block.
fn is_complete(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.ends_with(';') || line.ends_with('}')
}

fn repl(config: Config) -> Result<(), String> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut chunk = String::new();

    loop {
        print!("{}", if chunk.is_empty() { ">>> " } else { "... " });
        io::stdout().flush().map_err(|err| err.to_string())?;

        let line = match lines.next() {
            Some(line) => line.map_err(|err| err.to_string())?,
            None => break,
        };
        if chunk.is_empty() && line.trim() == "exit" {
            break;
        }

        chunk.push_str(&line);
        chunk.push('\n');
        if !is_complete(&line) {
            continue;
        }

        if !chunk.trim().is_empty() {
            let mut interpreter = Interpreter::new(config.clone());
            if let Err(err) = shark::execute_with(&chunk, &mut interpreter) {
                eprintln!("Error: {}", err);
            }
        }
        chunk.clear();
    }

    println!();
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let config = Config {
        max_call_depth: args.max_depth,
    };

    let result = match args.command {
        Some(Command::Run { file }) => run_file(&file, config),
        Some(Command::Repl) => repl(config),
        Some(Command::Version) => {
            println!("shark {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None if Path::new(DEFAULT_SCRIPT).exists() => run_file(Path::new(DEFAULT_SCRIPT), config),
        None => Err(format!(
            "no '{}' in the current directory; try 'shark run <file>' or 'shark --help'",
            DEFAULT_SCRIPT
        )),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn run_accepts_init_alias() {
        let args = Args::try_parse_from(["shark", "init", "demo.shark", "--max-depth", "5"]).unwrap();
        assert_eq!(args.max_depth, 5);
        assert!(matches!(args.command, Some(Command::Run { file }) if file == Path::new("demo.shark")));
    }

    #[test]
    fn version_spellings() {
        for flag in ["-v", "-V", "--version"] {
            let err = Args::try_parse_from(["shark", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion, "{}", flag);
        }
        let args = Args::try_parse_from(["shark", "version"]).unwrap();
        assert!(matches!(args.command, Some(Command::Version)));
    }

    #[test]
    fn chunk_completion() {
        assert!(is_complete("var x = 1;"));
        assert!(is_complete("}  "));
        assert!(is_complete(""));
        assert!(!is_complete("f(x) => {"));
    }

    #[test]
    fn missing_file_message() {
        let err = run_file(Path::new("definitely/not/here.shark"), Config::default()).unwrap_err();
        assert_eq!(err, "File 'definitely/not/here.shark' not found");
    }
}
