mod config;

use clap::{ArgAction, Args, Parser, Subcommand};
use daisy_lexer::Scanner;
use daisy_parser::ParserOptions;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "daisy")]
#[command(about = "Daisy template compiler front end")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    options: OptionArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct OptionArgs {
    /// Options file (defaults to ./daisy.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat every matching quote as the end of a quoted attribute value
    #[arg(long, global = true)]
    no_quote_escapes: bool,

    /// Void element name; repeat to replace the default set
    #[arg(long = "void", value_name = "TAG", global = true)]
    void_elements: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream of a template as JSON
    Tokens {
        /// Input template file
        path: String,
    },

    /// Print the parsed AST of a template as JSON
    Ast {
        /// Input template file
        path: String,

        /// Emit compact single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Check a template for errors without printing output
    Check {
        /// Input template files
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match config::load(cli.options.config.as_deref()) {
        Ok(options) => config::Overrides {
            no_quote_escapes: cli.options.no_quote_escapes,
            void_elements: cli.options.void_elements,
        }
        .apply(options),
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Tokens { path } => cmd_tokens(&path, &options),
        Command::Ast { path, compact } => cmd_ast(&path, &options, compact),
        Command::Check { paths } => cmd_check(&paths, &options),
    }
}

/// `RUST_LOG` wins; otherwise `-v` flags pick the level, `warn` by default.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json(value: &impl serde::Serialize, compact: bool) {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_tokens(path: &str, options: &ParserOptions) {
    let source = read_source(path);

    match Scanner::tokenize_with(&source, &options.scanner) {
        Ok(tokens) => print_json(&tokens, false),
        Err(e) => {
            eprintln!("{path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_ast(path: &str, options: &ParserOptions, compact: bool) {
    let source = read_source(path);

    match daisy_parser::Parser::parse_with(&source, options) {
        Ok(program) => print_json(&program, compact),
        Err(e) => {
            eprintln!("{path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_check(paths: &[String], options: &ParserOptions) {
    let mut failed = 0;

    for path in paths {
        let source = read_source(path);
        match daisy_parser::Parser::parse_with(&source, options) {
            Ok(program) => {
                info!(path = %path, nodes = program.body.len(), "checked");
                eprintln!("OK: {path}");
            }
            Err(e) => {
                eprintln!("{path}:{}:{}: {e}", e.line(), e.column());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} file(s) failed", paths.len());
        std::process::exit(1);
    }
}
