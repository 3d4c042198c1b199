// File: src/main.rs
//
// CLI entry point for the Wisp interpreter: a `run` subcommand for
// script files and a `repl` subcommand for interactive use (spec §7,
// §10). Exit codes follow the spec's contract: 0 success, 65 compile
// error, 70 runtime error.

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use wisp::{interpret, repl::Repl, RunOutcome};

#[derive(ClapParser)]
#[command(
    name = "wisp",
    about = "Wisp: a small dynamically-typed scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Run a Wisp script file
    Run {
        /// Path to the .wisp file
        file: PathBuf,

        /// Print each instruction and the value stack before it executes
        #[arg(long)]
        trace: bool,

        /// Run the collector before every allocation (slow; for testing the GC)
        #[arg(long)]
        stress_gc: bool,
    },

    /// Launch the interactive Wisp REPL
    Repl {
        #[arg(long)]
        trace: bool,

        #[arg(long)]
        stress_gc: bool,
    },
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v != "0" && !v.is_empty())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, trace, stress_gc } => {
            let trace = trace || env_flag("WISP_TRACE_EXECUTION");
            let stress_gc = stress_gc || env_flag("WISP_GC_STRESS");

            let source = match fs::read_to_string(&file) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Can't read file '{}': {e}", file.display());
                    return ExitCode::from(74);
                }
            };

            match interpret(&source, trace, stress_gc) {
                RunOutcome::Ok => ExitCode::SUCCESS,
                RunOutcome::CompileError(errors) => {
                    for err in &errors {
                        eprintln!("{err}");
                    }
                    ExitCode::from(65)
                }
                RunOutcome::RuntimeError(err) => {
                    eprintln!("{err}");
                    ExitCode::from(70)
                }
            }
        }

        Commands::Repl { trace, stress_gc } => {
            let trace = trace || env_flag("WISP_TRACE_EXECUTION");
            let stress_gc = stress_gc || env_flag("WISP_GC_STRESS");

            match Repl::new(trace, stress_gc) {
                Ok(mut repl) => {
                    if let Err(e) = repl.run() {
                        eprintln!("REPL error: {e}");
                        return ExitCode::FAILURE;
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Failed to start REPL: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
