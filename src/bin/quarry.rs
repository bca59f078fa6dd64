//! Binary entry point for the `quarry` script runner.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nu_ansi_term::{Color, Style};
use quarry::cli::{load_rows, output, ConfigError, InputFormat, OutputFormat, QuarryConfig, Script};
use quarry::query::{profile_snapshot, set_profiling};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Run lazy query pipelines over JSON and CSV rows",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "QUARRY_CONFIG",
        help = "Path to quarry.toml (defaults to the platform config dir)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "Input encoding override")]
    input_format: Option<InputFormat>,

    #[arg(long, global = true, value_enum, help = "Output format override")]
    format: Option<OutputFormat>,

    #[arg(long, global = true, help = "Report evaluation counters on stderr")]
    profile: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a script against input rows.
    Run {
        #[arg(long, value_name = "FILE", help = "Script file (.toml or .json)")]
        script: PathBuf,

        #[arg(long, value_name = "FILE", help = "Input rows; stdin when omitted")]
        input: Option<PathBuf>,
    },
    /// Print the operators a script records, without reading input.
    Explain {
        #[arg(long, value_name = "FILE", help = "Script file (.toml or .json)")]
        script: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        report(err.as_ref());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = QuarryConfig::load(cli.config.clone())?;
    init_tracing(config.log_filter());
    if let Some(path) = config.path() {
        debug!(path = %path.display(), "configuration resolved");
    }

    let profiling = cli.profile || config.profile();
    if profiling {
        set_profiling(true);
    }

    match cli.command {
        Command::Run { script, input } => {
            let script = Script::from_path(&script)?;
            let format = cli.input_format.unwrap_or(config.input_format());
            let rows = match input {
                Some(path) => {
                    let file = File::open(&path).map_err(|err| quarry::Error::io_at(&path, err))?;
                    load_rows(file, format)?
                }
                None => load_rows(io::stdin().lock(), format)?,
            };
            let result = script.evaluate(rows)?;
            output::print(&result, cli.format.unwrap_or(config.output_format()))?;
        }
        Command::Explain { script } => {
            let script = Script::from_path(&script)?;
            for kind in script.explain()? {
                println!("{kind}");
            }
        }
    }

    if profiling {
        let snapshot = profile_snapshot();
        eprintln!(
            "profile: traversals={} source_draws={} memo_builds={} buffered_elements={}",
            snapshot.traversals, snapshot.source_draws, snapshot.memo_builds, snapshot.buffered_elements
        );
    }
    Ok(())
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn report(err: &(dyn Error + 'static)) {
    let code = match err.downcast_ref::<quarry::Error>() {
        Some(err) => err.code(),
        None if err.is::<ConfigError>() => "Config",
        None => "Cli",
    };
    let label = format!("error[{code}]");
    if io::stderr().is_terminal() {
        eprintln!("{}: {err}", Color::Red.bold().paint(label));
    } else {
        eprintln!("{}: {err}", Style::new().paint(label));
    }
}
