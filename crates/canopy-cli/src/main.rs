//! Canopy CLI - language-neutral syntax trees for C# solutions and projects.

mod formatters;
mod run;

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "canopy", version)]
#[command(about = "Parse C# solutions, projects and files into a generic syntax tree", long_about = None)]
struct Cli {
    /// Inputs to analyze (.sln, .csproj, source files or directories)
    ///
    /// Examples:
    ///   canopy App.sln               # Every supported project in the solution
    ///   canopy src/Web/Web.csproj    # One project
    ///   canopy Program.cs            # One file
    ///   canopy a.cs b.cs             # Batch, one envelope per file
    #[arg(
        value_name = "PATHS",
        required_unless_present_any = ["list_analyzers", "show_config"]
    )]
    paths: Vec<PathBuf>,

    /// Write the result to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Maximum number of files parsed at once
    #[arg(short = 'j', long, value_name = "N")]
    max_concurrency: Option<NonZeroUsize>,

    /// Configuration file path (defaults to canopy.toml next to the input)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,

    /// Report files containing syntax errors as parse failures
    #[arg(long)]
    strict: bool,

    /// List registered analyzers and exit
    #[arg(long)]
    list_analyzers: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Verbose logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Summary,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = run::RunOptions {
        paths: cli.paths,
        output: cli.output,
        format: cli.format,
        max_concurrency: cli.max_concurrency,
        config: cli.config,
        compact: cli.compact,
        strict: cli.strict,
        list_analyzers: cli.list_analyzers,
        show_config: cli.show_config,
    };

    match run::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            run::exit_code_for(&err)
        }
    }
}
