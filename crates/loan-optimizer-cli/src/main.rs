mod commands;
mod input;
mod output;
mod telemetry;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::allocate::AllocateArgs;
use commands::plan::PlanArgs;

/// Interest-minimising payment plans across multiple loans
#[derive(Parser)]
#[command(
    name = "loanopt",
    version,
    about = "Interest-minimising payment plans across multiple loans",
    long_about = "Allocates a fixed monthly budget across up to ten loans to minimise \
                  total interest, honouring minimum payments and interest deferment, \
                  and amortises the result month by month until every loan is paid off."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimise payments and simulate the full amortisation schedule
    Plan(PlanArgs),
    /// Solve a single month's payment allocation
    Allocate(AllocateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(&cli.log_level) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(2);
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Plan(args) => commands::plan::run_plan(args),
        Commands::Allocate(args) => commands::allocate::run_allocate(args),
        Commands::Version => {
            println!("loanopt {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(if output::is_failure(&value) { 3 } else { 0 });
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
