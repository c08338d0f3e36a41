// chartpub
// Regenerates chart artifacts and publishes them to a git branch

mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Scheduled chart regeneration and publishing
#[derive(Parser, Debug)]
#[command(name = "chartpub", version, about)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); CHARTPUB_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(commands::run::RunArgs),
    Schedule(commands::schedule::ScheduleArgs),
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Schedule(args) => commands::schedule::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let default = match verbose {
        0 => "warn",
        1 => "warn,publish_service=info,chartpub=info",
        2 => "info,publish_service=debug,chartpub=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("CHARTPUB_LOG").or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
    Ok(())
}
