use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod host;

#[derive(Parser)]
#[command(name = "teaready-cli", version, about = "Tea steeping timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tea catalog
    Teas {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start steeping a tea (by name or index)
    Start {
        tea: String,
        /// Override the catalog steep time
        #[arg(long)]
        secs: Option<u16>,
    },
    /// Print the current session as JSON
    Status,
    /// Abandon the current session
    Cancel,
    /// Acknowledge a ready cup
    Dismiss,
    /// Stay in the foreground, deliver wakeups and ring the alerts
    Watch,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TEAREADY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Teas { json } => commands::teas::run(json),
        Commands::Start { tea, secs } => commands::session::start(&tea, secs),
        Commands::Status => commands::session::status(),
        Commands::Cancel => commands::session::cancel(),
        Commands::Dismiss => commands::session::dismiss(),
        Commands::Watch => commands::watch::run(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
