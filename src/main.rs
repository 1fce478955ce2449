mod commands;

use clap::{Parser, Subcommand};
use commands::{check, serve, test};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "rcontract")]
#[command(author, version, about = "Config-driven mock API server and contract tester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Serve(args) => serve::run(args).await,
            Commands::Test(args) => test::run(args).await,
            Commands::Check(args) => check::run(args).await,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mock HTTP server
    Serve(commands::serve::ServeArgs),

    /// Verify a real server against the configuration
    Test(commands::test::TestArgs),

    /// Validate the configuration and list its resources
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() {
    rustycontract::metrics::init();

    // Initialize tracing subscriber with env filter (e.g. RCONTRACT_LOG=debug)
    let filter = match EnvFilter::try_from_env("RCONTRACT_LOG") {
        Ok(f) => f,
        Err(_) => EnvFilter::new("info"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
