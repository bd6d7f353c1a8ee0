use clap::Parser;
use partwise::cli::{self, Cli, Commands};
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("partwise started with verbosity level: {}", cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => cli::run(args).await,
        Commands::Resume {
            checkpoint,
            dataset,
        } => cli::resume(checkpoint, dataset).await,
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
