use clap::Parser;
use tracing_subscriber::EnvFilter;

use hash_runs::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("hash_runs=debug,info")
    } else {
        EnvFilter::new("hash_runs=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Runs(args) => {
            cli::runs::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Sets(args) => {
            cli::sets::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
