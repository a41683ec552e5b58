mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use league_cache::config::loader::load_config;
use output::print_error;

#[tokio::main]
async fn main() {
    // Load .env file if present; it is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    league_cache::init_tracing_with_level(&cli.log_level);

    let config = load_config(cli.config.as_deref())?;

    let cache = || league_cache::create_cache(&config);

    match &cli.command {
        Commands::Get(args) => commands::keys::get(&cache().await, &args.key).await?,
        Commands::Set(args) => {
            commands::keys::set(&cache().await, &args.key, &args.value, args.ttl).await?
        }
        Commands::Invalidate(args) => {
            commands::keys::invalidate(&cache().await, &args.key).await?
        }
        Commands::Version(args) => commands::keys::version(&cache().await, &args.key).await?,
        Commands::Watch => commands::watch::watch(&config).await?,
        Commands::Status => commands::status::status(&cache().await, &config).await?,
    }

    Ok(())
}
