use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "league-cache")]
#[command(about = "Inspect and manage the league multi-level cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to league-cache.toml when present)
    #[arg(short, long, global = true, env = "LEAGUE_CACHE_CONFIG")]
    pub config: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a cached value (never computes one)
    Get(KeyArgs),
    /// Store a JSON value and notify other instances
    Set(SetArgs),
    /// Remove a key and its version everywhere
    Invalidate(KeyArgs),
    /// Show the version tracked for a cached key
    Version(KeyArgs),
    /// Print invalidation messages as they arrive
    Watch,
    /// Show cache mode, remote health and statistics
    Status,
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache key (e.g. season:5:table)
    pub key: String,
}

#[derive(clap::Args)]
pub struct SetArgs {
    /// Cache key (e.g. season:5:table)
    pub key: String,
    /// Value as JSON (e.g. '[{"clubId":1,"points":10}]')
    pub value: String,
    /// Expire the remote copy after this many seconds
    #[arg(long)]
    pub ttl: Option<u64>,
}
