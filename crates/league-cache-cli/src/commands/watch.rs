use anyhow::{Result, bail};
use colored::Colorize;
use futures_util::StreamExt;
use league_cache::CacheConfig;
use league_cache::cache::InvalidationMessage;

pub async fn watch(config: &CacheConfig) -> Result<()> {
    let Some(store) = league_cache::connect_redis(config).await else {
        bail!("watch needs a reachable remote tier (set remote.enabled and remote.url)");
    };

    let mut messages = store.subscribe(&config.channel).await?;
    println!("Watching {} (Ctrl-C to stop)", config.channel.cyan());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            next = messages.next() => match next {
                Some(Ok(payload)) => match serde_json::from_str::<InvalidationMessage>(&payload) {
                    Ok(message) => println!(
                        "{} {}",
                        message.key.yellow(),
                        message.origin.as_deref().unwrap_or("-").dimmed()
                    ),
                    Err(_) => println!("{} {}", "malformed:".red(), payload),
                },
                Some(Err(e)) => tracing::warn!(error = %e, "failed to read message"),
                None => bail!("subscription closed"),
            },
        }
    }
}
