use anyhow::{Context, Result, anyhow};
use league_cache::MultiLevelCache;
use serde_json::Value;
use std::time::Duration;

use crate::output::{print_success, print_value};

pub async fn get(cache: &MultiLevelCache, key: &str) -> Result<()> {
    let value: Value = cache
        .get(key, || async { Err(anyhow!("{key} is not cached")) }, None)
        .await?;
    print_value(&value);
    Ok(())
}

pub async fn set(cache: &MultiLevelCache, key: &str, raw: &str, ttl: Option<u64>) -> Result<()> {
    let value: Value = serde_json::from_str(raw).context("value is not valid JSON")?;
    let version = cache
        .set(key, &value, ttl.map(Duration::from_secs))
        .await?;
    print_success(&format!("Stored {key} (version {version})"));
    Ok(())
}

pub async fn invalidate(cache: &MultiLevelCache, key: &str) -> Result<()> {
    cache.invalidate(key).await;
    print_success(&format!("Invalidated {key}"));
    Ok(())
}

pub async fn version(cache: &MultiLevelCache, key: &str) -> Result<()> {
    let meta = cache
        .get_with_meta::<Value, _, _, _>(key, || async { Err(anyhow!("{key} is not cached")) }, None)
        .await?;
    println!("{}", meta.version);
    Ok(())
}
