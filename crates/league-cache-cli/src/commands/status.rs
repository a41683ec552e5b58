use anyhow::Result;
use league_cache::{CacheConfig, MultiLevelCache};

use crate::output::print_field;

pub async fn status(cache: &MultiLevelCache, config: &CacheConfig) -> Result<()> {
    let stats = cache.stats();
    print_field("Mode", stats.mode);
    if let Some(backend) = stats.remote {
        print_field("Remote", format!("{backend} ({})", config.remote.url));
        let health = if cache.is_remote_available().await {
            "reachable"
        } else {
            "unreachable"
        };
        print_field("Remote health", health);
    }
    print_field("Channel", &config.channel);
    print_field("Local capacity", stats.local_capacity);
    print_field("Instance", cache.instance_id());
    Ok(())
}
