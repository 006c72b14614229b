//! Show the effective configuration.

use anyhow::Result;
use std::path::Path;

use super::load_config;

/// Run the config command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    println!("=== timeline-cli config ===");
    println!();
    println!("Page size:        {}", config.page_size);
    println!("Max pages:        {}", config.max_pages);
    println!("Catch-up rounds:  {}", config.catch_up_rounds);
    println!("Safe offset:      {}", config.safe_offset);
    println!("Refresh TTL:      {}s", config.refresh_ttl_secs);
    println!("Poll interval:    {}s", config.poll_interval_secs);
    println!("Live kind:        {}", config.live_kind);
    println!("Cache limit:      {}", config.cache_limit);
    Ok(())
}
