use anyhow::{Context, Result};
use wristfeed::config::FeedConfig;
use wristfeed::feed::filters::{FilterPolicy, WristFilters};
use wristfeed::storage::path_utils;

/// `filters show`: the wrist filter table.
pub fn run_show() -> Result<()> {
    let config = FeedConfig::load();
    let filters = config.wrist_filters();
    let width = filters.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    println!("Wrist filters ({})", path_utils::config_path().display());
    for (category, policy) in filters.iter() {
        println!("  {:<width$}  {}", category, policy, width = width);
    }
    println!();
    println!("hide_private_from_feed: {}", config.hide_private_from_feed);
    Ok(())
}

/// `filters set <category> <policy>`: update one category.
///
/// A running `watch` picks the change up and republishes.
pub fn run_set(category: &str, policy: &str) -> Result<()> {
    let policy: FilterPolicy = policy.parse()?;
    let mut config = FeedConfig::load();
    let previous = config.wrist_filters().get(category);
    config.shared_feed_filters.wrist.set(category, policy);
    config.save().context("Failed to save config")?;

    match previous {
        Some(old) => println!("{}: {} -> {}", category, old, policy),
        None => println!("{}: {} (new category)", category, policy),
    }
    Ok(())
}

/// `filters reset`: restore the default table.
pub fn run_reset() -> Result<()> {
    let mut config = FeedConfig::load();
    config.shared_feed_filters.wrist = WristFilters::default();
    config.save().context("Failed to save config")?;
    println!("Wrist filters reset to defaults");
    Ok(())
}
