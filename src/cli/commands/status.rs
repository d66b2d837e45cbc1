//! Catalog status command.

use console::style;

use crate::config::Settings;
use crate::extract::HEROES_CACHE_KEY;
use crate::models::Hero;

/// Summarize what is on disk.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let catalog = settings.create_catalog();
    let cache = settings.create_cache();

    let snapshot = tokio::task::spawn_blocking(move || catalog.load_all()).await?;

    println!("{}", style("Skin catalog").bold());
    println!("  Cache directory:  {}", settings.cache_dir.display());
    println!("  Fetcher:          {}", settings.fetcher.as_str());
    println!("  Cache TTL:        {}s", settings.cache_ttl_secs);
    println!(
        "  Refresh interval: {}h",
        settings.refresh_interval_hours
    );
    println!();
    println!("  Heroes:           {}", snapshot.hero_count());
    println!("  Skins:            {}", snapshot.records.len());
    println!("  Files read:       {}", snapshot.files_read);
    if snapshot.files_skipped > 0 {
        println!(
            "  Files skipped:    {}",
            style(snapshot.files_skipped).yellow()
        );
    }

    match cache.get::<Vec<Hero>>(HEROES_CACHE_KEY) {
        Some(heroes) => println!(
            "  Hero list:        {} ({} heroes)",
            style("fresh").green(),
            heroes.len()
        ),
        None => println!("  Hero list:        {}", style("stale or missing").yellow()),
    }

    if snapshot.is_empty() {
        println!();
        println!(
            "{} Catalog is empty. Run `rivalskins refresh` to populate it.",
            style("!").yellow()
        );
    }
    Ok(())
}
