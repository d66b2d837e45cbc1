//! Crawling commands: refresh, heroes, skins.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::extract::Extractor;
use crate::models::Hero;
use crate::refresh::{RefreshOrchestrator, RefreshOutcome};

/// Run one refresh cycle with a progress bar.
pub async fn cmd_refresh(settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Arc::new(settings.create_orchestrator()?);

    println!(
        "{} Refreshing cache in {} ({} fetcher)",
        style("→").cyan(),
        settings.cache_dir.display(),
        settings.fetcher.as_str()
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("Loading heroes...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let watcher = {
        let orchestrator = Arc::clone(&orchestrator);
        let pb = pb.clone();
        tokio::spawn(async move {
            loop {
                let progress = orchestrator.status().progress;
                if progress.total > 0 {
                    pb.set_length(progress.total as u64);
                    pb.set_position(progress.current as u64);
                    pb.set_message("Fetching skins");
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
    };

    let outcome = orchestrator.refresh().await;
    watcher.abort();
    pb.finish_and_clear();

    match outcome {
        RefreshOutcome::Completed { processed, failed } => {
            println!(
                "  {} {} heroes refreshed",
                style("✓").green(),
                processed
            );
            if failed > 0 {
                println!(
                    "  {} {} heroes failed (run with -v for details)",
                    style("!").yellow(),
                    failed
                );
            }
            Ok(())
        }
        RefreshOutcome::Aborted(e) => {
            eprintln!("  {} Refresh aborted: {}", style("✗").red(), e);
            Err(anyhow::anyhow!("Refresh aborted: {}", e))
        }
        RefreshOutcome::Busy(_) => {
            println!("  {} A refresh is already running", style("!").yellow());
            Ok(())
        }
    }
}

async fn load_heroes(extractor: &Extractor, fresh: bool) -> anyhow::Result<Vec<Hero>> {
    let heroes = if fresh {
        extractor.fetch_heroes().await?
    } else {
        extractor.get_heroes().await?
    };
    Ok(heroes)
}

/// List heroes from the roster page.
pub async fn cmd_heroes(settings: &Settings, fresh: bool) -> anyhow::Result<()> {
    let extractor = settings.create_extractor()?;
    let heroes = load_heroes(&extractor, fresh).await?;

    if heroes.is_empty() {
        println!("{} No heroes found", style("!").yellow());
        return Ok(());
    }

    println!("{} {} heroes", style("→").cyan(), heroes.len());
    for hero in &heroes {
        println!("  {:<24} {}", style(&hero.name).bold(), style(&hero.url).dim());
    }
    Ok(())
}

/// List one hero's skins with their IDs.
pub async fn cmd_skins(settings: &Settings, hero_name: &str, fresh: bool) -> anyhow::Result<()> {
    let extractor = settings.create_extractor()?;
    let heroes = load_heroes(&extractor, fresh).await?;

    let Some(mut hero) = heroes
        .into_iter()
        .find(|h| h.name.eq_ignore_ascii_case(hero_name))
    else {
        anyhow::bail!("Hero '{}' not found on the roster", hero_name);
    };

    let skins = if fresh {
        extractor.fetch_hero_skins(&mut hero).await?
    } else {
        extractor.get_hero_skins(&mut hero).await?
    };

    println!(
        "{} {} (ID {})",
        style("→").cyan(),
        style(&hero.name).bold(),
        hero.id.as_deref().unwrap_or("unknown")
    );
    for skin in &skins {
        println!("  {:<10} {}", style(&skin.id).green(), skin.name);
    }
    Ok(())
}
