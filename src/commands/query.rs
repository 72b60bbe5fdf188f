use anyhow::Result;
use std::sync::Arc;

use crate::engine::{canonical_site, clock, Decision, NotifySink, PolicyEngine};
use crate::storage::FileStore;

/// Ask whether a site is blocked right now
pub async fn check(store: FileStore, site: &str) -> Result<()> {
    let site = canonical_site(site)?;
    let engine = PolicyEngine::new(Arc::new(store), Arc::new(NotifySink))?;

    match engine.decide(&site, clock::now()).await {
        Decision::Allowed => println!("✓ {} is not blocked right now", site),
        Decision::Blocked(reason) => println!("✗ {} is blocked: {}", site, reason),
    }

    Ok(())
}

/// Show weekly usage for all blocked sites
pub async fn stats(store: FileStore) -> Result<()> {
    let engine = PolicyEngine::new(Arc::new(store), Arc::new(NotifySink))?;
    let now = clock::now();

    let config = engine.configuration().await;
    let stats = engine.weekly_stats(now).await;

    println!("Weekly usage - week of {}", clock::week_id(now));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if stats.is_empty() {
        println!("No blocked sites configured.");
        return Ok(());
    }

    for (site, minutes) in &stats {
        match config.site_budgets.get(site) {
            Some(budget) => println!("  {:<24} {:>5} min (budget {})", site, minutes, budget),
            None => println!("  {:<24} {:>5} min (no budget)", site, minutes),
        }
    }

    Ok(())
}

/// Show the effective configuration and schedule state
pub async fn status(store: FileStore) -> Result<()> {
    let engine = PolicyEngine::new(Arc::new(store), Arc::new(NotifySink))?;
    let now = clock::now();

    let config = engine.configuration().await;

    println!("site-warden status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Current time:      {}", now.format("%Y-%m-%d %H:%M"));
    println!("Day kind:          {:?}", clock::day_kind(now));

    let weekday = &config.weekday_schedule;
    if weekday.enabled {
        let time = clock::time_of_day(now);
        let inside = weekday.start.as_str() <= time.as_str() && time.as_str() <= weekday.end.as_str();
        println!(
            "Weekday schedule:  {} - {} ({})",
            weekday.start,
            weekday.end,
            if inside { "in window now" } else { "outside window" }
        );
    } else {
        println!("Weekday schedule:  disabled");
    }

    println!(
        "Weekend schedule:  {}",
        if config.weekend_schedule.enabled {
            "enabled (all day)"
        } else {
            "disabled"
        }
    );

    println!("Max session:       {} minutes", config.max_session_minutes);
    println!("Override lifetime: {} minutes", config.override_minutes);
    println!("Override codes:    {}", config.educational_codes.len());

    println!("Blocked sites:");
    for site in &config.blocked_sites {
        match config.site_budgets.get(site) {
            Some(budget) => println!("  {} (budget {} min/week)", site, budget),
            None => println!("  {}", site),
        }
    }

    Ok(())
}
