use std::path::Path;

use anyhow::{Context, Result};
use masterski::lessons::fetch_dashboard;
use masterski::{Backend, HourlyRate, Preferences};
use uuid::Uuid;

pub async fn show_stats(
    backend: &dyn Backend,
    user_id: Uuid,
    preferences: &Preferences,
) -> Result<()> {
    let stats = fetch_dashboard(backend, user_id)
        .await
        .context("loading lesson statistics")?;

    println!("Hours taught:   {}", stats.total_hours);
    println!("Average score:  {}", stats.score_display());
    println!("Clients:        {}", stats.total_clients);
    println!(
        "Earnings:       {}",
        stats.earnings(preferences.rate_or_zero())
    );

    if preferences.hourly_rate.is_none() {
        println!("Set an hourly rate with `masterski rate <euros>` to see earnings.");
    }

    Ok(())
}

/// Shows the stored rate, or replaces it when `rate` is given.
pub fn hourly_rate(path: &Path, rate: Option<HourlyRate>) -> Result<()> {
    let mut preferences = Preferences::load(path)
        .with_context(|| format!("loading preferences from {}", path.display()))?;

    match rate {
        Some(rate) => {
            preferences.hourly_rate = Some(rate);
            preferences.save(path)?;
            println!("Hourly rate set to {rate}");
        }
        None => match preferences.hourly_rate {
            Some(rate) => println!("Hourly rate: {rate}"),
            None => println!("No hourly rate set"),
        },
    }

    Ok(())
}
