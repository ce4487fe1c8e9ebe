//! Update command

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use crate::Settings;

/// Clone the recipe index, or fast-forward an existing checkout.
pub fn update(settings: &Settings) -> Result<()> {
    let index = settings.index();
    index
        .ensure(&settings.locator(), true)
        .with_context(|| format!("Failed to update recipe index from {}", index.url()))?;

    println!(
        "{} recipe index at {}",
        "updated".green(),
        index.root().display()
    );
    Ok(())
}
