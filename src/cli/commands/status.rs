//! Status command - summarize the cache

use super::open_manager;
use crate::config::Config;
use crate::error::RepoCacheResult;
use crate::ui::{self, UiContext};
use std::path::Path;

/// Execute the status command
pub async fn execute(config: &Config, root: &Path) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = open_manager(root, config, None)?;

    let status = manager.status().await?;

    ui::section(&ctx, "Cache Status");
    ui::key_value(&ctx, "Root", &manager.root().path().display().to_string());
    ui::key_value(&ctx, "Index", &manager.root().index_path().display().to_string());
    ui::key_value(&ctx, "Entries", &status.entries.to_string());
    ui::key_value(&ctx, "Size", &ui::format_bytes(status.total_bytes));
    ui::key_value_status(
        &ctx,
        "Missing files",
        &status.missing.len().to_string(),
        status.missing.is_empty(),
    );

    for entry in &status.missing {
        ui::step_warn_hint(
            &ctx,
            &entry.coordinate.to_string(),
            &format!("{} is gone", entry.relative_path),
        );
    }

    Ok(())
}
