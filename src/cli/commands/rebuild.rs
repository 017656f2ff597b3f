//! Rebuild command - materialize the cache as a standalone repository

use super::open_manager;
use crate::cli::args::RebuildArgs;
use crate::config::Config;
use crate::error::RepoCacheResult;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::Path;

/// Execute the rebuild command
///
/// Without `--keep` the repository is deleted again once it has been
/// verified, which makes this a consistency check of the cache.
pub async fn execute(args: RebuildArgs, config: &Config, root: &Path) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = open_manager(root, config, None)?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Rebuilding repository from cache");

    let repository = match manager.rebuild().await {
        Ok(repository) => repository,
        Err(e) => {
            spinner.stop_error("Rebuild failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Rebuilt repository with {} artifacts",
        repository.artifact_count()
    ));

    if args.keep {
        let path = repository.keep();
        ui::key_value(&ctx, "Repository", &path.display().to_string());
        // Bare path on stdout for scripts: `repo=$(repocache rebuild --keep | tail -1)`
        println!("{}", path.display());
    } else {
        repository.close()?;
        ui::step_ok_detail(&ctx, "Cache is consistent", "use --keep to retain the repository");
    }

    Ok(())
}
