//! Populate command - resolve and cache missing artifacts

use super::open_manager;
use crate::cache::PopulateReport;
use crate::cli::args::PopulateArgs;
use crate::config::Config;
use crate::coordinate::ArtifactCoordinate;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::repository::{ArtifactResolver, HttpResolver, RemoteRepository};
use crate::ui::{self, TaskSpinner, UiContext};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Execute the populate command
pub async fn execute(args: PopulateArgs, config: &Config, root: &Path) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();

    let required = collect_coordinates(&args).await?;
    if required.is_empty() {
        return Err(RepoCacheError::User(
            "No artifacts given. Use --artifact or --artifacts-file".to_string(),
        ));
    }

    let repositories = match args.repositories.as_deref() {
        Some(list) => RemoteRepository::parse_list(list)?,
        None => config.repositories.clone(),
    };
    if repositories.is_empty() {
        return Err(RepoCacheError::User(
            "No remote repositories configured".to_string(),
        ));
    }
    for repository in &repositories {
        debug!("Using repository {}", repository);
    }

    let staging = tempfile::Builder::new()
        .prefix("repocache-staging-")
        .tempdir()
        .map_err(|e| RepoCacheError::io("creating staging directory", e))?;
    let resolver: Arc<dyn ArtifactResolver> = Arc::new(HttpResolver::new(staging.path()));

    let mut manager = open_manager(root, config, Some(resolver))?;
    if let Some(concurrency) = args.concurrency {
        manager = manager.with_concurrency(concurrency);
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Populating cache with {} artifacts", required.len()));

    // Dropping the populate future on Ctrl-C leaves the index as it was
    // before the last completed write
    let report = tokio::select! {
        result = manager.populate(&required, &repositories) => result,
        _ = tokio::signal::ctrl_c() => {
            spinner.stop_error("Interrupted");
            return Err(RepoCacheError::User("Populate interrupted".to_string()));
        }
    };

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Populate failed");
            return Err(e);
        }
    };

    print_report(&ctx, &mut spinner, &report, manager.root().path());

    if report.is_complete() {
        Ok(())
    } else {
        Err(RepoCacheError::User(format!(
            "{} of {} artifacts could not be resolved",
            report.failures.len(),
            report.requested
        )))
    }
}

fn print_report(ctx: &UiContext, spinner: &mut TaskSpinner, report: &PopulateReport, root: &Path) {
    let summary = format!(
        "{} cached, {} already present, {} failed",
        report.cached.len(),
        report.already_cached,
        report.failures.len()
    );
    if report.is_complete() {
        spinner.stop(&summary);
    } else {
        spinner.stop_warn(&summary);
    }

    for coordinate in &report.cached {
        ui::step_ok(ctx, &coordinate.to_string());
    }
    for failure in &report.failures {
        ui::step_error_detail(ctx, &failure.coordinate.to_string(), &failure.reason);
    }
    ui::key_value(ctx, "Cache", &root.display().to_string());
}

/// Coordinates from `--artifact` and `--artifacts-file`, deduplicated
async fn collect_coordinates(args: &PopulateArgs) -> RepoCacheResult<HashSet<ArtifactCoordinate>> {
    let mut coordinates = HashSet::new();

    for raw in &args.artifacts {
        coordinates.insert(raw.trim().parse::<ArtifactCoordinate>()?);
    }

    if let Some(ref path) = args.artifacts_file {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RepoCacheError::io(format!("reading {}", path.display()), e))?;
        coordinates.extend(parse_artifacts_file(&content)?);
    }

    Ok(coordinates)
}

/// One coordinate per line; blank lines and `#` comments are skipped
fn parse_artifacts_file(content: &str) -> RepoCacheResult<Vec<ArtifactCoordinate>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse)
        .collect()
}
