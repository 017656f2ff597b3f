//! CLI command implementations

pub mod config;
pub mod populate;
pub mod rebuild;
pub mod status;

pub use config::execute as config;
pub use populate::execute as populate;
pub use rebuild::execute as rebuild;
pub use status::execute as status;

use crate::audit::AuditLog;
use crate::cache::{CacheManager, CacheRoot};
use crate::config::Config;
use crate::error::RepoCacheResult;
use crate::repository::{ArtifactResolver, LayoutDeployer};
use std::path::Path;
use std::sync::Arc;

/// Cache manager for `root` wired up from the configuration
///
/// Without a resolver the manager only serves `rebuild` and `status`.
fn open_manager(
    root: &Path,
    config: &Config,
    resolver: Option<Arc<dyn ArtifactResolver>>,
) -> RepoCacheResult<CacheManager> {
    let root = CacheRoot::new(root)?;
    let audit = AuditLog::new(root.audit_log_path(), config.general.audit_log);
    let deployer = Arc::new(LayoutDeployer::new());

    let manager = match resolver {
        Some(resolver) => CacheManager::new(root, resolver, deployer),
        None => CacheManager::reader(root, deployer),
    };
    Ok(manager
        .with_concurrency(config.cache.concurrency)
        .with_audit_log(audit))
}
