//! Cache population and rebuild

use crate::audit::AuditLog;
use crate::cache::index::{CacheEntry, CacheIndex};
use crate::cache::rebuild::{self, TemporaryRepository};
use crate::cache::root::CacheRoot;
use crate::coordinate::ArtifactCoordinate;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::repository::{
    ArtifactDeployer, ArtifactResolver, RemoteRepository, ResolutionFailure, ResolvedArtifact,
};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of resolutions in flight during populate
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of a populate call
///
/// Resolution failures are not errors: the rest of the batch is still
/// cached, and the failed coordinates are listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Number of distinct coordinates requested
    pub requested: usize,
    /// Requested coordinates that were already in the index
    pub already_cached: usize,
    /// Coordinates newly added to the cache, sorted
    pub cached: Vec<ArtifactCoordinate>,
    /// Coordinates that could not be resolved, sorted
    pub failures: Vec<ResolutionFailure>,
}

impl PopulateReport {
    /// True when every requested coordinate is now cached
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of resolver invocations this populate made
    pub fn resolved_attempts(&self) -> usize {
        self.cached.len() + self.failures.len()
    }
}

/// Summary of a cache's contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatus {
    pub entries: usize,
    /// Indexed entries whose files are gone from the store
    pub missing: Vec<CacheEntry>,
    /// Total size of the indexed files that are present
    pub total_bytes: u64,
}

/// Orchestrates the cache at one root
///
/// `populate` takes the exclusive cache lock for its whole run; `rebuild`
/// and `status` take a shared lock, so rebuilds may overlap each other but
/// never a populate.
///
/// A manager built with [`CacheManager::reader`] has no resolver and can
/// only rebuild and report status.
pub struct CacheManager {
    root: CacheRoot,
    resolver: Option<Arc<dyn ArtifactResolver>>,
    deployer: Arc<dyn ArtifactDeployer>,
    concurrency: usize,
    audit: AuditLog,
}

impl CacheManager {
    pub fn new(
        root: CacheRoot,
        resolver: Arc<dyn ArtifactResolver>,
        deployer: Arc<dyn ArtifactDeployer>,
    ) -> Self {
        Self {
            root,
            resolver: Some(resolver),
            deployer,
            concurrency: DEFAULT_CONCURRENCY,
            audit: AuditLog::disabled(),
        }
    }

    /// Manager for the read-only operations, `rebuild` and `status`
    pub fn reader(root: CacheRoot, deployer: Arc<dyn ArtifactDeployer>) -> Self {
        Self {
            root,
            resolver: None,
            deployer,
            concurrency: DEFAULT_CONCURRENCY,
            audit: AuditLog::disabled(),
        }
    }

    /// Maximum number of concurrent resolutions (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// Cache every coordinate of `required` that is not cached yet
    ///
    /// 1. check every indexed file is present, then diff `required`
    ///    against the index
    /// 2. resolve the missing ones (failures are collected, not fatal)
    /// 3. deploy all resolved artifacts into the store in one batch
    /// 4. record the deployed artifacts in the index
    ///
    /// A malformed index or an indexed file missing from the store is
    /// [`RepoCacheError::CorruptIndex`], before anything is resolved.
    /// A deploy failure is [`RepoCacheError::CachePopulation`] and leaves the
    /// index untouched. Cancelling the returned future before the deploy
    /// step also leaves the index untouched.
    pub async fn populate(
        &self,
        required: &HashSet<ArtifactCoordinate>,
        repositories: &[RemoteRepository],
    ) -> RepoCacheResult<PopulateReport> {
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            RepoCacheError::Internal("populate needs a cache manager with a resolver".to_string())
        })?;

        let _lock = self.root.lock_exclusive().await?;

        let index = CacheIndex::load(&self.root).await?;
        index.ensure_files_exist(&self.root).await?;
        let cached_keys = index.coordinate_key_set();

        let mut missing: Vec<&ArtifactCoordinate> = required
            .iter()
            .filter(|c| !cached_keys.contains(&c.key()))
            .collect();
        missing.sort();

        let mut report = PopulateReport {
            requested: required.len(),
            already_cached: required.len() - missing.len(),
            ..Default::default()
        };

        if missing.is_empty() {
            debug!("All {} requested artifacts already cached", required.len());
            return Ok(report);
        }

        info!(
            "Resolving {} missing artifacts ({} already cached)",
            missing.len(),
            report.already_cached
        );

        let (resolved, failures) = self.resolve_all(resolver.as_ref(), &missing, repositories).await;
        report.failures = failures;

        if !resolved.is_empty() {
            let entries = self.deploy_to_store(&resolved).await?;
            report.cached = entries.iter().map(|e| e.coordinate.clone()).collect();
            report.cached.sort();
            CacheIndex::append(&self.root, entries).await?;
        }

        info!(
            "Cached {} artifacts, {} failed to resolve",
            report.cached.len(),
            report.failures.len()
        );

        self.audit
            .log(
                "cache.populated",
                &serde_json::json!({
                    "root": self.root.path(),
                    "requested": report.requested,
                    "already_cached": report.already_cached,
                    "cached": report.cached.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                    "failed": report.failures.iter().map(|f| f.coordinate.to_string()).collect::<Vec<_>>(),
                }),
            )
            .await;

        Ok(report)
    }

    /// Resolve with at most `concurrency` requests in flight
    async fn resolve_all(
        &self,
        resolver: &dyn ArtifactResolver,
        missing: &[&ArtifactCoordinate],
        repositories: &[RemoteRepository],
    ) -> (Vec<ResolvedArtifact>, Vec<ResolutionFailure>) {
        let outcomes: Vec<Result<ResolvedArtifact, ResolutionFailure>> =
            stream::iter(missing.iter().map(|c| resolver.resolve(c, repositories)))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut resolved = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(artifact) => {
                    debug!("Resolved {} to {}", artifact.coordinate, artifact.file.display());
                    resolved.push(artifact);
                }
                Err(failure) => {
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }

        resolved.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
        failures.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
        (resolved, failures)
    }

    /// Deploy one batch into the store and build the matching index entries
    async fn deploy_to_store(
        &self,
        resolved: &[ResolvedArtifact],
    ) -> RepoCacheResult<Vec<CacheEntry>> {
        let store = self.root.store_dir();
        let deployed = self
            .deployer
            .deploy(&store, resolved)
            .await
            .map_err(|e| RepoCacheError::CachePopulation {
                reason: e.to_string(),
            })?;

        deployed
            .into_iter()
            .map(|artifact| {
                let relative = self.root.relative_entry_path(&artifact.path).map_err(|e| {
                    RepoCacheError::CachePopulation {
                        reason: format!("deployed {}: {}", artifact.coordinate, e),
                    }
                })?;
                Ok(CacheEntry::new(artifact.coordinate, relative))
            })
            .collect()
    }

    /// Materialize the cache as a standalone repository in a temp directory
    ///
    /// Fails with [`RepoCacheError::CorruptIndex`] if the index is malformed
    /// or any indexed file is missing. The returned handle owns the
    /// directory.
    pub async fn rebuild(&self) -> RepoCacheResult<TemporaryRepository> {
        let _lock = self.root.lock_shared().await?;

        let index = CacheIndex::load(&self.root).await?;
        index.ensure_files_exist(&self.root).await?;

        let repository = rebuild::replay(&self.root, &index, self.deployer.as_ref()).await?;

        self.audit
            .log(
                "cache.rebuilt",
                &serde_json::json!({
                    "root": self.root.path(),
                    "entries": index.len(),
                    "path": repository.path(),
                }),
            )
            .await;

        Ok(repository)
    }

    /// Entry count, missing files and size of the cache
    pub async fn status(&self) -> RepoCacheResult<CacheStatus> {
        let _lock = self.root.lock_shared().await?;

        let index = CacheIndex::load(&self.root).await?;
        let missing: Vec<CacheEntry> = index
            .missing_files(&self.root)
            .await
            .into_iter()
            .cloned()
            .collect();

        let mut total_bytes = 0;
        for entry in index.entries() {
            let file = self.root.resolve_entry_path(&entry.relative_path);
            if let Ok(meta) = tokio::fs::metadata(&file).await {
                total_bytes += meta.len();
            }
        }

        Ok(CacheStatus {
            entries: index.len(),
            missing,
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{DeployFailure, DeployedArtifact, LayoutDeployer};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Resolves from a directory of prepared files; coordinates listed in
    /// `failing` always fail
    struct FakeResolver {
        source: PathBuf,
        failing: Mutex<HashSet<String>>,
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn new(source: &Path) -> Self {
            Self {
                source: source.to_path_buf(),
                failing: Mutex::new(HashSet::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn fail(&self, coordinate: &ArtifactCoordinate) {
            self.failing.lock().unwrap().insert(coordinate.key());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactResolver for FakeResolver {
        async fn resolve(
            &self,
            coordinate: &ArtifactCoordinate,
            _repositories: &[RemoteRepository],
        ) -> Result<ResolvedArtifact, ResolutionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(&coordinate.key()) {
                return Err(ResolutionFailure::new(coordinate.clone(), "not found"));
            }
            let file = self.source.join(coordinate.file_name());
            std::fs::write(&file, coordinate.to_string()).unwrap();
            Ok(ResolvedArtifact::new(coordinate.clone(), file))
        }
    }

    struct BrokenDeployer;

    #[async_trait]
    impl ArtifactDeployer for BrokenDeployer {
        async fn deploy(
            &self,
            _target_root: &Path,
            _artifacts: &[ResolvedArtifact],
        ) -> Result<Vec<DeployedArtifact>, DeployFailure> {
            Err(DeployFailure::new("store is read-only"))
        }
    }

    struct Fixture {
        _temp: TempDir,
        resolver: Arc<FakeResolver>,
        manager: CacheManager,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("remote");
        std::fs::create_dir_all(&source).unwrap();
        let resolver = Arc::new(FakeResolver::new(&source));
        let root = CacheRoot::new(temp.path().join("repocache")).unwrap();
        let manager = CacheManager::new(root, resolver.clone(), Arc::new(LayoutDeployer::new()));
        Fixture {
            _temp: temp,
            resolver,
            manager,
        }
    }

    fn coords(list: &[&str]) -> HashSet<ArtifactCoordinate> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn repos() -> Vec<RemoteRepository> {
        vec![RemoteRepository::new("central", "https://repo1.maven.org/maven2/").unwrap()]
    }

    #[tokio::test]
    async fn populate_caches_disjoint_set() {
        let f = fixture();
        let required = coords(&["org.foo:bar:jar::1.0", "org.foo:bar:pom::1.0"]);

        let report = f.manager.populate(&required, &repos()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.cached.len(), 2);
        assert_eq!(report.already_cached, 0);

        let root = f.manager.root();
        let index = CacheIndex::load(root).await.unwrap();
        let keys = index.coordinate_key_set();
        for c in &required {
            assert!(keys.contains(&c.key()));
            let entry = index.get(c).unwrap();
            assert!(root.resolve_entry_path(&entry.relative_path).is_file());
        }
        assert!(index.entries()[0].relative_path.starts_with("repocache/cache/"));
    }

    #[tokio::test]
    async fn populate_fully_cached_set_makes_no_resolver_calls() {
        let f = fixture();
        let required = coords(&["org.foo:bar:jar::1.0", "org.foo:baz:jar:tests:2.0"]);
        f.manager.populate(&required, &repos()).await.unwrap();
        let calls = f.resolver.calls();
        let before = std::fs::read(f.manager.root().index_path()).unwrap();

        let report = f.manager.populate(&required, &repos()).await.unwrap();

        assert_eq!(f.resolver.calls(), calls);
        assert_eq!(report.already_cached, 2);
        assert_eq!(report.resolved_attempts(), 0);
        let after = std::fs::read(f.manager.root().index_path()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn populate_only_resolves_the_difference() {
        let f = fixture();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap();

        let report = f
            .manager
            .populate(
                &coords(&["org.foo:bar:jar::1.0", "org.foo:bar:jar::1.1"]),
                &repos(),
            )
            .await
            .unwrap();

        assert_eq!(f.resolver.calls(), 2);
        assert_eq!(report.already_cached, 1);
        let added: ArtifactCoordinate = "org.foo:bar:jar::1.1".parse().unwrap();
        assert_eq!(report.cached, vec![added]);
        let index = CacheIndex::load(f.manager.root()).await.unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn populate_is_idempotent() {
        let f = fixture();
        let required = coords(&["org.foo:bar:jar::1.0", "org.foo:qux:zip:dist:3.0"]);

        f.manager.populate(&required, &repos()).await.unwrap();
        let index_once = std::fs::read_to_string(f.manager.root().index_path()).unwrap();
        f.manager.populate(&required, &repos()).await.unwrap();
        let index_twice = std::fs::read_to_string(f.manager.root().index_path()).unwrap();

        assert_eq!(index_once, index_twice);
        assert_eq!(index_twice.lines().count(), 2);
    }

    /// Best-effort policy: one unresolvable artifact does not stop the rest
    /// of the batch from being cached, and it is reported, not swallowed.
    #[tokio::test]
    async fn populate_partial_failure_caches_the_rest_and_reports() {
        let f = fixture();
        let a: ArtifactCoordinate = "org.foo:a:jar::1.0".parse().unwrap();
        let b: ArtifactCoordinate = "org.foo:b:jar::1.0".parse().unwrap();
        f.resolver.fail(&b);

        let report = f
            .manager
            .populate(&coords(&["org.foo:a:jar::1.0", "org.foo:b:jar::1.0"]), &repos())
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.cached, vec![a.clone()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].coordinate, b);

        let index = CacheIndex::load(f.manager.root()).await.unwrap();
        assert!(index.contains(&a));
        assert!(!index.contains(&b));
    }

    #[tokio::test]
    async fn populate_all_failing_writes_no_index() {
        let f = fixture();
        let a: ArtifactCoordinate = "org.foo:a:jar::1.0".parse().unwrap();
        f.resolver.fail(&a);

        let report = f
            .manager
            .populate(&coords(&["org.foo:a:jar::1.0"]), &repos())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(!f.manager.root().index_path().exists());
    }

    #[tokio::test]
    async fn deploy_failure_is_fatal_and_leaves_index_untouched() {
        let temp = TempDir::new().unwrap();
        let resolver = Arc::new(FakeResolver::new(temp.path()));
        let root = CacheRoot::new(temp.path().join("repocache")).unwrap();
        let manager = CacheManager::new(root.clone(), resolver, Arc::new(BrokenDeployer));

        let err = manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap_err();

        assert!(matches!(err, RepoCacheError::CachePopulation { .. }));
        assert!(!root.index_path().exists());
    }

    #[tokio::test]
    async fn populate_with_concurrency_one_resolves_everything() {
        let f = fixture();
        let manager = f.manager.with_concurrency(0);
        let required = coords(&[
            "org.foo:a:jar::1.0",
            "org.foo:b:jar::1.0",
            "org.foo:c:jar::1.0",
        ]);

        let report = manager.populate(&required, &repos()).await.unwrap();
        assert_eq!(report.cached.len(), 3);
    }

    #[tokio::test]
    async fn rebuild_contains_every_populated_coordinate() {
        let f = fixture();
        let required = coords(&[
            "org.foo:bar:jar::1.0",
            "org.foo:bar:jar:sources:1.0",
            "com.example:app:war::2.3.1",
        ]);
        f.manager.populate(&required, &repos()).await.unwrap();

        let repo = f.manager.rebuild().await.unwrap();

        assert_eq!(repo.artifact_count(), 3);
        for c in &required {
            assert!(repo.contains(c), "{} missing from rebuilt repository", c);
            assert_eq!(
                std::fs::read_to_string(repo.artifact_path(c)).unwrap(),
                c.to_string()
            );
        }
        assert!(repo
            .path()
            .join("com/example/app/2.3.1/app-2.3.1.war")
            .is_file());
    }

    #[tokio::test]
    async fn rebuild_empty_cache_is_empty_repository() {
        let f = fixture();
        let repo = f.manager.rebuild().await.unwrap();
        assert_eq!(repo.artifact_count(), 0);
        assert!(repo.path().is_dir());
    }

    #[tokio::test]
    async fn rebuild_fails_on_five_field_line() {
        let f = fixture();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap();
        let index_path = f.manager.root().index_path();
        let mut text = std::fs::read_to_string(&index_path).unwrap();
        text.push_str("org.foo:baz:jar::1.0\n");
        std::fs::write(&index_path, text).unwrap();

        let err = f.manager.rebuild().await.unwrap_err();
        assert!(matches!(err, RepoCacheError::CorruptIndex { line: Some(2), .. }));
    }

    #[tokio::test]
    async fn rebuild_fails_when_store_file_deleted() {
        let f = fixture();
        let bar: ArtifactCoordinate = "org.foo:bar:jar::1.0".parse().unwrap();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0", "org.foo:baz:jar::1.0"]), &repos())
            .await
            .unwrap();
        std::fs::remove_file(f.manager.root().store_dir().join(bar.layout_path())).unwrap();

        let err = f.manager.rebuild().await.unwrap_err();
        match err {
            RepoCacheError::CorruptIndex { reason, .. } => assert!(reason.contains(&bar.key())),
            other => panic!("expected CorruptIndex, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn populate_fails_when_store_file_deleted() {
        let f = fixture();
        let bar: ArtifactCoordinate = "org.foo:bar:jar::1.0".parse().unwrap();
        let required = coords(&["org.foo:bar:jar::1.0"]);
        f.manager.populate(&required, &repos()).await.unwrap();
        let calls = f.resolver.calls();
        let index_before = std::fs::read(f.manager.root().index_path()).unwrap();
        std::fs::remove_file(f.manager.root().store_dir().join(bar.layout_path())).unwrap();

        let err = f.manager.populate(&required, &repos()).await.unwrap_err();

        match err {
            RepoCacheError::CorruptIndex { reason, .. } => assert!(reason.contains(&bar.key())),
            other => panic!("expected CorruptIndex, got {other:?}"),
        }
        assert_eq!(f.resolver.calls(), calls);
        assert_eq!(std::fs::read(f.manager.root().index_path()).unwrap(), index_before);
    }

    #[tokio::test]
    async fn reader_rebuilds_but_cannot_populate() {
        let f = fixture();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap();
        let reader = CacheManager::reader(f.manager.root().clone(), Arc::new(LayoutDeployer::new()));

        let repo = reader.rebuild().await.unwrap();
        assert_eq!(repo.artifact_count(), 1);
        assert_eq!(reader.status().await.unwrap().entries, 1);

        let err = reader
            .populate(&coords(&["org.foo:baz:jar::1.0"]), &repos())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoCacheError::Internal(_)));
    }

    #[tokio::test]
    async fn concurrent_rebuilds_succeed() {
        let f = fixture();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap();

        let (a, b) = tokio::join!(f.manager.rebuild(), f.manager.rebuild());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn status_reports_missing_files_and_size() {
        let f = fixture();
        let bar: ArtifactCoordinate = "org.foo:bar:jar::1.0".parse().unwrap();
        f.manager
            .populate(&coords(&["org.foo:bar:jar::1.0", "org.foo:baz:jar::1.0"]), &repos())
            .await
            .unwrap();
        std::fs::remove_file(f.manager.root().store_dir().join(bar.layout_path())).unwrap();

        let status = f.manager.status().await.unwrap();

        assert_eq!(status.entries, 2);
        assert_eq!(status.missing.len(), 1);
        assert_eq!(status.missing[0].coordinate, bar);
        assert_eq!(status.total_bytes, "org.foo:baz:jar::1.0".len() as u64);
    }

    #[tokio::test]
    async fn populate_writes_audit_event() {
        let f = fixture();
        let audit_path = f.manager.root().audit_log_path();
        let manager = f.manager.with_audit_log(AuditLog::new(&audit_path, true));

        manager
            .populate(&coords(&["org.foo:bar:jar::1.0"]), &repos())
            .await
            .unwrap();

        let content = std::fs::read_to_string(&audit_path).unwrap();
        let event: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(event["event"], "cache.populated");
        assert_eq!(event["data"]["cached"][0], "org.foo:bar:jar::1.0");
    }
}
