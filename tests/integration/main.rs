//! Integration tests for repocache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A scratch environment: config file, cache root and a `file://` remote
    struct Env {
        temp: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let env = Self {
                temp: TempDir::new().unwrap(),
            };
            std::fs::create_dir_all(env.remote()).unwrap();
            env
        }

        fn config(&self) -> PathBuf {
            self.temp.path().join("config.toml")
        }

        fn cache_root(&self) -> PathBuf {
            self.temp.path().join("repocache")
        }

        fn remote(&self) -> PathBuf {
            self.temp.path().join("remote")
        }

        fn remote_url(&self) -> String {
            format!("file://{}", self.remote().display())
        }

        /// Publish an artifact into the remote repository
        fn publish(&self, layout_path: &str, content: &str) {
            let file = self.remote().join(layout_path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content).unwrap();
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("repocache");
            cmd.env_remove("REPOCACHE_CONFIG")
                .env_remove("REPOCACHE_ROOT")
                .arg("--config")
                .arg(self.config())
                .arg("--cache-root")
                .arg(self.cache_root());
            cmd
        }

        fn index(&self) -> String {
            std::fs::read_to_string(self.cache_root().join("cache.properties")).unwrap()
        }
    }

    fn repocache() -> Command {
        cargo_bin_cmd!("repocache")
    }

    fn last_line(output: &[u8]) -> PathBuf {
        let stdout = String::from_utf8_lossy(output);
        PathBuf::from(stdout.lines().last().unwrap().trim())
    }

    #[test]
    fn help_displays() {
        repocache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Offline artifact cache"));
    }

    #[test]
    fn version_displays() {
        repocache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("repocache"));
    }

    #[test]
    fn config_path() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let env = Env::new();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("maven-central"));
    }

    #[test]
    fn config_init_writes_file() {
        let env = Env::new();
        env.cmd().args(["config", "init"]).assert().success();
        let content = std::fs::read_to_string(env.config()).unwrap();
        assert!(content.contains("[cache]"));
    }

    #[test]
    fn populate_then_rebuild() {
        let env = Env::new();
        env.publish("org/foo/bar/1.0/bar-1.0.jar", "bar jar");
        env.publish("org/foo/bar/1.0/bar-1.0-sources.jar", "bar sources");

        env.cmd()
            .args([
                "populate",
                "--artifact",
                "org.foo:bar:jar::1.0",
                "--artifact",
                "org.foo:bar:jar:sources:1.0",
                "--repositories",
                env.remote_url().as_str(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 cached"));

        let index = env.index();
        assert_eq!(index.lines().count(), 2);
        assert!(index
            .contains("org.foo:bar:jar::1.0:repocache/cache/org/foo/bar/1.0/bar-1.0.jar"));

        let output = env.cmd().args(["rebuild", "--keep"]).output().unwrap();
        assert!(output.status.success());
        let repo = last_line(&output.stdout);
        assert_eq!(
            std::fs::read_to_string(repo.join("org/foo/bar/1.0/bar-1.0-sources.jar")).unwrap(),
            "bar sources"
        );
        std::fs::remove_dir_all(repo).unwrap();
    }

    #[test]
    fn populate_twice_leaves_index_unchanged() {
        let env = Env::new();
        env.publish("org/foo/bar/1.0/bar-1.0.pom", "<project/>");
        let url = env.remote_url();
        let args = ["populate", "-a", "org.foo:bar:pom::1.0", "-r", url.as_str()];

        env.cmd().args(args).assert().success();
        let first = env.index();

        // The remote is gone: a second run must not need it
        std::fs::remove_dir_all(env.remote()).unwrap();
        env.cmd()
            .args(args)
            .assert()
            .success()
            .stdout(predicate::str::contains("1 already present"));

        assert_eq!(env.index(), first);
    }

    #[test]
    fn populate_from_artifacts_file() {
        let env = Env::new();
        env.publish("com/example/app/2.0/app-2.0.war", "war");
        let list = env.temp.path().join("artifacts.txt");
        std::fs::write(&list, "# deployables\ncom.example:app:war::2.0\n").unwrap();

        env.cmd()
            .args(["populate", "--artifacts-file"])
            .arg(&list)
            .args(["--repositories", env.remote_url().as_str()])
            .assert()
            .success();

        assert!(env.index().starts_with("com.example:app:war::2.0:"));
    }

    #[test]
    fn populate_partial_failure_exits_nonzero() {
        let env = Env::new();
        env.publish("org/foo/a/1.0/a-1.0.jar", "a");

        env.cmd()
            .args([
                "populate",
                "-a",
                "org.foo:a:jar::1.0",
                "-a",
                "org.foo:missing:jar::1.0",
                "-r",
                env.remote_url().as_str(),
            ])
            .assert()
            .failure()
            .stdout(predicate::str::contains("org.foo:missing:jar::1.0"))
            .stderr(predicate::str::contains("1 of 2 artifacts could not be resolved"));

        let index = env.index();
        assert!(index.contains("org.foo:a:jar::1.0:"));
        assert!(!index.contains("org.foo:missing"));
    }

    #[test]
    fn populate_rejects_invalid_coordinate() {
        let env = Env::new();
        env.cmd()
            .args(["populate", "-a", "org.foo:bar:1.0", "-r", env.remote_url().as_str()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid artifact coordinate"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn populate_without_artifacts_fails() {
        let env = Env::new();
        env.cmd()
            .arg("populate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No artifacts given"));
    }

    #[test]
    fn rebuild_empty_cache_succeeds() {
        let env = Env::new();
        env.cmd()
            .arg("rebuild")
            .assert()
            .success()
            .stdout(predicate::str::contains("0 artifacts"));
    }

    #[test]
    fn rebuild_detects_missing_store_file() {
        let env = Env::new();
        env.publish("org/foo/bar/1.0/bar-1.0.jar", "bar");
        env.cmd()
            .args(["populate", "-a", "org.foo:bar:jar::1.0", "-r", env.remote_url().as_str()])
            .assert()
            .success();

        remove(&env.cache_root().join("cache/org/foo/bar/1.0/bar-1.0.jar"));

        env.cmd()
            .arg("rebuild")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupt cache index"));
    }

    #[test]
    fn populate_detects_missing_store_file() {
        let env = Env::new();
        env.publish("org/foo/bar/1.0/bar-1.0.jar", "bar");
        let url = env.remote_url();
        let args = ["populate", "-a", "org.foo:bar:jar::1.0", "-r", url.as_str()];
        env.cmd().args(args).assert().success();

        remove(&env.cache_root().join("cache/org/foo/bar/1.0/bar-1.0.jar"));

        env.cmd()
            .args(args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupt cache index"))
            .stderr(predicate::str::contains("org.foo:bar:jar::1.0 is missing"));
    }

    #[test]
    fn rebuild_detects_malformed_index() {
        let env = Env::new();
        std::fs::create_dir_all(env.cache_root()).unwrap();
        std::fs::write(
            env.cache_root().join("cache.properties"),
            "org.foo:bar:jar::1.0\n",
        )
        .unwrap();

        env.cmd()
            .arg("rebuild")
            .assert()
            .failure()
            .stderr(predicate::str::contains("line 1"));
    }

    #[test]
    fn status_reports_entries() {
        let env = Env::new();
        env.publish("org/foo/bar/1.0/bar-1.0.jar", "bar");
        env.cmd()
            .args(["populate", "-a", "org.foo:bar:jar::1.0", "-r", env.remote_url().as_str()])
            .assert()
            .success();

        env.cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Entries: 1"))
            .stdout(predicate::str::contains("Missing files: 0"));
    }

    #[test]
    fn invalid_config_fails() {
        let env = Env::new();
        std::fs::write(env.config(), "[cache]\nconcurrency = 0\n").unwrap();
        env.cmd()
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    fn remove(path: &Path) {
        std::fs::remove_file(path).unwrap();
    }
}
