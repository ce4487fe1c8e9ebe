//! Command-line integration tests for the `cppkg` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test context with a private cache directory holding a seeded index.
struct TestContext {
    _temp_dir: TempDir,
    cache_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let cache_dir = temp_dir.path().join("cache");
        std::fs::create_dir_all(&cache_dir).expect("failed to create cache dir");
        Self {
            _temp_dir: temp_dir,
            cache_dir,
        }
    }

    /// Seed `<cache>/index` so it looks like an existing checkout.
    fn with_widget_index(self) -> Self {
        let index = self.cache_dir.join("index");
        let recipe = index.join("acme/widget/all");
        std::fs::create_dir_all(index.join(".git")).unwrap();
        std::fs::create_dir_all(&recipe).unwrap();
        write(
            &index.join("acme/widget/config.yml"),
            "versions:\n  \"1.0.0\":\n    folder: all\ntemplate:\n  from: \"1.0.0\"\n  folder: all\n  url: https://example.com/widget-${version}.tar.gz\n",
        );
        write(
            &recipe.join("conandata.yml"),
            "sources:\n  \"1.0.0\":\n    url: https://example.com/widget-1.0.0.tar.gz\n",
        );
        write(&recipe.join("conanfile.py"), "class Widget: pass\n");
        self
    }

    fn cppkg(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_cppkg");
        let mut cmd = Command::new(bin_path);
        cmd.env("CPPKG_CACHE_DIR", &self.cache_dir);
        cmd.env("CPPKG_INDEX_URL", self.cache_dir.join("no-such-remote"));
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cppkg().args(args).output().expect("failed to run cppkg")
    }
}

fn write(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("install"));
    assert!(stdout.contains("--no-update"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cppkg"));
}

#[test]
fn test_completions_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cppkg"));
}

#[test]
fn test_install_rejects_bad_spec() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "widget@1.0.0", "--no-update"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("owner/name"), "{stderr}");
}

#[test]
fn test_info_lists_versions_and_template() {
    let ctx = TestContext::new().with_widget_index();
    let output = ctx.run(&["info", "acme/widget", "--no-update"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("1.0.0"));
    assert!(stdout.contains("https://example.com/widget-1.0.0.tar.gz"));
    assert!(stdout.contains("template"));
}

#[test]
fn test_info_unknown_package() {
    let ctx = TestContext::new().with_widget_index();
    let output = ctx.run(&["info", "acme/gadget", "--no-update"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("acme/gadget"), "{stderr}");
    assert!(stderr.contains("not found"), "{stderr}");
}

#[test]
fn test_install_below_template_fails_before_build() {
    let ctx = TestContext::new().with_widget_index();
    let output = ctx.run(&["install", "acme/widget@0.9.0", "--no-update"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("version 0.9.0 of acme/widget not found"), "{stderr}");
    assert!(!ctx.cache_dir.join("build").exists());
}
