//! Local clone of the recipe index.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::InstallError;
use crate::locator::{Locator, Tool};

/// Default recipe index repository.
pub const DEFAULT_INDEX_URL: &str = "https://github.com/goplus/cppkg.git";

/// Environment variable overriding the index repository.
pub const INDEX_URL_ENV: &str = "CPPKG_INDEX_URL";

/// Branch tracked by the index checkout.
const INDEX_BRANCH: &str = "main";

/// A git checkout of the recipe index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
    url: String,
}

impl IndexStore {
    /// Index checked out at `root`, cloned from `url`.
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
        }
    }

    /// Checkout directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remote repository URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Directory of one package: `<root>/<owner>/<name>`.
    pub fn package_dir(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Make sure the checkout exists, fast-forwarding it when `auto_update`.
    ///
    /// A directory without `.git` is treated as garbage and replaced by a
    /// fresh clone. An existing checkout is left alone unless `auto_update`
    /// is set, in which case only a fast-forward pull is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ToolMissing`] if git is unavailable, or
    /// [`InstallError::IndexUnavailable`] if the clone or pull fails.
    pub fn ensure(&self, locator: &Locator, auto_update: bool) -> Result<(), InstallError> {
        if !self.root.join(".git").exists() {
            let git = locator.resolve(&Tool::git())?;
            return self.clone_fresh(&git);
        }
        if auto_update {
            let git = locator.resolve(&Tool::git())?;
            info!(root = %self.root.display(), "updating recipe index");
            run_git(
                &git,
                &self.root,
                &["pull", "--ff-only", "origin", INDEX_BRANCH],
            )?;
        } else {
            debug!(root = %self.root.display(), "index present, update skipped");
        }
        Ok(())
    }

    fn clone_fresh(&self, git: &Path) -> Result<(), InstallError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| {
                InstallError::IndexUnavailable(format!(
                    "cannot remove {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        let parent = self.root.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        info!(url = %self.url, root = %self.root.display(), "cloning recipe index");
        let root = self.root.to_string_lossy();
        run_git(git, parent, &["clone", &self.url, &root])
    }
}

fn run_git(git: &Path, cwd: &Path, args: &[&str]) -> Result<(), InstallError> {
    let output = Command::new(git)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| InstallError::IndexUnavailable(format!("failed to run git: {e}")))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(InstallError::IndexUnavailable(format!(
        "git {} failed ({}): {}",
        args.first().copied().unwrap_or_default(),
        output.status,
        stderr.trim()
    )))
}
