//! Cache directory layout.
//!
//! ```text
//! <cache-root>/
//! ├── index/                 # clone of the recipe index
//! ├── build/<name>@<version> # per-install working directory
//! └── install.lock           # held while the registry is redirected
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "CPPKG_CACHE_DIR";

/// Returns the default cache root, or None if no user cache directory exists.
pub fn try_default_cache_root() -> Option<PathBuf> {
    if let Ok(val) = std::env::var(CACHE_DIR_ENV) {
        return Some(PathBuf::from(val));
    }
    dirs::cache_dir().map(|d| d.join("cppkg"))
}

/// Paths derived from one cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recipe index checkout: `<root>/index`
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// Working directory of one install: `<root>/build/<name>@<version>`
    pub fn build_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join("build").join(format!("{name}@{version}"))
    }

    /// Lock serialising registry redirects: `<root>/install.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("install.lock")
    }
}

/// Recreate `dir` empty.
///
/// # Errors
///
/// Returns an error if the old tree cannot be removed or the directory cannot
/// be created.
pub fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(dir)
}
