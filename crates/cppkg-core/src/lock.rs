//! Advisory lock held while the build tool's registry is redirected.
//!
//! Registry remotes are machine-wide configuration, so two installs
//! redirecting them at once would clobber each other's restore. The second
//! one fails fast instead.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::InstallError;

/// Exclusive lock on `<cache-root>/install.lock`, released on drop.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] if another install holds
    /// the lock, or [`InstallError::Io`] if the lock file cannot be created.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, InstallError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired install lock");
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(InstallError::RegistryRedirect(format!(
                    "another install is in progress (lock held at {})",
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
