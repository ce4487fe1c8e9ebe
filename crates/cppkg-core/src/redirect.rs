//! Point a build-tool remote at the local proxy and put it back afterwards.
//!
//! The remote is shared configuration outside this process, so the previous
//! value is captured before anything changes and restored exactly once:
//! explicitly through [`RegistryRedirect::restore`], or from `Drop` when the
//! install bails out early or panics.

use tracing::{error, info, warn};

use crate::conan::{BuildTool, CONAN_CENTER_URL, Remote, find_remote};
use crate::error::InstallError;

/// URL prefixes that can only come from an earlier proxy run.
const LOOPBACK_PREFIXES: &[&str] = &["http://127.0.0.1", "http://localhost", "http://[::1]"];

/// Whether `url` points at a local proxy.
pub fn is_loopback(url: &str) -> bool {
    LOOPBACK_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Capture the current value of remote `name`.
///
/// A loopback URL is a leftover from an install that was killed before it
/// could restore; it is reported as the default registry so the next restore
/// repairs it.
///
/// # Errors
///
/// Propagates failures listing remotes.
pub fn capture<T: BuildTool + ?Sized>(
    tool: &T,
    name: &str,
) -> Result<Option<Remote>, InstallError> {
    let Some(remote) = find_remote(tool, name)? else {
        return Ok(None);
    };
    if is_loopback(&remote.url) {
        warn!(
            remote = %name,
            url = %remote.url,
            "remote still points at a stale proxy; restoring {CONAN_CENTER_URL}"
        );
        return Ok(Some(Remote {
            name: name.to_string(),
            url: CONAN_CENTER_URL.to_string(),
        }));
    }
    Ok(Some(remote))
}

/// Registry the proxy forwards to: the captured URL when it is HTTPS,
/// otherwise the default registry.
pub fn upstream_url(previous: Option<&Remote>) -> String {
    match previous {
        Some(remote) if remote.url.starts_with("https://") => {
            remote.url.trim_end_matches('/').to_string()
        }
        _ => CONAN_CENTER_URL.to_string(),
    }
}

/// An active redirect of one remote.
pub struct RegistryRedirect<'a, T: BuildTool + ?Sized> {
    tool: &'a T,
    name: String,
    previous: Option<Remote>,
    restored: bool,
}

impl<T: BuildTool + ?Sized> std::fmt::Debug for RegistryRedirect<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryRedirect")
            .field("name", &self.name)
            .field("previous", &self.previous)
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl<'a, T: BuildTool + ?Sized> RegistryRedirect<'a, T> {
    /// Point remote `name` at `proxy_url`.
    ///
    /// `previous` is the value returned by [`capture`]; it is what gets
    /// restored. The handle is armed before the remote is touched, so a
    /// failed switch is still rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] if the remote cannot be
    /// set.
    pub fn redirect(
        tool: &'a T,
        name: &str,
        previous: Option<Remote>,
        proxy_url: &str,
    ) -> Result<Self, InstallError> {
        let handle = Self {
            tool,
            name: name.to_string(),
            previous,
            restored: false,
        };
        tool.set_remote(name, proxy_url)?;
        info!(remote = %name, url = %proxy_url, "registry redirected");
        Ok(handle)
    }

    /// Restore the captured remote.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] if the build tool rejects
    /// the restore.
    pub fn restore(mut self) -> Result<(), InstallError> {
        self.restored = true;
        self.apply_previous()
    }

    fn apply_previous(&self) -> Result<(), InstallError> {
        match &self.previous {
            Some(remote) => self.tool.set_remote(&self.name, &remote.url)?,
            None => self.tool.remove_remote(&self.name)?,
        }
        info!(remote = %self.name, "registry restored");
        Ok(())
    }
}

impl<T: BuildTool + ?Sized> Drop for RegistryRedirect<'_, T> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(e) = self.apply_previous() {
            error!(remote = %self.name, "failed to restore registry remote: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conan::{CONAN_CENTER, InstallRequest};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Remotes {
        remotes: Mutex<Vec<Remote>>,
        writes: Mutex<usize>,
        fail_set: bool,
    }

    impl Remotes {
        fn with(url: &str) -> Self {
            let r = Self::default();
            r.remotes.lock().unwrap().push(Remote {
                name: CONAN_CENTER.to_string(),
                url: url.to_string(),
            });
            r
        }

        fn url(&self) -> Option<String> {
            self.remotes
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.name == CONAN_CENTER)
                .map(|r| r.url.clone())
        }
    }

    #[async_trait::async_trait]
    impl BuildTool for Remotes {
        fn remotes(&self) -> Result<Vec<Remote>, InstallError> {
            Ok(self.remotes.lock().unwrap().clone())
        }

        fn set_remote(&self, name: &str, url: &str) -> Result<(), InstallError> {
            *self.writes.lock().unwrap() += 1;
            if self.fail_set && url.starts_with("http://127.0.0.1") {
                return Err(InstallError::RegistryRedirect("rejected".to_string()));
            }
            let mut remotes = self.remotes.lock().unwrap();
            remotes.retain(|r| r.name != name);
            remotes.push(Remote {
                name: name.to_string(),
                url: url.to_string(),
            });
            Ok(())
        }

        fn remove_remote(&self, name: &str) -> Result<(), InstallError> {
            *self.writes.lock().unwrap() += 1;
            self.remotes.lock().unwrap().retain(|r| r.name != name);
            Ok(())
        }

        async fn install(&self, _request: &InstallRequest) -> Result<(), InstallError> {
            Ok(())
        }
    }

    const PROXY: &str = "http://127.0.0.1:40123";

    #[test]
    fn test_restore_previous_url() {
        let tool = Remotes::with("https://mirror.example.com");
        let previous = capture(&tool, CONAN_CENTER).unwrap();

        let redirect = RegistryRedirect::redirect(&tool, CONAN_CENTER, previous, PROXY).unwrap();
        assert_eq!(tool.url().as_deref(), Some(PROXY));

        redirect.restore().unwrap();
        assert_eq!(tool.url().as_deref(), Some("https://mirror.example.com"));
        // One redirect, one restore; Drop after restore() does nothing.
        assert_eq!(*tool.writes.lock().unwrap(), 2);
    }

    #[test]
    fn test_absent_remote_is_removed_again() {
        let tool = Remotes::default();
        let previous = capture(&tool, CONAN_CENTER).unwrap();
        assert!(previous.is_none());

        let redirect = RegistryRedirect::redirect(&tool, CONAN_CENTER, previous, PROXY).unwrap();
        assert_eq!(tool.url().as_deref(), Some(PROXY));
        redirect.restore().unwrap();
        assert_eq!(tool.url(), None);
    }

    #[test]
    fn test_drop_restores() {
        let tool = Remotes::with(CONAN_CENTER_URL);
        {
            let previous = capture(&tool, CONAN_CENTER).unwrap();
            let _redirect =
                RegistryRedirect::redirect(&tool, CONAN_CENTER, previous, PROXY).unwrap();
        }
        assert_eq!(tool.url().as_deref(), Some(CONAN_CENTER_URL));
        assert_eq!(*tool.writes.lock().unwrap(), 2);
    }

    #[test]
    fn test_failed_redirect_rolls_back() {
        let tool = Remotes {
            fail_set: true,
            ..Remotes::with(CONAN_CENTER_URL)
        };
        let previous = capture(&tool, CONAN_CENTER).unwrap();

        let err = RegistryRedirect::redirect(&tool, CONAN_CENTER, previous, PROXY).unwrap_err();
        assert!(matches!(err, InstallError::RegistryRedirect(_)));
        assert_eq!(tool.url().as_deref(), Some(CONAN_CENTER_URL));
    }

    #[test]
    fn test_stale_proxy_url_recovered() {
        let tool = Remotes::with("http://127.0.0.1:51234");
        let previous = capture(&tool, CONAN_CENTER).unwrap();
        assert_eq!(previous.as_ref().map(|r| r.url.as_str()), Some(CONAN_CENTER_URL));

        RegistryRedirect::redirect(&tool, CONAN_CENTER, previous, PROXY)
            .unwrap()
            .restore()
            .unwrap();
        assert_eq!(tool.url().as_deref(), Some(CONAN_CENTER_URL));
    }

    #[test]
    fn test_upstream_url() {
        let remote = |url: &str| Remote {
            name: CONAN_CENTER.to_string(),
            url: url.to_string(),
        };
        assert_eq!(
            upstream_url(Some(&remote("https://mirror.example.com/"))),
            "https://mirror.example.com"
        );
        assert_eq!(
            upstream_url(Some(&remote("http://insecure.example.com"))),
            CONAN_CENTER_URL
        );
        assert_eq!(upstream_url(None), CONAN_CENTER_URL);
    }
}
