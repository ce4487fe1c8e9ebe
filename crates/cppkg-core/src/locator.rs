//! Locate external tools, installing them through a package manager when
//! they are missing.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::InstallError;

/// One way to install a missing tool: `<manager> <args...> <tool>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installer {
    /// Package manager executable.
    pub manager: String,
    /// Arguments placed before the tool name.
    pub args: Vec<String>,
}

impl Installer {
    fn new(manager: &str, args: &[&str]) -> Self {
        Self {
            manager: manager.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }
}

/// An executable and the installers to try, in order, when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    /// Executable name looked up in `PATH`.
    pub name: String,
    /// Fallback installers.
    pub installers: Vec<Installer>,
}

impl Tool {
    /// A tool installable with the default package managers.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            installers: vec![
                Installer::new("brew", &["install"]),
                Installer::new("apt-get", &["install"]),
            ],
        }
    }

    /// `git`, used for the recipe index.
    pub fn git() -> Self {
        Self::new("git")
    }

    /// `conan`, the build tool.
    pub fn conan() -> Self {
        Self::new("conan")
    }
}

/// Resolves tools to absolute paths.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    quiet_install: bool,
    search_path: Option<OsString>,
}

impl Locator {
    /// Locator searching the process `PATH`.
    ///
    /// With `quiet_install`, installer output is discarded.
    pub fn new(quiet_install: bool) -> Self {
        Self {
            quiet_install,
            search_path: None,
        }
    }

    /// Search `paths` instead of the process `PATH`.
    #[must_use]
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(name, Some(paths), cwd).ok()
            }
            None => which::which(name).ok(),
        }
    }

    /// Locate `tool`, running its installers one by one until it appears.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ToolMissing`] if the tool is still absent after
    /// every available installer has run.
    pub fn resolve(&self, tool: &Tool) -> Result<PathBuf, InstallError> {
        if let Some(path) = self.find(&tool.name) {
            debug!(tool = %tool.name, path = %path.display(), "found tool");
            return Ok(path);
        }

        for installer in &tool.installers {
            let Some(manager) = self.find(&installer.manager) else {
                continue;
            };
            info!(tool = %tool.name, manager = %installer.manager, "installing missing tool");
            if let Err(e) = self.run_installer(&manager, installer, &tool.name) {
                warn!(tool = %tool.name, manager = %installer.manager, "installer failed: {e}");
            }
            if let Some(path) = self.find(&tool.name) {
                return Ok(path);
            }
        }

        Err(InstallError::ToolMissing(tool.name.clone()))
    }

    fn run_installer(
        &self,
        manager: &Path,
        installer: &Installer,
        tool: &str,
    ) -> std::io::Result<()> {
        let mut cmd = Command::new(manager);
        cmd.args(&installer.args).arg(tool);
        if self.quiet_install {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("exited with {status}")))
        }
    }
}
