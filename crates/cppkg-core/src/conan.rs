//! The external build tool.
//!
//! [`BuildTool`] is the seam the install flow drives: remote bookkeeping
//! plus the install itself. [`Conan`] implements it by shelling out to the
//! `conan` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::InstallError;
use crate::locator::{Locator, Tool};

/// Remote name of the default registry.
pub const CONAN_CENTER: &str = "conancenter";

/// Default registry URL.
pub const CONAN_CENTER_URL: &str = "https://center2.conan.io";

/// Build-tool output captured next to the build.
pub const INSTALL_LOG: &str = "conan-install.json";

/// A configured registry remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    /// Remote name.
    pub name: String,
    /// Registry URL.
    pub url: String,
}

/// One `conan install` invocation.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// `name/version` reference.
    pub reference: String,
    /// Output folder for generated files.
    pub output_dir: PathBuf,
    /// Working directory (the recipe folder).
    pub recipe_dir: PathBuf,
    /// File receiving the tool's stdout.
    pub log_path: PathBuf,
}

impl InstallRequest {
    /// Command-line arguments after the program name.
    pub fn args(&self) -> Vec<String> {
        vec![
            "install".to_string(),
            "--requires".to_string(),
            self.reference.clone(),
            "--generator".to_string(),
            "PkgConfigDeps".to_string(),
            "--build".to_string(),
            "missing".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--output-folder".to_string(),
            self.output_dir.to_string_lossy().into_owned(),
        ]
    }
}

/// Operations the install flow needs from the build tool.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Configured remotes, in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] if the remotes cannot be
    /// listed.
    fn remotes(&self) -> Result<Vec<Remote>, InstallError>;

    /// Create or overwrite remote `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] on failure.
    fn set_remote(&self, name: &str, url: &str) -> Result<(), InstallError>;

    /// Delete remote `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RegistryRedirect`] on failure.
    fn remove_remote(&self, name: &str) -> Result<(), InstallError>;

    /// Run the install and wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::BuildToolFailure`] if the tool exits
    /// unsuccessfully.
    async fn install(&self, request: &InstallRequest) -> Result<(), InstallError>;
}

/// Look a remote up by name.
///
/// # Errors
///
/// Propagates listing failures.
pub fn find_remote<T: BuildTool + ?Sized>(
    tool: &T,
    name: &str,
) -> Result<Option<Remote>, InstallError> {
    Ok(tool.remotes()?.into_iter().find(|r| r.name == name))
}

/// The `conan` command-line tool.
#[derive(Debug, Clone)]
pub struct Conan {
    program: PathBuf,
}

impl Conan {
    /// Use the `conan` executable at `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find `conan`, installing it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ToolMissing`] if it cannot be found or
    /// installed.
    pub fn locate(locator: &Locator) -> Result<Self, InstallError> {
        locator.resolve(&Tool::conan()).map(Self::new)
    }

    /// Executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn remote_command(&self, args: &[&str]) -> Result<Vec<u8>, InstallError> {
        debug!(?args, "conan remote");
        let output = std::process::Command::new(&self.program)
            .arg("remote")
            .args(args)
            .output()
            .map_err(|e| InstallError::RegistryRedirect(format!("failed to run conan: {e}")))?;
        if !output.status.success() {
            return Err(InstallError::RegistryRedirect(format!(
                "conan remote {} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl BuildTool for Conan {
    fn remotes(&self) -> Result<Vec<Remote>, InstallError> {
        let stdout = self.remote_command(&["list", "-f", "json"])?;
        serde_json::from_slice(&stdout).map_err(|e| {
            InstallError::RegistryRedirect(format!("unexpected conan remote list output: {e}"))
        })
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<(), InstallError> {
        self.remote_command(&["add", "--force", name, url]).map(drop)
    }

    fn remove_remote(&self, name: &str) -> Result<(), InstallError> {
        self.remote_command(&["remove", name]).map(drop)
    }

    async fn install(&self, request: &InstallRequest) -> Result<(), InstallError> {
        let log = std::fs::File::create(&request.log_path)?;
        info!(reference = %request.reference, "running conan install");

        let status = tokio::process::Command::new(&self.program)
            .args(request.args())
            .current_dir(&request.recipe_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::BuildToolFailure(status.code()))
        }
    }
}
