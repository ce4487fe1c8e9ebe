//! Domain-specific errors for install operations

use std::path::PathBuf;

use cppkg_schema::SchemaError;
use thiserror::Error;

/// Every way an install can fail. All variants are terminal for the current
/// install.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The recipe index could not be cloned, updated or read.
    #[error("recipe index unavailable: {0}")]
    IndexUnavailable(String),

    /// An index or recipe document is malformed.
    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        /// Document that failed to parse.
        path: PathBuf,
        /// Decoder error.
        source: SchemaError,
    },

    /// The package has no config in the index.
    #[error("package {0} not found in the recipe index")]
    PackageNotFound(String),

    /// No recipe can serve the requested version.
    #[error("version {version} of {package} not found: {reason}")]
    VersionNotFound {
        /// Package path.
        package: String,
        /// Requested version.
        version: String,
        /// Why neither an explicit entry nor the template applies.
        reason: String,
    },

    /// An external executable is missing and could not be installed.
    #[error("{0} not found in PATH and no installer succeeded")]
    ToolMissing(String),

    /// The registry remote could not be redirected or restored.
    #[error("registry redirect failed: {0}")]
    RegistryRedirect(String),

    /// The build tool exited unsuccessfully.
    #[error("conan install failed with exit code: {0:?}")]
    BuildToolFailure(Option<i32>),

    /// The registry proxy could not be started.
    #[error("registry proxy failed: {0}")]
    Proxy(String),

    /// Local filesystem error in the cache.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// Shorthand for [`InstallError::VersionNotFound`].
    pub fn version_not_found(
        package: impl Into<String>,
        version: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::VersionNotFound {
            package: package.into(),
            version: version.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a schema error with the document it came from.
    ///
    /// Read failures surface as [`InstallError::IndexUnavailable`]; everything
    /// else is a parse error.
    pub fn from_schema(path: impl Into<PathBuf>, source: SchemaError) -> Self {
        let path = path.into();
        match source {
            SchemaError::Read { path, source } => {
                Self::IndexUnavailable(format!("cannot read {path}: {source}"))
            }
            source => Self::ConfigParse { path, source },
        }
    }
}
