//! Shared data model for cppkg.
//!
//! Covers the three documents cppkg reads or writes inside a recipe index:
//! the per-package `config.yml`, the per-recipe `conandata.yml`, and the
//! content-addressed revision ids fabricated for synthesized packages.

pub mod config;
pub mod descriptor;
pub mod hash;
pub mod version;

pub use config::{PackageConfig, TemplateConfig, VersionEntry};
pub use descriptor::{DescriptorCache, SourceDescriptor, SourceEntry, SourceRecord, SourceUrl};
pub use hash::{Md5Digest, RecipeRevision};
pub use version::{PackageSpec, compare_versions};

use thiserror::Error;

/// Per-package index configuration file.
pub const CONFIG_FILE: &str = "config.yml";

/// Source descriptor inside every recipe folder.
pub const DESCRIPTOR_FILE: &str = "conandata.yml";

/// Recipe script inside every recipe folder.
pub const RECIPE_FILE: &str = "conanfile.py";

/// Manifest file served for synthesized revisions.
pub const MANIFEST_FILE: &str = "conanmanifest.txt";

/// Export archive served for synthesized revisions.
pub const EXPORT_ARCHIVE: &str = "conan_export.tgz";

/// Placeholder substituted in template URL patterns.
pub const VERSION_PLACEHOLDER: &str = "${version}";

/// Errors raised while decoding or encoding index documents.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The YAML document could not be parsed or serialized.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A source entry is neither a single record nor a sequence of records.
    #[error("unexpected source entry shape for version {version}: {reason}")]
    SourceShape {
        /// Version key whose entry failed to decode.
        version: String,
        /// Decoder message.
        reason: String,
    },

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
