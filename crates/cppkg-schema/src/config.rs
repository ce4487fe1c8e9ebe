//! Per-package index configuration (`config.yml`).
//!
//! ```yaml
//! versions:
//!   "1.0.0":
//!     folder: all
//! template:
//!   from: "1.0.0"
//!   folder: all
//!   url: https://github.com/acme/widget/archive/refs/tags/v${version}.tar.gz
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{SchemaError, VERSION_PLACEHOLDER};

/// Recipe folder registered for one explicit version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    /// Folder (relative to the package directory) holding the recipe.
    pub folder: String,
}

impl<'de> Deserialize<'de> for VersionEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Accept both `"1.0.0": {folder: all}` and the shorthand `"1.0.0": all`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Folder(String),
            Table { folder: String },
        }

        let folder = match Repr::deserialize(deserializer)? {
            Repr::Folder(folder) | Repr::Table { folder } => folder,
        };
        Ok(Self { folder })
    }
}

/// Version-range template anchored at a reference version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Reference version whose recipe is rewritten for newer versions.
    #[serde(rename = "from")]
    pub from_version: String,
    /// Recipe folder of the reference version.
    pub folder: String,
    /// Source URL pattern containing the `${version}` placeholder.
    #[serde(rename = "url", default)]
    pub url_pattern: String,
}

impl TemplateConfig {
    /// Expand the URL pattern for a concrete version.
    pub fn expand_url(&self, version: &str) -> String {
        self.url_pattern.replace(VERSION_PLACEHOLDER, version)
    }
}

/// Parsed `config.yml` for a single package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Explicit versions and their recipe folders. Keys are unique.
    #[serde(default, deserialize_with = "unique_versions")]
    pub versions: BTreeMap<String, VersionEntry>,
    /// Optional template serving versions without an explicit recipe.
    #[serde(default)]
    pub template: Option<TemplateConfig>,
}

impl PackageConfig {
    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Yaml`] if the document is malformed or lists a
    /// version twice.
    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Read`] if the file cannot be read, or
    /// [`SchemaError::Yaml`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Recipe folder of an explicitly listed version.
    pub fn folder_for(&self, version: &str) -> Option<&str> {
        self.versions.get(version).map(|v| v.folder.as_str())
    }
}

/// Deserialize the `versions` mapping, rejecting duplicate keys instead of
/// letting the last one win silently.
fn unique_versions<'de, D>(deserializer: D) -> Result<BTreeMap<String, VersionEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueVersions;

    impl<'de> Visitor<'de> for UniqueVersions {
        type Value = BTreeMap<String, VersionEntry>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of version to recipe folder")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut versions = BTreeMap::new();
            while let Some((version, entry)) = map.next_entry::<String, VersionEntry>()? {
                if versions.contains_key(&version) {
                    return Err(de::Error::custom(format!(
                        "duplicate version `{version}` in versions"
                    )));
                }
                versions.insert(version, entry);
            }
            Ok(versions)
        }
    }

    deserializer.deserialize_any(UniqueVersions)
}
