//! Recipe source descriptor (`conandata.yml`).
//!
//! Only the `sources` table is interpreted. Every other top-level key
//! (`patches`, ...) is carried through a rewrite untouched.
//!
//! Entries are kept as raw YAML until a caller asks for one version, so a
//! recipe with an exotic entry for some unrelated version can still be used
//! as a template reference.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

use crate::SchemaError;

/// Checksum keys that become invalid once a URL changes.
const LEGACY_CHECKSUM_KEYS: &[&str] = &["sha1", "md5"];

/// One or more mirror URLs for the same archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceUrl {
    /// A single URL.
    One(String),
    /// Mirrors, tried in order by the build tool.
    Many(Vec<String>),
}

impl SourceUrl {
    /// All URLs as string slices.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            Self::One(url) => vec![url.as_str()],
            Self::Many(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    fn replace_all(&self, from: &str, to: &str) -> Self {
        match self {
            Self::One(url) => Self::One(url.replace(from, to)),
            Self::Many(urls) => Self::Many(urls.iter().map(|u| u.replace(from, to)).collect()),
        }
    }
}

/// A single download record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Archive location.
    pub url: SourceUrl,
    /// Expected archive digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Remaining keys (`strip_root`, platform selectors, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceRecord {
    fn retarget(&self, from: &str, to: &str) -> Self {
        let mut extra = self.extra.clone();
        for key in LEGACY_CHECKSUM_KEYS {
            extra.remove(*key);
        }
        Self {
            url: self.url.replace_all(from, to),
            sha256: None,
            extra,
        }
    }
}

/// Source entry for one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceEntry {
    /// The common form: one record.
    Single(SourceRecord),
    /// Legacy conditional form: several records, usually one per platform.
    Sequence(Vec<SourceRecord>),
}

impl SourceEntry {
    /// Every URL in the entry, in document order.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            Self::Single(record) => record.url.urls(),
            Self::Sequence(records) => records.iter().flat_map(|r| r.url.urls()).collect(),
        }
    }

    /// Rewrite the entry for another version.
    ///
    /// Every substring occurrence of `from` in every URL is replaced with
    /// `to`, and all checksums are dropped since they cannot match the new
    /// archive.
    pub fn retarget(&self, from: &str, to: &str) -> Self {
        match self {
            Self::Single(record) => Self::Single(record.retarget(from, to)),
            Self::Sequence(records) => {
                Self::Sequence(records.iter().map(|r| r.retarget(from, to)).collect())
            }
        }
    }

    /// Whether any record still carries a checksum.
    pub fn has_checksum(&self) -> bool {
        let check = |r: &SourceRecord| {
            r.sha256.is_some() || LEGACY_CHECKSUM_KEYS.iter().any(|k| r.extra.contains_key(*k))
        };
        match self {
            Self::Single(record) => check(record),
            Self::Sequence(records) => records.iter().any(check),
        }
    }
}

/// Parsed `conandata.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Raw source entries keyed by version.
    #[serde(default)]
    pub sources: BTreeMap<String, Value>,
    /// Top-level keys other than `sources`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceDescriptor {
    /// Parse a descriptor document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Yaml`] if the document is malformed.
    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Read and parse a descriptor file.
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

    /// Serialize back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Yaml`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Decode the entry for `version`.
    ///
    /// Returns `Ok(None)` when the version is not listed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::SourceShape`] if the entry is neither a record
    /// nor a sequence of records.
    pub fn entry(&self, version: &str) -> Result<Option<SourceEntry>, SchemaError> {
        let Some(raw) = self.sources.get(version) else {
            return Ok(None);
        };
        serde_yaml_ng::from_value(raw.clone())
            .map(Some)
            .map_err(|e| SchemaError::SourceShape {
                version: version.to_string(),
                reason: e.to_string(),
            })
    }

    /// Replace the whole `sources` table with a single entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Yaml`] if the entry cannot be converted to YAML.
    pub fn set_single_source(
        &mut self,
        version: &str,
        entry: &SourceEntry,
    ) -> Result<(), SchemaError> {
        let value = serde_yaml_ng::to_value(entry)?;
        self.sources = BTreeMap::from([(version.to_string(), value)]);
        Ok(())
    }
}

/// Descriptors parsed so far, keyed by recipe folder.
///
/// Many versions of a package usually share one folder, so listing them
/// would otherwise re-read the same file once per version.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    loaded: HashMap<PathBuf, Arc<SourceDescriptor>>,
}

impl DescriptorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor of the recipe in `folder`, parsing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the read or parse error of the first attempt; failures are
    /// not cached.
    pub fn get(&mut self, folder: &Path) -> Result<Arc<SourceDescriptor>, SchemaError> {
        if let Some(descriptor) = self.loaded.get(folder) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(SourceDescriptor::load(&folder.join(crate::DESCRIPTOR_FILE))?);
        self.loaded.insert(folder.to_path_buf(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Number of folders parsed so far.
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Whether nothing has been parsed yet.
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGET: &str = r#"
sources:
  "1.2.0":
    url: "https://host/lib-1.2.0/lib-1.2.0.tar.gz"
    sha256: "abc"
  "1.1.0":
    url:
      - "https://mirror-a/lib-1.1.0.tar.gz"
      - "https://mirror-b/lib-1.1.0.tar.gz"
    sha256: "def"
patches:
  "1.2.0":
    - patch_file: "patches/fix.patch"
"#;

    #[test]
    fn test_single_entry_rewrites_every_occurrence() {
        let descriptor = SourceDescriptor::from_yaml(WIDGET).unwrap();
        let entry = descriptor.entry("1.2.0").unwrap().unwrap();
        let rewritten = entry.retarget("1.2.0", "1.3.0");

        assert_eq!(
            rewritten.urls(),
            vec!["https://host/lib-1.3.0/lib-1.3.0.tar.gz"]
        );
        assert!(entry.has_checksum());
        assert!(!rewritten.has_checksum());
    }

    #[test]
    fn test_mirror_list_rewritten() {
        let descriptor = SourceDescriptor::from_yaml(WIDGET).unwrap();
        let entry = descriptor.entry("1.1.0").unwrap().unwrap();
        let rewritten = entry.retarget("1.1.0", "1.1.5");

        assert_eq!(
            rewritten.urls(),
            vec![
                "https://mirror-a/lib-1.1.5.tar.gz",
                "https://mirror-b/lib-1.1.5.tar.gz"
            ]
        );
    }

    #[test]
    fn test_sequence_entry() {
        let descriptor = SourceDescriptor::from_yaml(
            r#"
sources:
  "2.0":
    - url: "https://host/win/tool-2.0.zip"
      sha256: "aaa"
      os: Windows
    - url: "https://host/linux/tool-2.0.tar.gz"
      sha1: "bbb"
      os: Linux
"#,
        )
        .unwrap();

        let entry = descriptor.entry("2.0").unwrap().unwrap();
        assert!(matches!(entry, SourceEntry::Sequence(ref r) if r.len() == 2));

        let rewritten = entry.retarget("2.0", "2.1");
        assert!(!rewritten.has_checksum());
        let SourceEntry::Sequence(records) = &rewritten else {
            panic!("sequence expected");
        };
        assert_eq!(records[1].extra.get("os"), Some(&Value::from("Linux")));
        assert_eq!(
            rewritten.urls(),
            vec![
                "https://host/win/tool-2.1.zip",
                "https://host/linux/tool-2.1.tar.gz"
            ]
        );
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        let descriptor = SourceDescriptor::from_yaml(
            "sources:\n  \"1.0\": \"https://host/a.tar.gz\"\n  \"2.0\":\n    url: x\n",
        )
        .unwrap();

        assert!(matches!(
            descriptor.entry("1.0"),
            Err(SchemaError::SourceShape { .. })
        ));
        // Unrelated odd entries do not affect other versions.
        assert!(descriptor.entry("2.0").unwrap().is_some());
        assert!(descriptor.entry("3.0").unwrap().is_none());
    }

    #[test]
    fn test_set_single_source_keeps_other_keys() {
        let mut descriptor = SourceDescriptor::from_yaml(WIDGET).unwrap();
        let entry = descriptor.entry("1.2.0").unwrap().unwrap();
        descriptor
            .set_single_source("1.3.0", &entry.retarget("1.2.0", "1.3.0"))
            .unwrap();

        let yaml = descriptor.to_yaml().unwrap();
        let reparsed = SourceDescriptor::from_yaml(&yaml).unwrap();

        assert_eq!(reparsed.sources.len(), 1);
        assert!(reparsed.extra.contains_key("patches"));
        assert!(!yaml.contains("sha256"));
        assert!(yaml.contains("https://host/lib-1.3.0/lib-1.3.0.tar.gz"));
    }

    #[test]
    fn test_cache_parses_each_folder_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::DESCRIPTOR_FILE), WIDGET).unwrap();

        let mut cache = DescriptorCache::new();
        let first = cache.get(dir.path()).unwrap();
        let second = cache.get(dir.path()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let missing = dir.path().join("nope");
        assert!(cache.get(&missing).is_err());
        assert_eq!(cache.len(), 1);
    }
}
