//! Version ordering and package specifiers.
//!
//! Supports:
//! - Latest: `acme/widget` or `acme/widget@latest`
//! - Exact: `acme/widget@1.2.0`

use std::cmp::Ordering;

/// Parsed `owner/name[@version]` specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package path inside the index (`owner/name`).
    pub path: String,
    /// Requested version, `None` for the latest release.
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parse a package specifier like `acme/widget` or `acme/widget@1.2.0`.
    ///
    /// # Errors
    ///
    /// Returns a message if the path or the version after `@` is empty.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let (path, version) = match spec.split_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    return Err("invalid package specifier: missing version after @".to_string());
                }
                (path, (version != "latest").then(|| version.to_string()))
            }
            None => (spec, None),
        };
        if path.is_empty() {
            return Err("invalid package specifier: missing package path".to_string());
        }
        Ok(Self {
            path: path.to_string(),
            version,
        })
    }
}

/// Compare two versions with semantic-version precedence.
///
/// Recipe versions are often shorter than semver requires, so a leading `v`
/// is ignored and missing minor/patch components count as zero (`1.2` is
/// `1.2.0`). Returns `None` if either side is not a version at all.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_lenient(a)?.cmp(&parse_lenient(b)?))
}

fn parse_lenient(version: &str) -> Option<semver::Version> {
    let version = version.strip_prefix('v').unwrap_or(version);
    if let Ok(v) = semver::Version::parse(version) {
        return Some(v);
    }

    // Split off pre-release / build metadata, then pad the numeric core.
    let split = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    semver::Version::parse(&format!("{padded}{suffix}")).ok()
}
