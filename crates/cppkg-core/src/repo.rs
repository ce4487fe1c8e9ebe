//! Package paths as used by the recipe index and GitHub.

/// A validated package path in `owner/name` format.
///
/// The same string addresses the package directory inside the recipe index
/// and the upstream GitHub repository.
///
/// # Example
///
/// ```
/// use cppkg_core::repo::PackagePath;
///
/// let path = PackagePath::new("acme/widget").unwrap();
/// assert_eq!(path.owner(), "acme");
/// assert_eq!(path.name(), "widget");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackagePath(String);

impl PackagePath {
    /// Create a new `PackagePath`, validating the `owner/name` format.
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is not in `owner/name` format, if either
    /// component is empty, or if a component would escape the index
    /// directory.
    pub fn new(s: &str) -> Result<Self, String> {
        if let Some((owner, name)) = s.split_once('/') {
            let valid = |part: &str| {
                !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
            };
            if valid(owner) && valid(name) {
                return Ok(Self(s.to_string()));
            }
        }
        Err(format!(
            "Invalid package path: expected 'owner/name', got '{s}'"
        ))
    }

    /// Get the owner part.
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map_or("", |(owner, _)| owner)
    }

    /// Get the package name, which is also the Conan reference name.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, name)| name)
    }

    /// Return the raw `owner/name` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackagePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
