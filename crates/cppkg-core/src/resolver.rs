//! Map a requested `owner/name@version` onto a recipe in the index.
//!
//! Explicit version entries always win. Versions without one fall back to
//! the package template, provided they sort at or above its reference
//! version.

use std::cmp::Ordering;
use std::path::PathBuf;

use cppkg_schema::{CONFIG_FILE, PackageConfig, SchemaError, TemplateConfig, compare_versions};
use tracing::debug;

use crate::error::InstallError;
use crate::index::IndexStore;
use crate::locator::Locator;
use crate::repo::PackagePath;

/// Switches controlling index and tool side effects during a lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupFlags {
    /// Fast-forward the index before reading it.
    pub index_auto_update: bool,
    /// Discard output of tool installers.
    pub quiet_tool_install: bool,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Conan reference name (last path segment).
    pub name: String,
    /// `owner/name` path inside the index.
    pub path: String,
    /// Requested version.
    pub version: String,
    /// Recipe folder relative to the package directory.
    pub folder: String,
    /// Set when the recipe must be synthesized from the package template.
    pub template: Option<TemplateConfig>,
}

impl ResolvedPackage {
    /// Conan reference `name/version`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Whether the recipe must be synthesized.
    pub fn is_templated(&self) -> bool {
        self.template.is_some()
    }
}

/// Resolve `version` of `path` against an already parsed config.
///
/// # Errors
///
/// Returns [`InstallError::VersionNotFound`] if the version is not listed and
/// no template covers it.
pub fn resolve_in(
    config: &PackageConfig,
    path: &PackagePath,
    version: &str,
) -> Result<ResolvedPackage, InstallError> {
    let resolved = |folder: &str, template: Option<TemplateConfig>| ResolvedPackage {
        name: path.name().to_string(),
        path: path.as_str().to_string(),
        version: version.to_string(),
        folder: folder.to_string(),
        template,
    };

    if let Some(folder) = config.folder_for(version) {
        return Ok(resolved(folder, None));
    }

    let Some(template) = &config.template else {
        return Err(InstallError::version_not_found(
            path.as_str(),
            version,
            "no recipe for this version and no template",
        ));
    };

    match compare_versions(version, &template.from_version) {
        Some(Ordering::Greater | Ordering::Equal) => {
            Ok(resolved(&template.folder, Some(template.clone())))
        }
        Some(Ordering::Less) => Err(InstallError::version_not_found(
            path.as_str(),
            version,
            format!("older than template version {}", template.from_version),
        )),
        None => Err(InstallError::version_not_found(
            path.as_str(),
            version,
            format!(
                "cannot order against template version {}",
                template.from_version
            ),
        )),
    }
}

/// Looks packages up in the recipe index.
#[derive(Debug, Clone)]
pub struct RecipeResolver {
    index: IndexStore,
}

impl RecipeResolver {
    /// Resolver reading from `index`.
    pub fn new(index: IndexStore) -> Self {
        Self { index }
    }

    /// The underlying index.
    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Parsed `config.yml` of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::PackageNotFound`] if the package has no
    /// config, or [`InstallError::ConfigParse`] if it is malformed.
    pub fn config(&self, path: &PackagePath) -> Result<PackageConfig, InstallError> {
        let file = self.index.package_dir(path.as_str()).join(CONFIG_FILE);
        PackageConfig::load(&file).map_err(|e| match e {
            SchemaError::Read { ref source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                InstallError::PackageNotFound(path.to_string())
            }
            e => InstallError::from_schema(&file, e),
        })
    }

    /// Ensure the index, then resolve `version` of `path`.
    ///
    /// # Errors
    ///
    /// Propagates index, config and resolution errors.
    pub fn lookup(
        &self,
        path: &PackagePath,
        version: &str,
        flags: LookupFlags,
    ) -> Result<ResolvedPackage, InstallError> {
        let locator = Locator::new(flags.quiet_tool_install);
        self.index.ensure(&locator, flags.index_auto_update)?;

        let config = self.config(path)?;
        let resolved = resolve_in(&config, path, version)?;
        debug!(
            package = %resolved.path,
            version = %resolved.version,
            folder = %resolved.folder,
            templated = resolved.is_templated(),
            "resolved package"
        );
        Ok(resolved)
    }

    /// Absolute recipe folder: `<index>/<path>/<folder>`.
    pub fn recipe_dir(&self, pkg: &ResolvedPackage) -> PathBuf {
        self.index.package_dir(&pkg.path).join(&pkg.folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
versions:
  "1.0.0":
    folder: all
  "2.0.0":
    folder: v2
template:
  from: "1.0.0"
  folder: all
  url: https://github.com/acme/widget/archive/refs/tags/v${version}.tar.gz
"#;

    fn widget() -> PackagePath {
        PackagePath::new("acme/widget").unwrap()
    }

    #[test]
    fn test_explicit_version() {
        let config = PackageConfig::from_yaml(CONFIG).unwrap();
        let pkg = resolve_in(&config, &widget(), "1.0.0").unwrap();
        assert_eq!(pkg.name, "widget");
        assert_eq!(pkg.folder, "all");
        assert!(pkg.template.is_none());
        assert_eq!(pkg.reference(), "widget/1.0.0");
    }

    #[test]
    fn test_explicit_wins_over_template() {
        let config = PackageConfig::from_yaml(CONFIG).unwrap();
        let pkg = resolve_in(&config, &widget(), "2.0.0").unwrap();
        assert_eq!(pkg.folder, "v2");
        assert!(pkg.template.is_none());
    }

    #[test]
    fn test_template_at_and_above_boundary() {
        let config = PackageConfig::from_yaml(
            "versions: {}\ntemplate:\n  from: \"1.0.0\"\n  folder: all\n  url: x\n",
        )
        .unwrap();

        let pkg = resolve_in(&config, &widget(), "1.0.0").unwrap();
        assert!(pkg.is_templated());

        let pkg = resolve_in(&config, &widget(), "1.2.0").unwrap();
        assert_eq!(
            pkg.template,
            Some(TemplateConfig {
                from_version: "1.0.0".to_string(),
                folder: "all".to_string(),
                url_pattern: "x".to_string(),
            })
        );
    }

    #[test]
    fn test_below_template_not_found() {
        let config = PackageConfig::from_yaml(CONFIG).unwrap();
        let err = resolve_in(&config, &widget(), "0.9.0").unwrap_err();
        assert!(matches!(err, InstallError::VersionNotFound { .. }));
    }

    #[test]
    fn test_no_template_not_found() {
        let config = PackageConfig::from_yaml("versions:\n  \"1.0.0\": all\n").unwrap();
        assert!(matches!(
            resolve_in(&config, &widget(), "1.1.0"),
            Err(InstallError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_unorderable_version_not_found() {
        let config = PackageConfig::from_yaml(CONFIG).unwrap();
        assert!(matches!(
            resolve_in(&config, &widget(), "nightly"),
            Err(InstallError::VersionNotFound { .. })
        ));
    }

    fn seeded_index(config: &str) -> (tempfile::TempDir, RecipeResolver) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("index");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("acme/widget/all")).unwrap();
        std::fs::write(root.join("acme/widget/config.yml"), config).unwrap();
        let resolver = RecipeResolver::new(IndexStore::new(root, "unused"));
        (tmp, resolver)
    }

    #[test]
    fn test_lookup_from_index() {
        let (_tmp, resolver) = seeded_index(CONFIG);
        let pkg = resolver
            .lookup(&widget(), "1.3.0", LookupFlags::default())
            .unwrap();

        assert!(pkg.is_templated());
        assert_eq!(
            resolver.recipe_dir(&pkg),
            resolver.index().root().join("acme/widget/all")
        );
    }

    #[test]
    fn test_missing_package() {
        let (_tmp, resolver) = seeded_index(CONFIG);
        let other = PackagePath::new("acme/gadget").unwrap();
        let err = resolver
            .lookup(&other, "1.0.0", LookupFlags::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::PackageNotFound(ref p) if p == "acme/gadget"));
    }

    #[test]
    fn test_malformed_config() {
        let (_tmp, resolver) = seeded_index("versions: [");
        let err = resolver
            .lookup(&widget(), "1.0.0", LookupFlags::default())
            .unwrap_err();
        assert!(matches!(err, InstallError::ConfigParse { .. }));
    }
}
