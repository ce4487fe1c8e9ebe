//! Synthesize a recipe for a new version from a reference recipe.

use std::path::{Path, PathBuf};

use cppkg_schema::{DESCRIPTOR_FILE, RECIPE_FILE, SchemaError, SourceDescriptor};
use fs_extra::dir::CopyOptions;
use tracing::{debug, warn};

use crate::error::InstallError;

/// A rewritten recipe on disk, plus the bytes served for it.
#[derive(Debug, Clone)]
pub struct MaterializedRecipe {
    /// Folder holding the rewritten recipe.
    pub dir: PathBuf,
    /// Rewritten descriptor.
    pub descriptor: SourceDescriptor,
    /// Rewritten descriptor exactly as written to disk.
    pub descriptor_yaml: Vec<u8>,
    /// Recipe script, unchanged.
    pub recipe: Vec<u8>,
}

impl MaterializedRecipe {
    /// Source URLs of the synthesized version.
    pub fn urls(&self, version: &str) -> Vec<String> {
        match self.descriptor.entry(version) {
            Ok(Some(entry)) => entry.urls().into_iter().map(String::from).collect(),
            _ => Vec::new(),
        }
    }
}

/// Copy the contents of `reference_dir` into `target_dir`, overwriting.
fn copy_recipe(reference_dir: &Path, target_dir: &Path) -> Result<(), InstallError> {
    if !reference_dir.is_dir() {
        return Err(InstallError::IndexUnavailable(format!(
            "reference recipe folder {} is missing",
            reference_dir.display()
        )));
    }
    std::fs::create_dir_all(target_dir)?;

    let options = CopyOptions::new().overwrite(true).content_only(true);
    fs_extra::dir::copy(reference_dir, target_dir, &options).map_err(|e| {
        InstallError::IndexUnavailable(format!(
            "failed to copy {} to {}: {e}",
            reference_dir.display(),
            target_dir.display()
        ))
    })?;
    Ok(())
}

/// Materialize version `to` of a recipe from its `from` reference.
///
/// The reference folder is copied into `target_dir`, then its
/// `conandata.yml` is rewritten so `sources` holds only `to`, derived from
/// the `from` entry by replacing every occurrence of `from` in every URL.
/// Checksums are dropped.
///
/// # Errors
///
/// - [`InstallError::IndexUnavailable`] if the reference folder or its
///   descriptor is missing
/// - [`InstallError::VersionNotFound`] if the descriptor has no `from` entry
/// - [`InstallError::ConfigParse`] if the descriptor or entry is malformed
pub fn materialize(
    reference_dir: &Path,
    target_dir: &Path,
    from: &str,
    to: &str,
) -> Result<MaterializedRecipe, InstallError> {
    copy_recipe(reference_dir, target_dir)?;

    let descriptor_path = target_dir.join(DESCRIPTOR_FILE);
    let mut descriptor = SourceDescriptor::load(&descriptor_path)
        .map_err(|e| InstallError::from_schema(&descriptor_path, e))?;

    let entry = descriptor
        .entry(from)
        .map_err(|e| InstallError::from_schema(&descriptor_path, e))?
        .ok_or_else(|| {
            InstallError::version_not_found(
                reference_dir.display().to_string(),
                from,
                format!("{DESCRIPTOR_FILE} has no sources entry for the template version"),
            )
        })?;

    let rewritten = entry.retarget(from, to);
    debug!(from, to, urls = ?rewritten.urls(), "rewrote source entry");

    let to_yaml = |e: SchemaError| InstallError::from_schema(&descriptor_path, e);
    descriptor.set_single_source(to, &rewritten).map_err(to_yaml)?;
    let descriptor_yaml = descriptor.to_yaml().map_err(to_yaml)?.into_bytes();
    std::fs::write(&descriptor_path, &descriptor_yaml)?;

    let recipe_path = target_dir.join(RECIPE_FILE);
    let recipe = std::fs::read(&recipe_path).map_err(|e| {
        InstallError::IndexUnavailable(format!("cannot read {}: {e}", recipe_path.display()))
    })?;

    Ok(MaterializedRecipe {
        dir: target_dir.to_path_buf(),
        descriptor,
        descriptor_yaml,
        recipe,
    })
}

/// Warn when none of the synthesized URLs matches what the template's URL
/// pattern predicts.
///
/// Returns whether the pattern matched. An empty pattern is never checked.
pub fn check_url_pattern(recipe: &MaterializedRecipe, version: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return true;
    }
    let urls = recipe.urls(version);
    if urls.iter().any(|u| u == expected) {
        return true;
    }
    warn!(
        version,
        expected,
        ?urls,
        "rewritten source URLs do not match the template URL pattern"
    );
    false
}
