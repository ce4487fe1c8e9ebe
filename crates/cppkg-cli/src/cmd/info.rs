//! Info command

use std::path::Path;

use anyhow::Result;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{ContentArrangement, Table};
use cppkg_core::PackagePath;
use cppkg_schema::{DescriptorCache, PackageConfig, compare_versions};
use crossterm::style::Stylize;

use crate::Settings;

/// One explicit version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    pub version: String,
    pub folder: String,
    pub source: String,
}

/// Explicit versions, newest first, with the source URL of each.
///
/// Recipes are read from `package_dir`; a recipe whose descriptor is
/// missing or lacks the version shows `-` as its source.
pub fn version_rows(
    config: &PackageConfig,
    package_dir: &Path,
    cache: &mut DescriptorCache,
) -> Vec<VersionRow> {
    let mut rows: Vec<VersionRow> = config
        .versions
        .iter()
        .map(|(version, entry)| {
            let source = cache
                .get(&package_dir.join(&entry.folder))
                .ok()
                .and_then(|descriptor| descriptor.entry(version).ok().flatten())
                .map_or_else(|| "-".to_string(), |e| e.urls().join("\n"));
            VersionRow {
                version: version.clone(),
                folder: entry.folder.clone(),
                source,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        compare_versions(&b.version, &a.version)
            .unwrap_or_else(|| b.version.cmp(&a.version))
    });
    rows
}

/// Show the explicit versions and the template range of a package.
pub fn info(settings: &Settings, package: &str) -> Result<()> {
    let path = PackagePath::new(package).map_err(anyhow::Error::msg)?;
    let resolver = settings.resolver();
    resolver
        .index()
        .ensure(&settings.locator(), settings.auto_update)?;

    let config = resolver.config(&path)?;
    let package_dir = resolver.index().package_dir(path.as_str());
    let mut cache = DescriptorCache::new();
    let rows = version_rows(&config, &package_dir, &mut cache);

    println!();
    println!("  {}", path.as_str().white().bold());
    println!();

    if rows.is_empty() {
        println!("  {}", "no explicit versions".dark_grey());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["version", "folder", "source"]);
        for row in &rows {
            table.add_row(vec![&row.version, &row.folder, &row.source]);
        }
        println!("{table}");
    }

    if let Some(template) = &config.template {
        println!();
        println!(
            "  {:<10}{} synthesized from folder {}",
            "template",
            format!(">= {}", template.from_version).green(),
            template.folder
        );
        if !template.url_pattern.is_empty() {
            println!("  {:<10}{}", "", template.url_pattern.as_str().dark_grey());
        }
    }
    Ok(())
}
