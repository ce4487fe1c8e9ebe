//! Install command

use std::sync::Arc;

use anyhow::{Context, Result};
use cppkg_core::release;
use cppkg_core::{Conan, InstallContext, PackagePath, Phase, Reporter, USER_AGENT};
use cppkg_schema::PackageSpec;
use tracing::debug;

use crate::Settings;
use crate::ui::ConsoleReporter;

/// Install `spec` (`owner/name[@version]`).
///
/// Without a version the latest GitHub release of `owner/name` is used.
pub async fn install(settings: &Settings, spec: &str) -> Result<()> {
    let spec = PackageSpec::parse(spec).map_err(anyhow::Error::msg)?;
    let path = PackagePath::new(&spec.path).map_err(anyhow::Error::msg)?;
    let reporter = Arc::new(ConsoleReporter::new());
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let version = match spec.version {
        Some(version) => version,
        None => {
            let version = release::latest_version(&client, &settings.github_api, path.as_str())
                .await
                .with_context(|| {
                    format!(
                        "Could not determine the latest release of {path}; \
                         pass a version as {path}@<version>"
                    )
                })?;
            reporter.info(&format!("latest release of {path} is {version}"));
            version
        }
    };

    reporter.phase(Phase::Resolving, &format!("{path}@{version}"));
    let resolver = settings.resolver();
    let pkg = resolver.lookup(&path, &version, settings.lookup_flags())?;
    let recipe_dir = resolver.recipe_dir(&pkg);
    debug!(recipe_dir = %recipe_dir.display(), "using recipe");
    if let Some(template) = &pkg.template {
        reporter.info(&format!(
            "{} is not in the index; synthesizing it from {}",
            pkg.reference(),
            template.from_version
        ));
    }

    let conan = Conan::locate(&settings.locator())?;
    debug!(conan = %conan.program().display(), "using build tool");
    let ctx = InstallContext {
        layout: settings.layout.clone(),
        client,
        release_api: settings.github_api.clone(),
        reporter: reporter.clone(),
    };

    let outcome = cppkg_core::install(&ctx, &conan, &pkg, &recipe_dir)
        .await
        .with_context(|| format!("Failed to install {}", pkg.reference()))?;

    reporter.success(&format!(
        "installed {} into {}",
        outcome.reference,
        outcome.work_dir.display()
    ));
    Ok(())
}
