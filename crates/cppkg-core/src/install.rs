//! The install sequence.
//!
//! ```text
//! Resolving -> Materializing -> Packaging -> RegistryRedirected
//!           -> Building -> Restoring -> Done | Failed
//! ```
//!
//! Packages with an explicit recipe in the index skip straight to
//! `Building`; the registry is only redirected for synthesized versions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cppkg_schema::{EXPORT_ARCHIVE, RecipeRevision, TemplateConfig};
use tracing::{debug, error};

use crate::conan::{BuildTool, CONAN_CENTER, INSTALL_LOG, InstallRequest};
use crate::error::InstallError;
use crate::export::SynthesizedManifest;
use crate::lock::InstallLock;
use crate::paths::{CacheLayout, recreate_dir};
use crate::proxy::{EmulatedPackage, PROXY_LOG, RegistryProxy};
use crate::redirect::{self, RegistryRedirect};
use crate::release;
use crate::reporter::{Phase, Reporter};
use crate::resolver::ResolvedPackage;
use crate::template::{check_url_pattern, materialize};

/// Shared inputs of an install.
#[derive(Clone)]
pub struct InstallContext {
    /// Cache directories.
    pub layout: CacheLayout,
    /// HTTP client for release metadata.
    pub client: reqwest::Client,
    /// GitHub API base URL.
    pub release_api: String,
    /// Progress sink.
    pub reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for InstallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallContext")
            .field("layout", &self.layout)
            .field("release_api", &self.release_api)
            .finish_non_exhaustive()
    }
}

/// What an install produced.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// `name/version` reference that was installed.
    pub reference: String,
    /// Working directory holding generated files and logs.
    pub work_dir: PathBuf,
    /// Revision served for a synthesized recipe.
    pub revision: Option<RecipeRevision>,
}

/// Install `pkg` using the recipe in `recipe_dir`.
///
/// # Errors
///
/// Returns the first failure of any phase. The registry remote is restored
/// before this returns, whatever the outcome.
pub async fn install<T: BuildTool + ?Sized>(
    ctx: &InstallContext,
    tool: &T,
    pkg: &ResolvedPackage,
    recipe_dir: &Path,
) -> Result<InstallOutcome, InstallError> {
    let result = match &pkg.template {
        None => install_indexed(ctx, tool, pkg, recipe_dir).await,
        Some(template) => install_synthesized(ctx, tool, pkg, template, recipe_dir).await,
    };

    match &result {
        Ok(outcome) => ctx.reporter.phase(Phase::Done, &outcome.reference),
        Err(e) => ctx.reporter.phase(Phase::Failed, &e.to_string()),
    }
    result
}

fn prepare_work_dir(ctx: &InstallContext, pkg: &ResolvedPackage) -> Result<PathBuf, InstallError> {
    let work_dir = ctx.layout.build_dir(&pkg.name, &pkg.version);
    recreate_dir(&work_dir)?;
    debug!(work_dir = %work_dir.display(), "prepared working directory");
    Ok(work_dir)
}

async fn install_indexed<T: BuildTool + ?Sized>(
    ctx: &InstallContext,
    tool: &T,
    pkg: &ResolvedPackage,
    recipe_dir: &Path,
) -> Result<InstallOutcome, InstallError> {
    let work_dir = prepare_work_dir(ctx, pkg)?;
    let request = InstallRequest {
        reference: pkg.reference(),
        output_dir: work_dir.clone(),
        recipe_dir: recipe_dir.to_path_buf(),
        log_path: work_dir.join(INSTALL_LOG),
    };

    ctx.reporter.phase(Phase::Building, &request.reference);
    tool.install(&request).await?;

    Ok(InstallOutcome {
        reference: request.reference,
        work_dir,
        revision: None,
    })
}

/// Publish time of the upstream release, or now when it cannot be found.
async fn release_time(ctx: &InstallContext, pkg: &ResolvedPackage) -> DateTime<Utc> {
    match release::fetch_for_version(&ctx.client, &ctx.release_api, &pkg.path, &pkg.version).await
    {
        Ok(release) => release.published_at.unwrap_or_else(Utc::now),
        Err(e) => {
            ctx.reporter.warning(&format!(
                "no release metadata for {}@{} ({e}); using local time",
                pkg.path, pkg.version
            ));
            Utc::now()
        }
    }
}

async fn install_synthesized<T: BuildTool + ?Sized>(
    ctx: &InstallContext,
    tool: &T,
    pkg: &ResolvedPackage,
    template: &TemplateConfig,
    recipe_dir: &Path,
) -> Result<InstallOutcome, InstallError> {
    let work_dir = prepare_work_dir(ctx, pkg)?;

    ctx.reporter.phase(
        Phase::Materializing,
        &format!("{} from {}", pkg.reference(), template.from_version),
    );
    let recipe = materialize(recipe_dir, &work_dir, &template.from_version, &pkg.version)?;
    if !check_url_pattern(&recipe, &pkg.version, &template.expand_url(&pkg.version)) {
        ctx.reporter.warning("source URL in the recipe differs from the template URL pattern");
    }
    let published = release_time(ctx, pkg).await;

    ctx.reporter.phase(Phase::Packaging, &pkg.reference());
    let manifest = SynthesizedManifest::build(recipe.descriptor_yaml, recipe.recipe, published)?;
    std::fs::write(work_dir.join(EXPORT_ARCHIVE), manifest.export_archive())?;
    let revision = manifest.revision().clone();

    let lock = InstallLock::acquire(ctx.layout.lock_path())?;
    let previous = redirect::capture(tool, CONAN_CENTER)?;
    let upstream = redirect::upstream_url(previous.as_ref());

    let proxy = RegistryProxy::start(
        Some(EmulatedPackage {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            manifest,
        }),
        &upstream,
        Some(&work_dir.join(PROXY_LOG)),
    )
    .await?;

    let request = InstallRequest {
        reference: pkg.reference(),
        output_dir: work_dir.clone(),
        recipe_dir: recipe.dir,
        log_path: work_dir.join(INSTALL_LOG),
    };

    let redirected = RegistryRedirect::redirect(tool, CONAN_CENTER, previous, &proxy.url())?;
    ctx.reporter.phase(
        Phase::RegistryRedirected,
        &format!("{CONAN_CENTER} -> {} (upstream {upstream})", proxy.url()),
    );

    ctx.reporter.phase(Phase::Building, &request.reference);
    let built = tool.install(&request).await;

    ctx.reporter.phase(Phase::Restoring, CONAN_CENTER);
    let restored = redirected.restore();
    proxy.shutdown().await;
    drop(lock);

    if let (Err(_), Err(e)) = (&built, &restored) {
        error!("failed to restore registry remote after build failure: {e}");
        ctx.reporter
            .error(&format!("registry remote {CONAN_CENTER} was not restored: {e}"));
    }
    built?;
    restored?;

    Ok(InstallOutcome {
        reference: request.reference,
        work_dir,
        revision: Some(revision),
    })
}
