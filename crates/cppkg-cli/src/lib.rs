//! cppkg - install any upstream release of a Conan C/C++ package
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Directory Layout
//!
//! ```text
//! <cache-dir>/                 # default: <user cache>/cppkg
//! ├── index/                   # clone of the recipe index
//! ├── build/<name>@<version>/  # recipe, export archive, logs, generated files
//! └── install.lock
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cppkg_core::index::DEFAULT_INDEX_URL;
use cppkg_core::paths::try_default_cache_root;
use cppkg_core::release::GITHUB_API;
use cppkg_core::{CacheLayout, IndexStore, Locator, LookupFlags, RecipeResolver};

pub use cppkg_core::USER_AGENT;

#[derive(Debug, Parser)]
#[command(name = "cppkg")]
#[command(
    author,
    version,
    about = "cppkg - install any upstream release of a Conan C/C++ package"
)]
pub struct Cli {
    /// Cache directory for the recipe index and build folders
    #[arg(long, global = true, env = "CPPKG_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Git URL of the recipe index
    #[arg(long, global = true, env = "CPPKG_INDEX_URL", default_value = DEFAULT_INDEX_URL)]
    pub index_url: String,

    /// Use the local recipe index as is, without pulling
    #[arg(long, global = true)]
    pub no_update: bool,

    /// Hide package manager output when installing missing tools
    #[arg(long, global = true)]
    pub quiet_install: bool,

    /// GitHub API base URL
    #[arg(long, global = true, env = "CPPKG_GITHUB_API", default_value = GITHUB_API, hide = true)]
    pub github_api: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a package: owner/name or owner/name@1.2.0
    Install {
        /// Package specifier; without a version the latest GitHub release is used
        spec: String,
    },
    /// Show the versions a package can be installed at
    Info {
        /// Package path (owner/name)
        package: String,
    },
    /// Clone or fast-forward the recipe index
    Update,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Settings shared by every command, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub layout: CacheLayout,
    pub index_url: String,
    pub auto_update: bool,
    pub quiet_install: bool,
    pub github_api: String,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => try_default_cache_root()
                .context("Could not determine a cache directory; pass --cache-dir")?,
        };
        Ok(Self {
            layout: CacheLayout::new(root),
            index_url: cli.index_url.clone(),
            auto_update: !cli.no_update,
            quiet_install: cli.quiet_install,
            github_api: cli.github_api.clone(),
        })
    }

    pub fn index(&self) -> IndexStore {
        IndexStore::new(self.layout.index_dir(), self.index_url.clone())
    }

    pub fn resolver(&self) -> RecipeResolver {
        RecipeResolver::new(self.index())
    }

    pub fn locator(&self) -> Locator {
        Locator::new(self.quiet_install)
    }

    pub fn lookup_flags(&self) -> LookupFlags {
        LookupFlags {
            index_auto_update: self.auto_update,
            quiet_tool_install: self.quiet_install,
        }
    }
}
