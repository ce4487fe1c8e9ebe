//! Core library for cppkg.
//!
//! Resolves packages against the recipe index, synthesizes recipes for
//! versions the index only covers through a template, and serves them to
//! Conan through a local registry proxy for the duration of one install.

pub mod conan;
pub mod error;
pub mod export;
pub mod index;
pub mod install;
pub mod locator;
pub mod lock;
pub mod paths;
pub mod proxy;
pub mod redirect;
pub mod release;
pub mod repo;
pub mod reporter;
pub mod resolver;
pub mod template;

pub use conan::{BuildTool, Conan, InstallRequest, Remote};
pub use error::InstallError;
pub use index::IndexStore;
pub use install::{InstallContext, InstallOutcome, install};
pub use locator::{Locator, Tool};
pub use paths::CacheLayout;
pub use proxy::{EmulatedPackage, RegistryProxy};
pub use redirect::RegistryRedirect;
pub use repo::PackagePath;
pub use reporter::{NullReporter, Phase, Reporter};
pub use resolver::{LookupFlags, RecipeResolver, ResolvedPackage};

/// User-Agent sent on outgoing API requests.
pub const USER_AGENT: &str = concat!("cppkg/", env!("CARGO_PKG_VERSION"));
