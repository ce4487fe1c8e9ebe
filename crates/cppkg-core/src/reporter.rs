//! Reporter trait for dependency injection
//!
//! Core install logic reports progress through this trait so it stays
//! independent of how the CLI renders it.

use std::fmt;

/// Install lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Looking the package up in the index.
    Resolving,
    /// Rewriting the reference recipe for the requested version.
    Materializing,
    /// Building the manifest and export archive.
    Packaging,
    /// The build tool's registry points at the local proxy.
    RegistryRedirected,
    /// `conan install` is running.
    Building,
    /// Putting the registry configuration back.
    Restoring,
    /// Install finished successfully.
    Done,
    /// Install failed.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolving => "Resolving",
            Self::Materializing => "Materializing",
            Self::Packaging => "Packaging",
            Self::RegistryRedirected => "Redirected",
            Self::Building => "Building",
            Self::Restoring => "Restoring",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Sink for user-facing progress.
pub trait Reporter: Send + Sync {
    /// The install entered `phase`.
    fn phase(&self, phase: Phase, detail: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn phase(&self, phase: Phase, detail: &str) {
        (**self).phase(phase, detail);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn phase(&self, _phase: Phase, _detail: &str) {}
    fn info(&self, _msg: &str) {}
    fn success(&self, _msg: &str) {}
    fn warning(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}
