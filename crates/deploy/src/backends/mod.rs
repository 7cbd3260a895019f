//! Deployment sink implementations.

pub mod dryrun;
pub mod filesystem;

pub use dryrun::DryRunSink;
pub use filesystem::{FilesystemSink, ModuleEntry, PackageManifest};
