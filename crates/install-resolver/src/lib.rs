//! Install-Resolver: locate application installations by version
//!
//! Render nodes can carry several versions of the same interpreter or renderer. This
//! crate enumerates them through a per-platform [`InstallationDiscovery`] strategy and
//! picks one for a requested version.
//!
//! Versions compare numerically, segment by segment. A request is satisfied by an exact
//! match, otherwise by the lowest installed version above it.

pub mod discovery;
pub mod error;
pub mod resolver;
pub mod version;

pub use discovery::{
    platform_default, ChainedDiscovery, DirectoryScanDiscovery, InstallationDiscovery,
    InstallationRecord, StaticDiscovery,
};
pub use error::ResolveError;
pub use resolver::InstallationResolver;
pub use version::Version;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolveError>;
