//! Version selection over discovered installations

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::discovery::{InstallationDiscovery, InstallationRecord};
use crate::error::ResolveError;
use crate::version::Version;
use crate::Result;

/// Picks the installation directory for one application.
///
/// Selection rules:
/// * an override directory that exists always wins
/// * a requested version matches exactly, else the lowest installed version above it
/// * no requested version picks the highest installed version
pub struct InstallationResolver {
    app: String,
    override_dir: Option<PathBuf>,
    discovery: Box<dyn InstallationDiscovery>,
}

impl InstallationResolver {
    pub fn new(app: impl Into<String>, discovery: impl InstallationDiscovery + 'static) -> Self {
        Self {
            app: app.into(),
            override_dir: None,
            discovery: Box::new(discovery),
        }
    }

    pub fn with_override(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    /// Every installation discovery reports, sorted by version ascending.
    pub fn installations(&self) -> Result<Vec<InstallationRecord>> {
        let mut records = self.discovery.discover()?;
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }

    pub fn try_resolve(&self, version: Option<&str>) -> Result<PathBuf> {
        if let Some(dir) = &self.override_dir {
            if dir.exists() {
                debug!(app = %self.app, dir = %dir.display(), "using override installation");
                return Ok(dir.clone());
            }
            warn!(app = %self.app, dir = %dir.display(), "override installation does not exist, ignoring");
        }

        let records = self.installations()?;
        if records.is_empty() {
            return Err(ResolveError::NoInstallations {
                app: self.app.clone(),
            });
        }

        let Some(requested) = version else {
            // Sorted ascending, so the last record is the newest.
            return records
                .last()
                .map(|r| r.install_dir.clone())
                .ok_or_else(|| ResolveError::NoInstallations {
                    app: self.app.clone(),
                });
        };

        let wanted = Version::parse(requested)?;
        if let Some(exact) = records
            .iter()
            .find(|r| r.version.as_str() == requested.trim())
            .or_else(|| records.iter().find(|r| r.version == wanted))
        {
            return Ok(exact.install_dir.clone());
        }

        records
            .iter()
            .find(|r| r.version > wanted)
            .map(|r| r.install_dir.clone())
            .ok_or_else(|| ResolveError::NoMatchingVersion {
                app: self.app.clone(),
                requested: requested.to_string(),
                installed: records
                    .iter()
                    .map(|r| r.version.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Like [`try_resolve`](Self::try_resolve), but failures become a warning and `None`.
    pub fn resolve(&self, version: Option<&str>) -> Option<PathBuf> {
        match self.try_resolve(version) {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(app = %self.app, requested = ?version, error = %e, "installation not resolved");
                None
            }
        }
    }
}

impl std::fmt::Debug for InstallationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationResolver")
            .field("app", &self.app)
            .field("override_dir", &self.override_dir)
            .finish_non_exhaustive()
    }
}
