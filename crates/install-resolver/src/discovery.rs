//! Installation discovery strategies
//!
//! Each platform finds installed application versions differently. A strategy only
//! reports what exists; choosing between versions is the resolver's job.

use std::path::{Path, PathBuf};

use farm_core::config::{ConfigStore, CATEGORY_INSTALLATIONS};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::version::Version;
use crate::Result;

/// One installed version and the directory it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRecord {
    pub version: Version,
    pub install_dir: PathBuf,
}

impl InstallationRecord {
    pub fn new(version: Version, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            version,
            install_dir: install_dir.into(),
        }
    }
}

/// Source of installed versions for one application
pub trait InstallationDiscovery: Send + Sync {
    fn discover(&self) -> Result<Vec<InstallationRecord>>;
}

/// Fixed version → directory list, usually read from config
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    records: Vec<InstallationRecord>,
}

impl StaticDiscovery {
    pub fn new(records: Vec<InstallationRecord>) -> Self {
        Self { records }
    }

    /// Reads `installations.<app>`, an object mapping version strings to directories.
    ///
    /// Entries whose key is not a version or whose value is not a string are skipped.
    pub fn from_config(store: &dyn ConfigStore, app: &str) -> Result<Self> {
        let Some(value) = store.get(CATEGORY_INSTALLATIONS, app)? else {
            return Ok(Self::default());
        };
        let Value::Object(map) = value else {
            return Err(ResolveError::InvalidInstallList {
                app: app.to_string(),
                reason: "expected an object of version → directory".to_string(),
            });
        };

        let mut records = Vec::new();
        for (version, dir) in map {
            match (Version::parse(&version), dir.as_str()) {
                (Ok(version), Some(dir)) => records.push(InstallationRecord::new(version, dir)),
                _ => debug!(app, version = %version, "skipping unusable installation entry"),
            }
        }
        Ok(Self { records })
    }
}

impl InstallationDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<InstallationRecord>> {
        Ok(self.records.clone())
    }
}

/// Scans root directories for children named like `Python37` or `python3.11`
#[derive(Debug, Clone)]
pub struct DirectoryScanDiscovery {
    roots: Vec<PathBuf>,
    pattern: Regex,
}

impl DirectoryScanDiscovery {
    pub fn new(prefix: &str, roots: Vec<PathBuf>) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"(?i)^{}[-_ ]?(\d+(?:\.\d+)*)$",
            regex::escape(prefix)
        ))?;
        Ok(Self { roots, pattern })
    }

    /// Version encoded in a directory name, if it matches the prefix.
    ///
    /// Undotted digits read as major + minor: `37` → 3.7, `310` → 3.10.
    pub fn version_from_dir_name(&self, name: &str) -> Option<Version> {
        let digits = self.pattern.captures(name)?.get(1)?.as_str();
        let spelled = if digits.contains('.') || digits.len() < 2 {
            digits.to_string()
        } else {
            format!("{}.{}", &digits[..1], &digits[1..])
        };
        Version::parse(&spelled).ok()
    }

    fn scan_root(&self, root: &Path, records: &mut Vec<InstallationRecord>) -> Result<()> {
        if !root.is_dir() {
            debug!(root = %root.display(), "scan root does not exist");
            return Ok(());
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(version) = self.version_from_dir_name(&name.to_string_lossy()) {
                records.push(InstallationRecord::new(version, path));
            }
        }
        Ok(())
    }
}

impl InstallationDiscovery for DirectoryScanDiscovery {
    fn discover(&self) -> Result<Vec<InstallationRecord>> {
        let mut records = Vec::new();
        for root in &self.roots {
            self.scan_root(root, &mut records)?;
        }
        Ok(records)
    }
}

/// Concatenates the results of several strategies in order.
///
/// A failing strategy is logged and skipped. The chain only fails when every strategy did.
#[derive(Default)]
pub struct ChainedDiscovery {
    strategies: Vec<Box<dyn InstallationDiscovery>>,
}

impl ChainedDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl InstallationDiscovery + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }
}

impl InstallationDiscovery for ChainedDiscovery {
    fn discover(&self) -> Result<Vec<InstallationRecord>> {
        let mut records = Vec::new();
        let mut last_error = None;
        let mut succeeded = self.strategies.is_empty();
        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.discover() {
                Ok(found) => {
                    succeeded = true;
                    records.extend(found);
                }
                Err(e) => {
                    warn!(strategy = index, error = %e, "installation discovery failed, skipping");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !succeeded => Err(e),
            _ => Ok(records),
        }
    }
}

/// Default scan roots on Windows: per-user and machine-wide install folders.
fn windows_scan_roots(app: &str) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(local) = std::env::var("LOCALAPPDATA") {
        roots.push(PathBuf::from(local).join("Programs").join(app));
    }
    if let Ok(program_files) = std::env::var("ProgramFiles") {
        roots.push(PathBuf::from(program_files));
    }
    roots
}

/// Discovery for the running platform.
///
/// Config-listed installations come first everywhere. Windows additionally scans the
/// standard install folders; other platforms rely on the config list alone.
pub fn platform_default(store: &dyn ConfigStore, app: &str) -> Result<ChainedDiscovery> {
    let chain = ChainedDiscovery::new().with(StaticDiscovery::from_config(store, app)?);
    if cfg!(target_os = "windows") {
        Ok(chain.with(DirectoryScanDiscovery::new(app, windows_scan_roots(app))?))
    } else {
        Ok(chain)
    }
}
