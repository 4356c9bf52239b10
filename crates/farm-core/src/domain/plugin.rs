//! Static description of an application plugin.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FarmError;

/// Operating systems a plugin can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Linux,
    Darwin,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::Darwin => "Darwin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" => Ok(Platform::Darwin),
            other => Err(FarmError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Kind of plugin. Application plugins are the only kind this workspace ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    App,
}

/// Fixed key set every application plugin exposes to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub version: String,
    pub plugin_name: String,
    pub plugin_type: PluginType,
    pub app_short_name: String,
    pub app_type: String,
    pub has_qt_parent: bool,
    pub scene_formats: Vec<String>,
    pub app_specific_formats: Vec<String>,
    /// Extensions of sidecar files copied along with a scene.
    pub sidecar_formats: Vec<String>,
    pub app_color: [u8; 3],
    pub platforms: BTreeSet<Platform>,
    pub executable_name: String,
    pub frame_string: String,
    /// Tag handed to the worker when a render process is launched.
    pub program_tag: String,
    /// Version recorded into the job config when the job does not pin one.
    pub default_program_version: String,
}

impl PluginDescriptor {
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    pub fn supports_current_platform(&self) -> bool {
        self.supports(Platform::current())
    }

    /// Whether `extension` (with or without the leading dot) is a scene format.
    pub fn is_scene_format(&self, extension: &str) -> bool {
        let normalized = if extension.starts_with('.') {
            extension.to_ascii_lowercase()
        } else {
            format!(".{}", extension.to_ascii_lowercase())
        };
        self.scene_formats.iter().any(|f| *f == normalized)
    }

    /// Config key holding the override toggle, e.g. `Python_override`.
    pub fn override_key(&self) -> String {
        format!("{}_override", self.plugin_name)
    }

    /// Config key holding the override executable, e.g. `Python_path`.
    pub fn override_path_key(&self) -> String {
        format!("{}_path", self.plugin_name)
    }
}
