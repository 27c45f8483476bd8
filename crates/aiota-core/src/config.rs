//! aiota.toml launcher settings parser.
//!
//! These settings tell the launcher where the shared store lives, which
//! controller program to start and how to guard the controller port. They are
//! distinct from the platform configuration record kept inside the store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::store_uri::StoreUri;
use crate::types::{ProbePolicy, RestartOn, parse_duration};

/// Location the CLI reads when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/aiota/aiota.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub store: StoreSection,
    pub controller: ControllerSection,
    pub probe: ProbeSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub uri: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            uri: "redb:///var/lib/aiota/aiota.redb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Directory the controller runs in.
    pub root: PathBuf,
    /// Program path, relative to `root` unless absolute.
    pub script: String,
    pub role: String,
    pub args: Vec<String>,
    pub restart: RestartSection,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/usr/local/lib/aiota/node_modules"),
            script: "aiota-controller/controller".to_string(),
            role: "controller".to_string(),
            args: Vec::new(),
            restart: RestartSection::default(),
        }
    }
}

impl ControllerSection {
    /// Absolute path of the controller program.
    pub fn program(&self) -> PathBuf {
        let script = Path::new(&self.script);
        if script.is_absolute() {
            script.to_path_buf()
        } else {
            self.root.join(script)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartSection {
    pub max_restarts: u32,
    pub min_uptime: String,
    pub spin_sleep: String,
    pub kill_grace: String,
    pub kill_tree: bool,
    pub restart_on: RestartOn,
}

impl Default for RestartSection {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            min_uptime: "2s".to_string(),
            spin_sleep: "1s".to_string(),
            kill_grace: "5s".to_string(),
            kill_tree: true,
            restart_on: RestartOn::Always,
        }
    }
}

impl RestartSection {
    pub fn min_uptime(&self) -> CoreResult<Duration> {
        duration_field("controller.restart.min_uptime", &self.min_uptime)
    }

    pub fn spin_sleep(&self) -> CoreResult<Duration> {
        duration_field("controller.restart.spin_sleep", &self.spin_sleep)
    }

    pub fn kill_grace(&self) -> CoreResult<Duration> {
        duration_field("controller.restart.kill_grace", &self.kill_grace)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    /// Host the controller port is probed on.
    pub host: String,
    pub timeout: String,
    pub policy: ProbePolicy,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            timeout: "1s".to_string(),
            policy: ProbePolicy::Abort,
        }
    }
}

impl ProbeSection {
    pub fn timeout(&self) -> CoreResult<Duration> {
        duration_field("probe.timeout", &self.timeout)
    }
}

fn duration_field(field: &'static str, value: &str) -> CoreResult<Duration> {
    parse_duration(value).ok_or_else(|| CoreError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

impl LauncherConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Like [`LauncherConfig::from_file`], but a missing file yields the defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn store_uri(&self) -> CoreResult<StoreUri> {
        StoreUri::parse(&self.store.uri)
    }
}
