use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::ServiceDescriptor;

/// File names searched for in the root directory, in order
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "pulsecheck.yaml",
    "pulsecheck.yml",
    ".pulsecheck.yaml",
    ".pulsecheck.yml",
];

/// Timeouts and limits for one aggregation pass
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// TCP connect timeout per service
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// HTTP health request timeout per service
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
    /// Wall-clock bound for the whole pass
    #[serde(default = "default_deadline")]
    pub deadline_ms: u64,
    /// Maximum number of services probed at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Probes slower than this get a performance recommendation
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold_ms: u64,
}

fn default_connect_timeout() -> u64 {
    1000
}
fn default_http_timeout() -> u64 {
    5000
}
fn default_deadline() -> u64 {
    8000
}
fn default_max_concurrency() -> usize {
    16
}
fn default_slow_threshold() -> u64 {
    1000
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            http_timeout_ms: default_http_timeout(),
            deadline_ms: default_deadline(),
            max_concurrency: default_max_concurrency(),
            slow_threshold_ms: default_slow_threshold(),
        }
    }
}

impl ProbeSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

/// Service entry in the registry file
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,

    /// Logical group, e.g. "infrastructure" or "integration"
    #[serde(default = "default_group")]
    pub group: String,

    /// Wider than u16 so out-of-range ports get a readable error
    pub port: u32,

    /// HTTP health path; omit for port-only services such as databases
    #[serde(default)]
    pub health: Option<String>,

    #[serde(default)]
    pub install_hint: Option<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_group() -> String {
    "default".into()
}

/// Root registry file structure
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_version")]
    pub version: String,

    /// Host every service is probed on
    #[serde(default = "default_host")]
    pub host: String,

    /// Where reports are written, relative to the root directory
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default)]
    pub probe: ProbeSettings,

    /// Services in probe/report order
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

fn default_version() -> String {
    "1".into()
}
fn default_host() -> String {
    "localhost".into()
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("monitoring")
}

impl RegistryConfig {
    /// Load the registry from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load the registry from a string (useful for testing)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the registry file in `root`
    pub fn discover(root: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();
        for name in &CONFIG_FILE_NAMES {
            let path = root.join(name);
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok((path, config));
            }
            searched.push(path);
        }
        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.probe.connect_timeout_ms == 0 {
            return Err(invalid("probe.connect_timeout_ms", "must be greater than 0"));
        }
        if self.probe.http_timeout_ms == 0 {
            return Err(invalid("probe.http_timeout_ms", "must be greater than 0"));
        }
        if self.probe.deadline_ms == 0 {
            return Err(invalid("probe.deadline_ms", "must be greater than 0"));
        }
        if self.probe.max_concurrency == 0 {
            return Err(invalid("probe.max_concurrency", "must be at least 1"));
        }

        let mut seen = BTreeSet::new();
        for svc in &self.services {
            if !seen.insert(svc.name.as_str()) {
                return Err(ConfigError::DuplicateService {
                    name: svc.name.clone(),
                });
            }
            if svc.port == 0 || svc.port > u32::from(u16::MAX) {
                return Err(ConfigError::InvalidPort {
                    name: svc.name.clone(),
                    port: svc.port,
                });
            }
            if let Some(path) = &svc.health {
                // An empty path means "port only", same as omitting it
                if !path.is_empty() && !path.starts_with('/') {
                    return Err(ConfigError::InvalidHealthPath {
                        name: svc.name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Convert the validated service entries into descriptors
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.services
            .iter()
            .filter_map(|svc| {
                let port = u16::try_from(svc.port).ok()?;
                Some(ServiceDescriptor {
                    name: svc.name.clone(),
                    group: svc.group.clone(),
                    port,
                    health: svc.health.clone().filter(|p| !p.is_empty()),
                    install_hint: svc.install_hint.clone(),
                    metadata: svc.metadata.clone(),
                })
            })
            .collect()
    }

    /// Absolute report directory for a given root
    pub fn report_dir(&self, root: &Path) -> PathBuf {
        if self.report_dir.is_absolute() {
            self.report_dir.clone()
        } else {
            root.join(&self.report_dir)
        }
    }
}

fn invalid(setting: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        setting: setting.into(),
        message: message.into(),
    }
}
