//! Configuration for the control-plane runtime.
//!
//! Read from `~/.cplane/config.toml`, or from the file named by
//! `CPLANE_CONFIG`. Every section and key is optional.
//!
//! ```toml
//! [ngap]
//! handover_preparation_timeout_ms = 1000
//! handover_cancel_timeout_ms = 1000
//! rrc_handover_ack_timeout_ms = 1000
//!
//! [cu_cp]
//! local_procedure_timeout_ms = 1000
//!
//! [du]
//! mac_ue_config_timeout_ms = 1000
//!
//! [runtime]
//! timer_tick_ms = 1
//!
//! [logging]
//! filter = "info,cplane_engine=debug"
//! file = "/var/log/cplane.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CPLANE_CONFIG";

const DEFAULT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_TICK_MS: u64 = 1;

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Every external wait must be bounded; zero would fire before any
    /// response can arrive.
    #[error("{key} must be greater than zero")]
    ZeroTimeout { key: &'static str },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::ZeroTimeout { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CplaneConfig {
    #[serde(default)]
    pub ngap: NgapConfig,
    #[serde(default)]
    pub cu_cp: CuCpConfig,
    #[serde(default)]
    pub du: DuConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NG interface procedure timers.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NgapConfig {
    /// TNGRELOCprep: how long the AMF has to answer a Handover Required.
    #[serde(default = "default_timeout_ms")]
    pub handover_preparation_timeout_ms: u64,
    /// How long to wait for the Handover Cancel Acknowledge.
    #[serde(default = "default_timeout_ms")]
    pub handover_cancel_timeout_ms: u64,
    /// How long the RRC layer has to accept the handover command.
    #[serde(default = "default_timeout_ms")]
    pub rrc_handover_ack_timeout_ms: u64,
}

impl Default for NgapConfig {
    fn default() -> Self {
        Self {
            handover_preparation_timeout_ms: DEFAULT_TIMEOUT_MS,
            handover_cancel_timeout_ms: DEFAULT_TIMEOUT_MS,
            rrc_handover_ack_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuCpConfig {
    /// Bound on each E1AP/F1AP/RRC step of a CU-CP routine.
    #[serde(default = "default_timeout_ms")]
    pub local_procedure_timeout_ms: u64,
}

impl Default for CuCpConfig {
    fn default() -> Self {
        Self {
            local_procedure_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuConfig {
    #[serde(default = "default_timeout_ms")]
    pub mac_ue_config_timeout_ms: u64,
}

impl Default for DuConfig {
    fn default() -> Self {
        Self {
            mac_ue_config_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Resolution of the timer driver.
    #[serde(default = "default_tick_ms")]
    pub timer_tick_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timer_tick_ms: DEFAULT_TICK_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Validated procedure timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureTimeouts {
    pub handover_preparation: Duration,
    pub handover_cancel: Duration,
    pub rrc_handover_ack: Duration,
    pub local_procedure: Duration,
    pub mac_ue_config: Duration,
}

impl Default for ProcedureTimeouts {
    fn default() -> Self {
        let default = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        Self {
            handover_preparation: default,
            handover_cancel: default,
            rrc_handover_ack: default,
            local_procedure: default,
            mac_ue_config: default,
        }
    }
}

fn millis(key: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroTimeout { key });
    }
    Ok(Duration::from_millis(value))
}

impl CplaneConfig {
    /// Load the config file, if there is one.
    ///
    /// A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!("no config at {}", path.display());
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };
        Self::parse(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    pub fn timeouts(&self) -> Result<ProcedureTimeouts, ConfigError> {
        Ok(ProcedureTimeouts {
            handover_preparation: millis(
                "ngap.handover_preparation_timeout_ms",
                self.ngap.handover_preparation_timeout_ms,
            )?,
            handover_cancel: millis(
                "ngap.handover_cancel_timeout_ms",
                self.ngap.handover_cancel_timeout_ms,
            )?,
            rrc_handover_ack: millis(
                "ngap.rrc_handover_ack_timeout_ms",
                self.ngap.rrc_handover_ack_timeout_ms,
            )?,
            local_procedure: millis(
                "cu_cp.local_procedure_timeout_ms",
                self.cu_cp.local_procedure_timeout_ms,
            )?,
            mac_ue_config: millis("du.mac_ue_config_timeout_ms", self.du.mac_ue_config_timeout_ms)?,
        })
    }

    pub fn timer_tick(&self) -> Result<Duration, ConfigError> {
        millis("runtime.timer_tick_ms", self.runtime.timer_tick_ms)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".cplane").join("config.toml"))
}
