//! RON configuration for the `harvest-dash` binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dashboard_client::{ClientSettings, ControllerSettings, PollSettings};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("could not encode configuration: {0}")]
    Encode(String),
}

/// Every field is optional in the file; absent ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub document_poll_ms: u64,
    pub harvest_poll_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub state_dir: PathBuf,
    pub export_dir: PathBuf,
    pub log: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let controller = ControllerSettings::default();
        Self {
            base_url: client.base_url,
            document_poll_ms: duration_ms(controller.poll.document_period),
            harvest_poll_ms: duration_ms(controller.poll.harvest_period),
            connect_timeout_ms: duration_ms(client.connect_timeout),
            request_timeout_ms: duration_ms(client.request_timeout),
            state_dir: controller.state_dir,
            export_dir: controller.export_dir,
            log: LogDestination::default(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AppConfig {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::parse(&text).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, PrettyConfig::new())
            .map_err(|err| ConfigError::Encode(err.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        if self.document_poll_ms == 0 || self.harvest_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll periods must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            poll: PollSettings {
                document_period: Duration::from_millis(self.document_poll_ms),
                harvest_period: Duration::from_millis(self.harvest_poll_ms),
            },
            state_dir: self.state_dir.clone(),
            export_dir: self.export_dir.clone(),
        }
    }
}
