use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashboard_core::{JobId, SiteConfigs, SITE_CONFIGS_KEY};
use dashboard_logging::{dashboard_debug, dashboard_info};
use serde_json::Value;

use crate::{AtomicFileWriter, PersistError};

/// Client-side files: saved site configurations and harvest exports.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
    export_dir: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            export_dir: export_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn site_configs_path(&self) -> PathBuf {
        self.state_dir.join(format!("{SITE_CONFIGS_KEY}.json"))
    }

    /// Loads saved site configurations. A missing file is an empty map.
    pub fn load_site_configs(&self) -> Result<SiteConfigs, PersistError> {
        let path = self.site_configs_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                dashboard_debug!("no saved site configs at {}", path.display());
                return Ok(SiteConfigs::new());
            }
            Err(err) => return Err(err.into()),
        };
        let configs: SiteConfigs =
            serde_json::from_slice(&raw).map_err(|err| PersistError::Corrupt {
                path: path.clone(),
                message: err.to_string(),
            })?;
        dashboard_info!("loaded {} site config(s) from {}", configs.len(), path.display());
        Ok(configs)
    }

    pub fn save_site_configs(&self, configs: &SiteConfigs) -> Result<PathBuf, PersistError> {
        let content = serde_json::to_vec_pretty(configs)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        let path = AtomicFileWriter::new(self.state_dir.clone())
            .write(&format!("{SITE_CONFIGS_KEY}.json"), &content)?;
        dashboard_debug!("saved {} site config(s)", configs.len());
        Ok(path)
    }

    /// Writes an export payload as pretty JSON into the export directory.
    pub fn save_export(
        &self,
        job_id: &JobId,
        payload: &Value,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, PersistError> {
        let content = serde_json::to_vec_pretty(payload)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        let path = AtomicFileWriter::new(self.export_dir.clone())
            .write(&export_filename(job_id, at), &content)?;
        dashboard_info!("export of job {job_id} saved to {}", path.display());
        Ok(path)
    }
}

/// `harvest-{job_id}-{timestamp}.json`, with the ISO timestamp's `:` and `.`
/// replaced by `-`. Characters unsafe in file names are replaced in the id.
pub fn export_filename(job_id: &JobId, at: DateTime<Utc>) -> String {
    let id: String = job_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("harvest-{id}-{}.json", at.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}
