use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Phase, SiteId, TaskOptions, DEFAULT_HARVESTER};

/// Name under which the site configurations are persisted.
pub const SITE_CONFIGS_KEY: &str = "harvesterSiteConfigs";

/// Harvester whose sites share one fixed configuration key when no URL is set.
const JORADP_HARVESTER: &str = "joradp";

/// Stored harvest parameters that are not form fields.
const NON_FORM_PARAMETERS: [&str; 3] = ["harvester_type", "harvester", "tasks"];

/// Last-used harvest form for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub harvester: String,
    #[serde(default)]
    pub form_data: Map<String, Value>,
    #[serde(default)]
    pub task_options: TaskOptions,
}

impl SiteConfig {
    /// Reads the parameters the backend recorded for a site's last harvest.
    /// `harvester_type` (or `harvester`) picks the harvester, a `tasks` array
    /// sets the task options and every other field is form data.
    pub fn from_stored_parameters(parameters: &Map<String, Value>) -> Self {
        let named = |field: &str| {
            parameters
                .get(field)
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
        };
        let harvester = named("harvester_type")
            .or_else(|| named("harvester"))
            .unwrap_or(DEFAULT_HARVESTER)
            .to_string();

        let task_options = match parameters.get("tasks").and_then(Value::as_array) {
            Some(tasks) => {
                let listed = |phase: Phase| {
                    tasks
                        .iter()
                        .any(|task| task.as_str() == Some(phase.as_str()))
                };
                TaskOptions {
                    download: listed(Phase::Download),
                    analyze: listed(Phase::Analyze),
                }
            }
            None => TaskOptions::default(),
        };

        let form_data = parameters
            .iter()
            .filter(|(field, _)| !NON_FORM_PARAMETERS.contains(&field.as_str()))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        Self {
            harvester,
            form_data,
            task_options,
        }
    }
}

/// Site id (or `url:{normalized_url}` before the site has an id) to its
/// last-used configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteConfigs(BTreeMap<String, SiteConfig>);

impl SiteConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SiteConfig> {
        self.0.get(key)
    }

    pub fn id_key(site_id: SiteId) -> String {
        site_id.to_string()
    }

    /// Key for a site that may not have an id yet. The URL is trimmed and
    /// lowercased; the JORADP harvester falls back to a fixed key.
    pub fn url_key(url: Option<&str>, harvester: &str) -> Option<String> {
        let normalized = url
            .map(|raw| raw.trim().to_lowercase())
            .filter(|raw| !raw.is_empty());
        match normalized {
            Some(url) => Some(format!("url:{url}")),
            None if harvester == JORADP_HARVESTER => Some(format!("url:{JORADP_HARVESTER}")),
            None => None,
        }
    }

    /// Stores `config` under the site id when known, otherwise under the URL
    /// key. Saving under an id drops the URL entry it supersedes.
    /// Returns whether anything changed.
    pub fn save(&mut self, site_id: Option<SiteId>, url: Option<&str>, config: SiteConfig) -> bool {
        let url_key = Self::url_key(url, &config.harvester);
        match (site_id, url_key) {
            (Some(site_id), url_key) => {
                let id_key = Self::id_key(site_id);
                let mut changed = self.0.get(&id_key) != Some(&config);
                self.0.insert(id_key.clone(), config);
                if let Some(url_key) = url_key.filter(|key| *key != id_key) {
                    changed |= self.0.remove(&url_key).is_some();
                }
                changed
            }
            (None, Some(url_key)) => {
                let changed = self.0.get(&url_key) != Some(&config);
                self.0.insert(url_key, config);
                changed
            }
            (None, None) => false,
        }
    }

    /// Finds the configuration for a site: its id key, then its URL key, then
    /// the parameters the backend recorded for it. A URL-keyed or backend hit
    /// is saved under the id key. The second value reports whether that
    /// changed the map.
    pub fn resolve(
        &mut self,
        site_id: Option<SiteId>,
        base_url: Option<&str>,
        harvester: &str,
        stored: Option<&Map<String, Value>>,
    ) -> (Option<SiteConfig>, bool) {
        if let Some(found) = site_id.and_then(|id| self.0.get(&Self::id_key(id))) {
            return (Some(found.clone()), false);
        }
        let by_url = Self::url_key(base_url, harvester).and_then(|key| self.0.get(&key).cloned());
        let Some(found) = by_url.or_else(|| stored.map(SiteConfig::from_stored_parameters)) else {
            return (None, false);
        };
        let saved = match site_id {
            Some(_) => self.save(site_id, base_url, found.clone()),
            None => false,
        };
        (Some(found), saved)
    }
}
