use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::{DocumentId, Phase, PhaseStatus, SiteId};

pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub id: SiteId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub harvester_type: Option<String>,
    #[serde(default)]
    pub stats: SiteStats,
    /// Parameters of the site's last harvest as the backend recorded them.
    #[serde(default)]
    pub current_parameters: Option<Map<String, Value>>,
}

/// Document counters the backend keeps per site. Missing counters read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteStats {
    pub total: u64,
    pub downloaded: u64,
    pub analyzed: u64,
    pub analyze_errors: u64,
}

impl SiteStats {
    /// Sums the counters of every site.
    pub fn totals<'a>(sites: impl IntoIterator<Item = &'a SiteSummary>) -> Self {
        sites.into_iter().fold(Self::default(), |acc, site| Self {
            total: acc.total + site.stats.total,
            downloaded: acc.downloaded + site.stats.downloaded,
            analyzed: acc.analyzed + site.stats.analyzed,
            analyze_errors: acc.analyze_errors + site.stats.analyze_errors,
        })
    }
}

impl SiteSummary {
    /// Host name without a leading `www.`, falling back to the raw URL.
    pub fn display_name(&self) -> String {
        let Some(base_url) = self.base_url.as_deref() else {
            return self.name.clone().unwrap_or_else(|| "Site".to_string());
        };
        match Url::parse(base_url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.replacen("www.", "", 1),
                None => base_url.to_string(),
            },
            Err(_) => base_url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseStatus>,
}

impl DocumentSummary {
    pub fn phase_status(&self, phase: Phase) -> Option<&PhaseStatus> {
        self.phases.get(phase.as_str())
    }
}

/// One page of a site's document listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    pub items: Vec<DocumentSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub collections: Vec<String>,
}

impl Default for DocumentPage {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            collections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFilters {
    pub collection: Option<String>,
    pub status: Option<String>,
    pub phase: Option<Phase>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: DocumentFilters,
}

impl DocumentQuery {
    /// Query-string pairs in the order the backend documents them. Empty
    /// filters are left out.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("page_size", self.page_size.max(1).to_string()),
        ];
        let filters = &self.filters;
        let optional = [
            ("collection", filters.collection.clone()),
            ("status", filters.status.clone()),
            ("phase", filters.phase.map(|phase| phase.as_str().to_string())),
            ("start_date", filters.start_date.clone()),
            ("end_date", filters.end_date.clone()),
        ];
        pairs.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v))),
        );
        pairs
    }
}
