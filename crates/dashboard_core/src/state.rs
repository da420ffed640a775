use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::view_model::{self, AppViewModel};
use crate::{
    DocumentFilters, DocumentPage, DocumentQuery, HarvestCommand, JobId, JobRegistry, PhaseStatus,
    SiteConfigs, SiteId, SiteSummary, TaskOptions, TrackedJob,
};

pub const DEFAULT_HARVESTER: &str = "generic";

/// In-flight flags for harvest-level commands. A set flag disables the
/// matching control until the request resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandLoading {
    pub launch: bool,
    pub resume: bool,
    pub stop: bool,
    pub cancel: bool,
    pub export: bool,
}

impl CommandLoading {
    pub fn is_set(&self, command: HarvestCommand) -> bool {
        match command {
            HarvestCommand::Launch => self.launch,
            HarvestCommand::Resume => self.resume,
            HarvestCommand::Stop => self.stop,
            HarvestCommand::Cancel => self.cancel,
            HarvestCommand::Export => self.export,
        }
    }

    /// Whether any harvest command is still waiting for the backend.
    pub fn any(&self) -> bool {
        self.launch || self.resume || self.stop || self.cancel || self.export
    }

    pub(crate) fn set(&mut self, command: HarvestCommand, value: bool) {
        let flag = match command {
            HarvestCommand::Launch => &mut self.launch,
            HarvestCommand::Resume => &mut self.resume,
            HarvestCommand::Stop => &mut self.stop,
            HarvestCommand::Cancel => &mut self.cancel,
            HarvestCommand::Export => &mut self.export,
        };
        *flag = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListingLoading {
    pub sites: bool,
    pub documents: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub(crate) sites: Vec<SiteSummary>,
    pub(crate) selected_site: Option<SiteId>,
    pub(crate) documents: DocumentPage,
    pub(crate) filters: DocumentFilters,
    pub(crate) document_jobs: JobRegistry,
    pub(crate) harvest: Option<TrackedJob>,
    /// Collect status seen on the previous harvest poll.
    pub(crate) last_collect_status: Option<PhaseStatus>,
    pub(crate) commands: CommandLoading,
    pub(crate) loading: ListingLoading,
    pub(crate) harvester: String,
    pub(crate) form: Map<String, Value>,
    pub(crate) task_options: TaskOptions,
    pub(crate) site_configs: SiteConfigs,
    pub(crate) last_export: Option<(JobId, PathBuf)>,
    pub(crate) notice: Option<String>,
    pub(crate) dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            selected_site: None,
            documents: DocumentPage::default(),
            filters: DocumentFilters::default(),
            document_jobs: JobRegistry::new(),
            harvest: None,
            last_collect_status: None,
            commands: CommandLoading::default(),
            loading: ListingLoading::default(),
            harvester: DEFAULT_HARVESTER.to_string(),
            form: Map::new(),
            task_options: TaskOptions::default(),
            site_configs: SiteConfigs::new(),
            last_export: None,
            notice: None,
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        view_model::build(self)
    }

    pub fn sites(&self) -> &[SiteSummary] {
        &self.sites
    }

    pub fn selected_site(&self) -> Option<SiteId> {
        self.selected_site
    }

    pub fn selected_site_summary(&self) -> Option<&SiteSummary> {
        let site_id = self.selected_site?;
        self.sites.iter().find(|site| site.id == site_id)
    }

    pub fn documents(&self) -> &DocumentPage {
        &self.documents
    }

    pub fn filters(&self) -> &DocumentFilters {
        &self.filters
    }

    pub fn document_jobs(&self) -> &JobRegistry {
        &self.document_jobs
    }

    pub fn harvest(&self) -> Option<&TrackedJob> {
        self.harvest.as_ref()
    }

    pub fn commands(&self) -> CommandLoading {
        self.commands
    }

    pub fn loading(&self) -> ListingLoading {
        self.loading
    }

    pub fn harvester(&self) -> &str {
        &self.harvester
    }

    pub fn form(&self) -> &Map<String, Value> {
        &self.form
    }

    pub fn task_options(&self) -> TaskOptions {
        self.task_options
    }

    pub fn site_configs(&self) -> &SiteConfigs {
        &self.site_configs
    }

    pub fn last_export(&self) -> Option<(&JobId, &Path)> {
        self.last_export
            .as_ref()
            .map(|(job_id, path)| (job_id, path.as_path()))
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Returns whether anything changed since the last call, and resets it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn document_query(&self, page: u32, page_size: u32) -> DocumentQuery {
        DocumentQuery {
            page,
            page_size,
            filters: self.filters.clone(),
        }
    }

    /// URL the current form targets, used for URL-keyed site configs.
    pub(crate) fn form_url(&self) -> Option<String> {
        match self.form.get("url") {
            Some(Value::String(url)) if !url.trim().is_empty() => Some(url.clone()),
            _ => self
                .selected_site_summary()
                .and_then(|site| site.base_url.clone()),
        }
    }
}
