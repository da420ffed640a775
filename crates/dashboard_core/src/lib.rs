//! Dashboard core: job tracking state machine and view-model helpers.
mod effect;
mod job;
mod listing;
mod msg;
mod phase;
mod registry;
mod site_config;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, HarvestCommand, HarvestRequest};
pub use job::{
    DocumentId, DocumentJobPatch, DocumentJobSnapshot, DocumentJobStatus, DocumentPhaseJob,
    DocumentPhaseKey, Failure, HarvestJobSnapshot, HarvestStatus, JobAction, JobId, PhaseAction,
    PhaseProgress, SiteId, TrackedJob, UnknownJobAction,
};
pub use listing::{
    DocumentFilters, DocumentPage, DocumentQuery, DocumentSummary, SiteStats, SiteSummary,
    DEFAULT_PAGE_SIZE,
};
pub use msg::{Listing, Msg};
pub use phase::{normalize_tasks, phase_status_label, Phase, PhaseStatus, TaskOptions, UnknownPhase};
pub use registry::JobRegistry;
pub use site_config::{SiteConfig, SiteConfigs, SITE_CONFIGS_KEY};
pub use state::{AppState, CommandLoading, ListingLoading, DEFAULT_HARVESTER};
pub use update::update;
pub use view_model::{
    derive_display, phase_action_options, ActionOption, AppViewModel, BadgeTone, DocumentRowView,
    HarvestJobView, HarvestPhaseView, PhaseDisplay, PhaseRowView, SiteRowView, StatusIcon,
};
