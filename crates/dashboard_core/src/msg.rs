use std::path::PathBuf;

use serde_json::Value;

use crate::{
    DocumentFilters, DocumentJobSnapshot, DocumentPage, DocumentPhaseKey, Failure, HarvestCommand,
    HarvestJobSnapshot, JobAction, JobId, Phase, PhaseAction, SiteConfigs, SiteId, SiteSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Reload the site summary.
    SitesRequested,
    SitesLoaded(Vec<SiteSummary>),
    /// User picked a site; its documents and stored configuration load.
    SiteSelected(SiteId),
    /// Reload the selected site's documents, optionally moving page.
    DocumentsRequested {
        page: Option<u32>,
        page_size: Option<u32>,
    },
    FiltersChanged(DocumentFilters),
    DocumentsLoaded {
        site_id: SiteId,
        page: DocumentPage,
    },
    ListingFailed {
        listing: Listing,
        failure: Failure,
    },

    /// Start a new job for a document phase.
    StartPhaseRequested { key: DocumentPhaseKey },
    /// Act on a document phase job with an explicit job id.
    JobActionRequested {
        key: DocumentPhaseKey,
        job_id: Option<JobId>,
        action: JobAction,
    },
    /// Phase menu entry; the job id comes from the registry.
    PhaseActionClicked {
        key: DocumentPhaseKey,
        action: PhaseAction,
    },
    /// Follow an existing backend job for a document phase.
    TrackDocumentJob {
        key: DocumentPhaseKey,
        job_id: JobId,
    },
    PhaseStartAccepted {
        key: DocumentPhaseKey,
        job_id: JobId,
    },
    PhaseStartFailed {
        key: DocumentPhaseKey,
        failure: Failure,
    },
    JobActionAccepted {
        key: DocumentPhaseKey,
        job_id: JobId,
        action: JobAction,
        /// Tracking id handed out by a resume.
        new_job_id: Option<JobId>,
    },
    JobActionFailed {
        key: DocumentPhaseKey,
        action: JobAction,
        failure: Failure,
    },
    /// One poller tick for a document phase job.
    DocumentJobPolled {
        key: DocumentPhaseKey,
        job_id: JobId,
        outcome: Result<DocumentJobSnapshot, Failure>,
    },

    HarvesterSelected(String),
    FormFieldChanged { name: String, value: Value },
    TaskToggled(Phase),
    /// Persisted site configurations loaded at startup.
    RestoreSiteConfigs(SiteConfigs),

    HarvestLaunchClicked { tasks: Option<Vec<Phase>> },
    HarvestResumeClicked,
    HarvestStopClicked,
    HarvestCancelClicked,
    HarvestExportClicked,
    /// Follow an existing harvest job by id.
    HarvestAttached { job_id: JobId },
    HarvestStarted {
        origin: HarvestCommand,
        job_id: JobId,
        tasks: Vec<Phase>,
    },
    HarvestStartFailed {
        origin: HarvestCommand,
        failure: Failure,
    },
    HarvestStopAccepted { job_id: JobId },
    HarvestStopFailed { job_id: JobId, failure: Failure },
    /// One poller tick for a harvest job.
    HarvestPolled {
        job_id: JobId,
        outcome: Result<HarvestJobSnapshot, Failure>,
    },
    ExportSaved { job_id: JobId, path: PathBuf },
    ExportFailed { job_id: JobId, error: String },

    /// The surface is going away; stop every poller.
    Teardown,
    Tick,
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Sites,
    Documents,
}
