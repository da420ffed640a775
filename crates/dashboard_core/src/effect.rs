use serde::Serialize;
use serde_json::{Map, Value};

use crate::{DocumentPhaseKey, DocumentQuery, JobAction, JobId, Phase, SiteConfigs, SiteId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartDocumentPhase {
        key: DocumentPhaseKey,
    },
    SendJobAction {
        key: DocumentPhaseKey,
        job_id: JobId,
        action: JobAction,
    },
    /// Start (or replace) the poller for a document phase job.
    PollDocumentJob {
        key: DocumentPhaseKey,
        job_id: JobId,
    },
    StopPolling {
        job_id: JobId,
    },
    StartHarvest {
        origin: HarvestCommand,
        request: HarvestRequest,
    },
    StopHarvest {
        job_id: JobId,
    },
    /// Start (or replace) the poller for a harvest job.
    PollHarvest {
        job_id: JobId,
    },
    ExportHarvest {
        job_id: JobId,
    },
    ReloadSites,
    ReloadDocuments {
        site_id: SiteId,
        query: DocumentQuery,
    },
    PersistSiteConfigs(SiteConfigs),
    /// Cancel every active poller.
    DisposeAll,
}

/// Harvest-level commands; each has its own in-flight flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestCommand {
    Launch,
    Resume,
    Stop,
    Cancel,
    Export,
}

/// Body of `POST /harvest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarvestRequest {
    pub harvester_type: String,
    pub tasks: Vec<Phase>,
    #[serde(flatten)]
    pub form: Map<String, Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub resume: bool,
}

impl HarvestRequest {
    pub fn new(
        harvester_type: impl Into<String>,
        tasks: Vec<Phase>,
        form: &Map<String, Value>,
    ) -> Self {
        let mut form = form.clone();
        // These keys are owned by the request itself.
        for reserved in ["harvester_type", "tasks", "resume"] {
            form.remove(reserved);
        }
        Self {
            harvester_type: harvester_type.into(),
            tasks,
            form,
            resume: false,
        }
    }
}
