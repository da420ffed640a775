#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use dashboard_client::{
    ApiError, Backend, Controller, ControllerSettings, MsgSink, PollSettings,
};
use dashboard_core::{
    DocumentJobSnapshot, DocumentJobStatus, DocumentPage, DocumentPhaseKey, DocumentQuery,
    HarvestJobSnapshot, HarvestRequest, HarvestStatus, JobAction, JobId, Msg, SiteId, SiteSummary,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(dashboard_logging::initialize_for_tests);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartPhase(DocumentPhaseKey),
    DocumentStatus(JobId),
    Action(JobId, JobAction),
    StartHarvest(HarvestRequest),
    HarvestStatus(JobId),
    StopHarvest(JobId),
    Export(JobId),
    Sites,
    Documents(SiteId),
}

/// Answers from a script. Each queue hands out its entries in order and then
/// keeps repeating the last one.
#[derive(Default)]
pub struct ScriptedBackend {
    latency: Duration,
    phase_starts: Mutex<VecDeque<Result<JobId, ApiError>>>,
    document_status: Mutex<HashMap<JobId, VecDeque<Result<DocumentJobSnapshot, ApiError>>>>,
    actions: Mutex<VecDeque<Result<Option<JobId>, ApiError>>>,
    harvest_starts: Mutex<VecDeque<Result<JobId, ApiError>>>,
    harvest_status: Mutex<HashMap<JobId, VecDeque<Result<HarvestJobSnapshot, ApiError>>>>,
    sites: Mutex<Vec<SiteSummary>>,
    calls: Mutex<Vec<Call>>,
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every status request takes `latency` to answer.
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn push_phase_start(&self, result: Result<JobId, ApiError>) {
        self.phase_starts.lock().unwrap().push_back(result);
    }

    pub fn push_document_status(
        &self,
        job_id: &str,
        result: Result<DocumentJobSnapshot, ApiError>,
    ) {
        self.document_status
            .lock()
            .unwrap()
            .entry(JobId::from(job_id))
            .or_default()
            .push_back(result);
    }

    pub fn push_action(&self, result: Result<Option<JobId>, ApiError>) {
        self.actions.lock().unwrap().push_back(result);
    }

    pub fn push_harvest_start(&self, result: Result<JobId, ApiError>) {
        self.harvest_starts.lock().unwrap().push_back(result);
    }

    pub fn push_harvest_status(&self, job_id: &str, result: Result<HarvestJobSnapshot, ApiError>) {
        self.harvest_status
            .lock()
            .unwrap()
            .entry(JobId::from(job_id))
            .or_default()
            .push_back(result);
    }

    pub fn set_sites(&self, sites: Vec<SiteSummary>) {
        *self.sites.lock().unwrap() = sites;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    async fn start_document_phase(&self, key: DocumentPhaseKey) -> Result<JobId, ApiError> {
        self.record(Call::StartPhase(key));
        next(&mut self.phase_starts.lock().unwrap()).unwrap_or(Err(ApiError::MissingJobId))
    }

    async fn document_job_status(&self, job_id: &JobId) -> Result<DocumentJobSnapshot, ApiError> {
        self.record(Call::DocumentStatus(job_id.clone()));
        let answer = self
            .document_status
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(next)
            .unwrap_or(Err(ApiError::NotFound));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        answer
    }

    async fn document_job_action(
        &self,
        job_id: &JobId,
        action: JobAction,
    ) -> Result<Option<JobId>, ApiError> {
        self.record(Call::Action(job_id.clone(), action));
        next(&mut self.actions.lock().unwrap()).unwrap_or(Ok(None))
    }

    async fn start_harvest(&self, request: &HarvestRequest) -> Result<JobId, ApiError> {
        self.record(Call::StartHarvest(request.clone()));
        next(&mut self.harvest_starts.lock().unwrap()).unwrap_or(Err(ApiError::MissingJobId))
    }

    async fn harvest_status(&self, job_id: &JobId) -> Result<HarvestJobSnapshot, ApiError> {
        self.record(Call::HarvestStatus(job_id.clone()));
        let answer = self
            .harvest_status
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(next)
            .unwrap_or(Err(ApiError::NotFound));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        answer
    }

    async fn stop_harvest(&self, job_id: &JobId) -> Result<(), ApiError> {
        self.record(Call::StopHarvest(job_id.clone()));
        Ok(())
    }

    async fn export_harvest(&self, job_id: &JobId) -> Result<Value, ApiError> {
        self.record(Call::Export(job_id.clone()));
        Ok(json!({ "job_id": job_id.as_str(), "documents": [] }))
    }

    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ApiError> {
        self.record(Call::Sites);
        Ok(self.sites.lock().unwrap().clone())
    }

    async fn list_documents(
        &self,
        site_id: SiteId,
        query: &DocumentQuery,
    ) -> Result<DocumentPage, ApiError> {
        self.record(Call::Documents(site_id));
        Ok(DocumentPage {
            page: query.page,
            page_size: query.page_size,
            ..DocumentPage::default()
        })
    }
}

/// Collects messages instead of feeding a controller.
#[derive(Default)]
pub struct RecordingSink {
    msgs: Mutex<Vec<Msg>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<Msg> {
        self.msgs.lock().unwrap().drain(..).collect()
    }
}

impl MsgSink for RecordingSink {
    fn send(&self, msg: Msg) {
        self.msgs.lock().unwrap().push(msg);
    }
}

pub fn document_snapshot(status: DocumentJobStatus) -> DocumentJobSnapshot {
    DocumentJobSnapshot {
        status,
        requested_action: None,
        error: None,
        result: None,
    }
}

pub fn harvest_snapshot(status: HarvestStatus) -> HarvestJobSnapshot {
    HarvestJobSnapshot {
        status,
        phases: None,
        site_id: None,
        tasks: None,
        error: None,
    }
}

pub fn controller(backend: Arc<ScriptedBackend>, temp: &TempDir) -> Controller {
    Controller::new(
        backend,
        ControllerSettings {
            poll: PollSettings::default(),
            state_dir: temp.path().join("state"),
            export_dir: temp.path().join("exports"),
        },
    )
}
