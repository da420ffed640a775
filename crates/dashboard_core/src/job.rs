use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Phase, PhaseStatus};

pub type DocumentId = u64;
pub type SiteId = u64;

/// Opaque backend job identifier. The backend may send it as a JSON string or
/// a number; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for JobId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => JobId(text),
            Raw::Number(number) => JobId(number.to_string()),
        })
    }
}

/// Status of a per-document phase job as tracked locally.
/// An absent status means no job was ever started for the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentJobStatus {
    Pending,
    Starting,
    Running,
    Stopped,
    Cancelled,
    Error,
    Completed,
    #[serde(other)]
    Unknown,
}

impl DocumentJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentJobStatus::Completed
                | DocumentJobStatus::Error
                | DocumentJobStatus::Cancelled
                | DocumentJobStatus::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentJobStatus::Pending => "pending",
            DocumentJobStatus::Starting => "starting",
            DocumentJobStatus::Running => "running",
            DocumentJobStatus::Stopped => "stopped",
            DocumentJobStatus::Cancelled => "cancelled",
            DocumentJobStatus::Error => "error",
            DocumentJobStatus::Completed => "completed",
            DocumentJobStatus::Unknown => "unknown",
        }
    }
}

/// Control action sent to an existing document job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Stop,
    Resume,
    Cancel,
}

impl JobAction {
    pub fn as_str(self) -> &'static str {
        match self {
            JobAction::Stop => "stop",
            JobAction::Resume => "resume",
            JobAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job action `{0}` (expected stop, resume or cancel)")]
pub struct UnknownJobAction(pub String);

impl FromStr for JobAction {
    type Err = UnknownJobAction;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(JobAction::Stop),
            "resume" => Ok(JobAction::Resume),
            "cancel" => Ok(JobAction::Cancel),
            _ => Err(UnknownJobAction(raw.to_string())),
        }
    }
}

/// Entry of a document phase menu: start a new job, or act on the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    Start,
    Job(JobAction),
}

impl PhaseAction {
    pub const ALL: [PhaseAction; 4] = [
        PhaseAction::Start,
        PhaseAction::Job(JobAction::Stop),
        PhaseAction::Job(JobAction::Resume),
        PhaseAction::Job(JobAction::Cancel),
    ];
}

/// Identifies one phase of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPhaseKey {
    pub document_id: DocumentId,
    pub phase: Phase,
}

impl DocumentPhaseKey {
    pub fn new(document_id: DocumentId, phase: Phase) -> Self {
        Self { document_id, phase }
    }
}

impl fmt::Display for DocumentPhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document_id, self.phase)
    }
}

/// Last-known state of a document phase job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentPhaseJob {
    pub job_id: Option<JobId>,
    pub status: Option<DocumentJobStatus>,
    pub requested_action: Option<JobAction>,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl DocumentPhaseJob {
    /// Merges `patch` into this entry. Fields the patch does not carry keep
    /// their current value.
    pub fn apply(&mut self, patch: DocumentJobPatch) {
        if let Some(job_id) = patch.job_id {
            self.job_id = Some(job_id);
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(requested_action) = patch.requested_action {
            self.requested_action = requested_action;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(result) = patch.result {
            self.result = Some(result);
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == Some(DocumentJobStatus::Running)
    }
}

/// Partial update for a [`DocumentPhaseJob`].
///
/// `None` leaves a field alone. For the clearable fields the inner option is
/// the new value, so `Some(None)` clears.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentJobPatch {
    pub job_id: Option<JobId>,
    pub status: Option<DocumentJobStatus>,
    pub requested_action: Option<Option<JobAction>>,
    pub error: Option<Option<String>>,
    pub result: Option<Value>,
}

impl DocumentJobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_status(mut self, status: DocumentJobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_requested_action(mut self, action: Option<JobAction>) -> Self {
        self.requested_action = Some(action);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Body of `GET /documents/jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentJobSnapshot {
    pub status: DocumentJobStatus,
    #[serde(default)]
    pub requested_action: Option<JobAction>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Status of a harvest-level job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    Pending,
    Running,
    Partial,
    Completed,
    Error,
    Cancelled,
    Stopped,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl HarvestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HarvestStatus::Completed
                | HarvestStatus::Error
                | HarvestStatus::Cancelled
                | HarvestStatus::Stopped
                | HarvestStatus::Deleted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HarvestStatus::Pending => "pending",
            HarvestStatus::Running => "running",
            HarvestStatus::Partial => "partial",
            HarvestStatus::Completed => "completed",
            HarvestStatus::Error => "error",
            HarvestStatus::Cancelled => "cancelled",
            HarvestStatus::Stopped => "stopped",
            HarvestStatus::Deleted => "deleted",
            HarvestStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub status: PhaseStatus,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: u64,
}

impl PhaseProgress {
    pub fn new(status: PhaseStatus) -> Self {
        Self {
            status,
            processed: 0,
            total: 0,
        }
    }
}

/// Body of `GET /harvest/{job_id}`. Phase keys the client does not know are
/// dropped when the snapshot is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestJobSnapshot {
    pub status: HarvestStatus,
    #[serde(default)]
    pub phases: Option<BTreeMap<String, PhaseProgress>>,
    #[serde(default)]
    pub site_id: Option<SiteId>,
    #[serde(default)]
    pub tasks: Option<Vec<Phase>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The harvest job currently followed by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedJob {
    pub id: JobId,
    pub status: HarvestStatus,
    pub phases: BTreeMap<Phase, PhaseProgress>,
    pub tasks: Vec<Phase>,
    pub site_id: Option<SiteId>,
    pub error: Option<String>,
    /// Number of status snapshots merged so far.
    pub polls: u32,
}

impl TrackedJob {
    /// A job the backend just accepted: `collect` runs, the other requested
    /// phases wait, the rest are skipped.
    pub fn launched(id: JobId, tasks: Vec<Phase>, site_id: Option<SiteId>) -> Self {
        let phases = Phase::ALL
            .iter()
            .map(|&phase| {
                let status = match (tasks.contains(&phase), phase) {
                    (false, _) => PhaseStatus::Skipped,
                    (true, Phase::Collect) => PhaseStatus::Running,
                    (true, _) => PhaseStatus::Pending,
                };
                (phase, PhaseProgress::new(status))
            })
            .collect();
        Self {
            id,
            status: HarvestStatus::Running,
            phases,
            tasks,
            site_id,
            error: None,
            polls: 0,
        }
    }

    /// A job attached by id whose state is not known yet.
    pub fn attached(id: JobId) -> Self {
        Self {
            id,
            status: HarvestStatus::Pending,
            phases: BTreeMap::new(),
            tasks: Vec::new(),
            site_id: None,
            error: None,
            polls: 0,
        }
    }

    pub fn merge_snapshot(&mut self, snapshot: HarvestJobSnapshot) {
        self.status = snapshot.status;
        if let Some(phases) = snapshot.phases {
            self.phases = phases
                .into_iter()
                .filter_map(|(name, progress)| name.parse::<Phase>().ok().map(|p| (p, progress)))
                .collect();
        }
        if let Some(site_id) = snapshot.site_id {
            self.site_id = Some(site_id);
        }
        if let Some(tasks) = snapshot.tasks.filter(|tasks| !tasks.is_empty()) {
            self.tasks = tasks;
        }
        self.error = snapshot.error;
        self.polls = self.polls.saturating_add(1);
    }

    pub fn phase_status(&self, phase: Phase) -> Option<&PhaseStatus> {
        self.phases.get(&phase).map(|progress| &progress.status)
    }

    /// Requested phases that neither succeeded nor were skipped.
    pub fn remaining_phases(&self) -> Vec<Phase> {
        let tasks: &[Phase] = if self.tasks.is_empty() {
            &Phase::ALL
        } else {
            &self.tasks
        };
        tasks
            .iter()
            .copied()
            .filter(|&phase| match self.phase_status(phase) {
                Some(status) => !status.is_successful() && *status != PhaseStatus::Skipped,
                None => true,
            })
            .collect()
    }

    /// Tasks to request when resuming: the remaining phases, else the job's
    /// own tasks, else every phase.
    pub fn resume_tasks(&self) -> Vec<Phase> {
        let remaining = self.remaining_phases();
        if !remaining.is_empty() {
            remaining
        } else if !self.tasks.is_empty() {
            self.tasks.clone()
        } else {
            Phase::ALL.to_vec()
        }
    }
}

/// Failures recovered into a tracked unit's error field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// The request never produced a response.
    #[error("{0}")]
    Network(String),
    /// Non-success status, or a payload carrying `error`.
    #[error("{}", rejection_text(.message))]
    BackendRejected { message: Option<String> },
    /// The polled job no longer exists on the backend.
    #[error("job not found or terminated")]
    NotFound,
    /// An action was requested for a unit with no known job id.
    #[error("no operation in progress")]
    NoActiveJob,
}

fn rejection_text(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("rejected by backend")
}

impl Failure {
    /// User-facing message, using `fallback` when the backend gave none.
    pub fn describe(&self, fallback: &str) -> String {
        match self {
            Failure::BackendRejected { message: None } => fallback.to_string(),
            Failure::Network(message) if message.is_empty() => "network error".to_string(),
            other => other.to_string(),
        }
    }
}
