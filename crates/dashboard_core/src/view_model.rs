use std::path::PathBuf;

use crate::{
    phase_status_label, AppState, CommandLoading, DocumentId, DocumentJobStatus, DocumentPhaseJob,
    DocumentPhaseKey, HarvestStatus, JobAction, JobId, ListingLoading, Phase, PhaseAction,
    PhaseStatus, SiteId, SiteStats, TaskOptions, TrackedJob,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    Spinner,
    Check,
    Cross,
    Stop,
    Refresh,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Info,
    Success,
    Danger,
    Warning,
    Muted,
    Neutral,
}

/// How one document phase is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDisplay {
    pub icon: StatusIcon,
    pub label: String,
    pub badge: BadgeTone,
}

impl PhaseDisplay {
    fn new(icon: StatusIcon, label: impl Into<String>, badge: BadgeTone) -> Self {
        Self {
            icon,
            label: label.into(),
            badge,
        }
    }
}

/// Presentation for a document phase.
///
/// The tracked job status wins when it is one of the active or terminal
/// states; otherwise the phase status from the last document listing is used.
pub fn derive_display(
    phase_status: Option<&PhaseStatus>,
    job_status: Option<DocumentJobStatus>,
) -> PhaseDisplay {
    if let Some(display) = job_status.and_then(job_display) {
        return display;
    }
    match phase_status {
        Some(PhaseStatus::Success) => {
            PhaseDisplay::new(StatusIcon::Check, "Completed", BadgeTone::Success)
        }
        Some(PhaseStatus::Error) => {
            PhaseDisplay::new(StatusIcon::Cross, "Error", BadgeTone::Danger)
        }
        Some(PhaseStatus::Partial) => {
            PhaseDisplay::new(StatusIcon::Refresh, "Partial", BadgeTone::Info)
        }
        Some(PhaseStatus::Pending | PhaseStatus::Queued) => {
            PhaseDisplay::new(StatusIcon::Circle, "Pending", BadgeTone::Warning)
        }
        Some(PhaseStatus::Skipped) => {
            PhaseDisplay::new(StatusIcon::Circle, "Skipped", BadgeTone::Muted)
        }
        // Only a listing `success` reads "Completed". `completed`, `running` and
        // unknown values keep the backend's raw lowercase text.
        Some(other) => PhaseDisplay::new(StatusIcon::Circle, other.as_str(), BadgeTone::Neutral),
        None => PhaseDisplay::new(StatusIcon::Circle, "—", BadgeTone::Neutral),
    }
}

fn job_display(status: DocumentJobStatus) -> Option<PhaseDisplay> {
    let display = match status {
        DocumentJobStatus::Starting => {
            PhaseDisplay::new(StatusIcon::Spinner, "Initializing…", BadgeTone::Info)
        }
        DocumentJobStatus::Running => {
            PhaseDisplay::new(StatusIcon::Spinner, "In progress", BadgeTone::Info)
        }
        DocumentJobStatus::Stopped => {
            PhaseDisplay::new(StatusIcon::Stop, "Stopped", BadgeTone::Warning)
        }
        DocumentJobStatus::Cancelled => {
            PhaseDisplay::new(StatusIcon::Cross, "Cancelled", BadgeTone::Warning)
        }
        DocumentJobStatus::Error => {
            PhaseDisplay::new(StatusIcon::Cross, "Error", BadgeTone::Danger)
        }
        DocumentJobStatus::Completed => {
            PhaseDisplay::new(StatusIcon::Check, "Completed", BadgeTone::Success)
        }
        DocumentJobStatus::Pending | DocumentJobStatus::Unknown => return None,
    };
    Some(display)
}

/// One entry of a document phase action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOption {
    pub action: PhaseAction,
    pub label: &'static str,
    pub disabled: bool,
}

/// Menu entries for a document phase given its tracked job status.
pub fn phase_action_options(status: Option<DocumentJobStatus>) -> [ActionOption; 4] {
    use DocumentJobStatus as S;

    let busy = matches!(status, Some(S::Running | S::Starting));
    let start_label = match status {
        Some(S::Running) | None => "Start",
        Some(_) => "Restart",
    };
    PhaseAction::ALL.map(|action| {
        let (label, disabled) = match action {
            PhaseAction::Start => (start_label, busy),
            PhaseAction::Job(JobAction::Stop) => ("Stop", !busy),
            PhaseAction::Job(JobAction::Resume) => (
                "Resume",
                !matches!(status, Some(S::Stopped | S::Error | S::Cancelled)),
            ),
            PhaseAction::Job(JobAction::Cancel) => (
                "Cancel",
                !matches!(status, Some(S::Pending | S::Running | S::Starting)),
            ),
        };
        ActionOption {
            action,
            label,
            disabled,
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRowView {
    pub id: SiteId,
    pub name: String,
    pub base_url: Option<String>,
    pub harvester_type: Option<String>,
    pub stats: SiteStats,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRowView {
    pub key: DocumentPhaseKey,
    pub display: PhaseDisplay,
    pub actions: [ActionOption; 4],
    pub job_id: Option<JobId>,
    pub requested_action: Option<JobAction>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRowView {
    pub id: DocumentId,
    pub title: String,
    pub phases: Vec<PhaseRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestPhaseView {
    pub phase: Phase,
    pub status: Option<PhaseStatus>,
    pub label: &'static str,
    pub processed: u64,
    pub total: u64,
    pub requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestJobView {
    pub job_id: JobId,
    pub status: HarvestStatus,
    pub site_id: Option<SiteId>,
    pub phases: Vec<HarvestPhaseView>,
    pub remaining: Vec<Phase>,
    pub error: Option<String>,
    pub polls: u32,
    pub can_stop: bool,
    pub can_resume: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub sites: Vec<SiteRowView>,
    /// Counters summed over every listed site.
    pub site_totals: SiteStats,
    pub selected_site: Option<SiteId>,
    pub documents: Vec<DocumentRowView>,
    pub document_total: u64,
    pub page: u32,
    pub page_size: u32,
    pub collections: Vec<String>,
    /// Every tracked document phase job, including those of documents not
    /// on the current page.
    pub tracked_jobs: Vec<PhaseRowView>,
    pub harvest: Option<HarvestJobView>,
    pub harvester: String,
    pub task_options: TaskOptions,
    pub commands: CommandLoading,
    pub loading: ListingLoading,
    pub last_export: Option<PathBuf>,
    pub notice: Option<String>,
    pub dirty: bool,
}

pub(crate) fn build(state: &AppState) -> AppViewModel {
    let sites = state
        .sites
        .iter()
        .map(|site| SiteRowView {
            id: site.id,
            name: site.display_name(),
            base_url: site.base_url.clone(),
            harvester_type: site.harvester_type.clone(),
            stats: site.stats,
            selected: state.selected_site == Some(site.id),
        })
        .collect();

    let documents = state
        .documents
        .items
        .iter()
        .map(|document| DocumentRowView {
            id: document.id,
            title: document
                .title
                .clone()
                .unwrap_or_else(|| format!("Document {}", document.id)),
            phases: Phase::ALL
                .iter()
                .map(|&phase| {
                    let key = DocumentPhaseKey::new(document.id, phase);
                    phase_row(
                        key,
                        document.phase_status(phase),
                        state.document_jobs.get(&key),
                    )
                })
                .collect(),
        })
        .collect();

    let tracked_jobs = state
        .document_jobs
        .iter()
        .map(|(key, job)| {
            let listed = state
                .documents
                .items
                .iter()
                .find(|document| document.id == key.document_id)
                .and_then(|document| document.phase_status(key.phase));
            phase_row(*key, listed, Some(job))
        })
        .collect();

    AppViewModel {
        sites,
        site_totals: SiteStats::totals(&state.sites),
        selected_site: state.selected_site,
        documents,
        document_total: state.documents.total,
        page: state.documents.page,
        page_size: state.documents.page_size,
        collections: state.documents.collections.clone(),
        tracked_jobs,
        harvest: state.harvest.as_ref().map(harvest_view),
        harvester: state.harvester.clone(),
        task_options: state.task_options,
        commands: state.commands,
        loading: state.loading,
        last_export: state.last_export.as_ref().map(|(_, path)| path.clone()),
        notice: state.notice.clone(),
        dirty: state.dirty,
    }
}

fn phase_row(
    key: DocumentPhaseKey,
    listed: Option<&PhaseStatus>,
    job: Option<&DocumentPhaseJob>,
) -> PhaseRowView {
    let status = job.and_then(|job| job.status);
    PhaseRowView {
        key,
        display: derive_display(listed, status),
        actions: phase_action_options(status),
        job_id: job.and_then(|job| job.job_id.clone()),
        requested_action: job.and_then(|job| job.requested_action),
        error: job.and_then(|job| job.error.clone()),
    }
}

fn harvest_view(job: &TrackedJob) -> HarvestJobView {
    let phases = Phase::ALL
        .iter()
        .map(|&phase| {
            let progress = job.phases.get(&phase);
            let status = progress.map(|progress| progress.status.clone());
            HarvestPhaseView {
                phase,
                label: status.as_ref().map_or("Pending", phase_status_label),
                status,
                processed: progress.map_or(0, |progress| progress.processed),
                total: progress.map_or(0, |progress| progress.total),
                requested: job.tasks.is_empty() || job.tasks.contains(&phase),
            }
        })
        .collect();
    let running = job.status == HarvestStatus::Running;
    HarvestJobView {
        job_id: job.id.clone(),
        status: job.status,
        site_id: job.site_id,
        phases,
        remaining: job.remaining_phases(),
        error: job.error.clone(),
        polls: job.polls,
        can_stop: running,
        can_resume: !running && job.status != HarvestStatus::Completed,
    }
}
