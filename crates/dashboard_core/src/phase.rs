use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three harvest stages. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Collect,
    Download,
    Analyze,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Collect, Phase::Download, Phase::Analyze];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Collect => "collect",
            Phase::Download => "download",
            Phase::Analyze => "analyze",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Collect => "Metadata collection",
            Phase::Download => "File download",
            Phase::Analyze => "AI analysis",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase `{0}` (expected collect, download or analyze)")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "collect" => Ok(Phase::Collect),
            "download" => Ok(Phase::Download),
            "analyze" => Ok(Phase::Analyze),
            _ => Err(UnknownPhase(raw.to_string())),
        }
    }
}

/// Deduplicates `tasks`, inserts missing dependencies and returns them in
/// phase order. `collect` is always present; `analyze` pulls in `download`.
pub fn normalize_tasks(tasks: &[Phase]) -> Vec<Phase> {
    let mut set: BTreeSet<Phase> = tasks.iter().copied().collect();
    if set.contains(&Phase::Analyze) {
        set.insert(Phase::Download);
    }
    set.insert(Phase::Collect);
    set.into_iter().collect()
}

/// Which optional phases the operator wants for the next launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    #[serde(default = "default_download")]
    pub download: bool,
    #[serde(default)]
    pub analyze: bool,
}

fn default_download() -> bool {
    true
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            download: true,
            analyze: false,
        }
    }
}

impl TaskOptions {
    pub fn from_tasks(tasks: &[Phase]) -> Self {
        Self {
            download: tasks.contains(&Phase::Download),
            analyze: tasks.contains(&Phase::Analyze),
        }
    }

    /// Flips an optional phase while keeping the dependency chain intact.
    /// `collect` cannot be toggled.
    pub fn toggle(&mut self, phase: Phase) {
        match phase {
            Phase::Collect => {}
            Phase::Download => {
                self.download = !self.download;
                if !self.download {
                    self.analyze = false;
                }
            }
            Phase::Analyze => {
                self.analyze = !self.analyze;
                if self.analyze {
                    self.download = true;
                }
            }
        }
    }

    pub fn tasks(&self) -> Vec<Phase> {
        let mut tasks = vec![Phase::Collect];
        if self.download || self.analyze {
            tasks.push(Phase::Download);
        }
        if self.analyze {
            tasks.push(Phase::Analyze);
        }
        tasks
    }
}

/// Phase status as summarised by the backend, both for harvest phases and
/// for per-document phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhaseStatus {
    Running,
    Completed,
    Success,
    Partial,
    Error,
    Queued,
    Pending,
    Skipped,
    Other(String),
}

impl PhaseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Success => "success",
            PhaseStatus::Partial => "partial",
            PhaseStatus::Error => "error",
            PhaseStatus::Queued => "queued",
            PhaseStatus::Pending => "pending",
            PhaseStatus::Skipped => "skipped",
            PhaseStatus::Other(raw) => raw,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Success)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, PhaseStatus::Error)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PhaseStatus::Running | PhaseStatus::Partial)
    }
}

impl From<String> for PhaseStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "running" => PhaseStatus::Running,
            "completed" => PhaseStatus::Completed,
            "success" => PhaseStatus::Success,
            "partial" => PhaseStatus::Partial,
            "error" => PhaseStatus::Error,
            "queued" => PhaseStatus::Queued,
            "pending" => PhaseStatus::Pending,
            "skipped" => PhaseStatus::Skipped,
            _ => PhaseStatus::Other(raw),
        }
    }
}

impl From<PhaseStatus> for String {
    fn from(status: PhaseStatus) -> Self {
        match status {
            PhaseStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress label for a harvest phase.
pub fn phase_status_label(status: &PhaseStatus) -> &'static str {
    if status.is_successful() {
        return "Completed";
    }
    match status {
        PhaseStatus::Error => "Error",
        PhaseStatus::Partial => "Partial",
        PhaseStatus::Skipped => "Skipped",
        PhaseStatus::Queued => "Queued",
        PhaseStatus::Pending => "Pending",
        _ => "In progress",
    }
}
