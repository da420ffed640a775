use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashboard_core::{DocumentPhaseKey, Failure, JobId, Msg};
use dashboard_logging::{dashboard_debug, dashboard_info, dashboard_warn};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub document_period: Duration,
    pub harvest_period: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            document_period: Duration::from_millis(1500),
            harvest_period: Duration::from_millis(2000),
        }
    }
}

/// What a poller reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTarget {
    DocumentPhase(DocumentPhaseKey),
    Harvest,
}

/// Where background tasks deliver their messages.
pub trait MsgSink: Send + Sync {
    fn send(&self, msg: Msg);
}

pub struct ChannelMsgSink {
    tx: mpsc::UnboundedSender<Msg>,
}

impl ChannelMsgSink {
    pub fn new(tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self { tx }
    }
}

impl MsgSink for ChannelMsgSink {
    fn send(&self, msg: Msg) {
        if self.tx.send(msg).is_err() {
            dashboard_debug!("message dropped: controller is gone");
        }
    }
}

struct PollerEntry {
    generation: u64,
    target: PollTarget,
    cancel: CancellationToken,
}

struct Shared {
    backend: Arc<dyn Backend>,
    sink: Arc<dyn MsgSink>,
    settings: PollSettings,
    entries: Mutex<HashMap<JobId, PollerEntry>>,
    next_generation: AtomicU64,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, HashMap<JobId, PollerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the entry for `job_id` if it still belongs to `generation`.
    fn release(&self, job_id: &JobId, generation: u64) {
        let mut entries = self.entries();
        if entries
            .get(job_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(job_id);
        }
    }
}

/// Handle table of recurring status checks, at most one per job id.
///
/// Each poller checks its job once per period, starting one period after it
/// is started. A tick awaits its own request, so checks for one job never
/// overlap. Stopping a poller cancels its timer; a request already in flight
/// still delivers its result.
#[derive(Clone)]
pub struct PollerSet {
    shared: Arc<Shared>,
}

impl PollerSet {
    pub fn new(backend: Arc<dyn Backend>, sink: Arc<dyn MsgSink>, settings: PollSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                sink,
                settings,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Starts polling `job_id`, replacing any poller already registered for
    /// it. Must be called from within a tokio runtime.
    pub fn start(&self, job_id: JobId, target: PollTarget) {
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = self.shared.entries().insert(
            job_id.clone(),
            PollerEntry {
                generation,
                target,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            dashboard_debug!("replaced poller for job {job_id}");
        }

        let period = match target {
            PollTarget::DocumentPhase(_) => self.shared.settings.document_period,
            PollTarget::Harvest => self.shared.settings.harvest_period,
        };
        dashboard_info!("polling job {job_id} every {}ms", period.as_millis());
        let shared = Arc::clone(&self.shared);
        tokio::spawn(run(shared, job_id, target, generation, cancel, period));
    }

    /// Cancels the poller for `job_id`. Returns whether one was active.
    pub fn stop(&self, job_id: &JobId) -> bool {
        let removed = self.shared.entries().remove(job_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                dashboard_debug!("stopped poller for job {job_id}");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.shared.entries().contains_key(job_id)
    }

    pub fn target(&self, job_id: &JobId) -> Option<PollTarget> {
        self.shared.entries().get(job_id).map(|entry| entry.target)
    }

    pub fn active_count(&self) -> usize {
        self.shared.entries().len()
    }

    pub fn active_job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.shared.entries().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancels every poller.
    pub fn dispose_all(&self) {
        let drained: Vec<(JobId, PollerEntry)> = self.shared.entries().drain().collect();
        if !drained.is_empty() {
            dashboard_info!("disposing {} poller(s)", drained.len());
        }
        for (_, entry) in drained {
            entry.cancel.cancel();
        }
    }
}

async fn run(
    shared: Arc<Shared>,
    job_id: JobId,
    target: PollTarget,
    generation: u64,
    cancel: CancellationToken,
    period: Duration,
) {
    let mut ticks = time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticks.tick() => {}
        }

        let (msg, finished) = match target {
            PollTarget::DocumentPhase(key) => {
                let outcome = shared
                    .backend
                    .document_job_status(&job_id)
                    .await
                    .map_err(Failure::from);
                let finished = match &outcome {
                    Ok(snapshot) => snapshot.status.is_terminal(),
                    Err(failure) => {
                        dashboard_warn!("polling document job {job_id} ({key}) failed: {failure}");
                        true
                    }
                };
                let msg = Msg::DocumentJobPolled {
                    key,
                    job_id: job_id.clone(),
                    outcome,
                };
                (msg, finished)
            }
            PollTarget::Harvest => {
                let outcome = shared
                    .backend
                    .harvest_status(&job_id)
                    .await
                    .map_err(Failure::from);
                let finished = match &outcome {
                    Ok(snapshot) => snapshot.status.is_terminal(),
                    Err(failure) => {
                        dashboard_warn!("polling harvest job {job_id} failed: {failure}");
                        true
                    }
                };
                let msg = Msg::HarvestPolled {
                    job_id: job_id.clone(),
                    outcome,
                };
                (msg, finished)
            }
        };

        // The handle is released before the final result is delivered.
        if finished {
            dashboard_debug!("poller for job {job_id} finished");
            shared.release(&job_id, generation);
        }
        shared.sink.send(msg);
        if finished {
            return;
        }
    }
}
