use std::path::PathBuf;
use std::sync::Arc;

use dashboard_core::{
    update, AppState, AppViewModel, DocumentId, DocumentPhaseKey, JobAction, JobId, Msg, Phase,
};
use dashboard_logging::dashboard_trace;
use tokio::sync::mpsc;

use crate::{
    Backend, ChannelMsgSink, EffectRunner, MsgSink, PersistError, PollSettings, PollerSet,
    StateStore,
};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub poll: PollSettings,
    pub state_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            state_dir: PathBuf::from("."),
            export_dir: PathBuf::from("exports"),
        }
    }
}

/// Owns the application state and the single loop that applies messages to
/// it. Background tasks only ever talk to it through the message channel.
pub struct Controller {
    state: AppState,
    runner: EffectRunner,
    tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
}

impl Controller {
    pub fn new(backend: Arc<dyn Backend>, settings: ControllerSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn MsgSink> = Arc::new(ChannelMsgSink::new(tx.clone()));
        let store = StateStore::new(settings.state_dir, settings.export_dir);
        let runner = EffectRunner::new(backend, sink, settings.poll, store);
        Self {
            state: AppState::new(),
            runner,
            tx,
            rx,
        }
    }

    /// Loads saved site configurations into the state.
    pub fn restore(&mut self) -> Result<(), PersistError> {
        let configs = self.runner.store().load_site_configs()?;
        self.dispatch(Msg::RestoreSiteConfigs(configs));
        Ok(())
    }

    /// Applies `msg` and runs the resulting effects.
    pub fn dispatch(&mut self, msg: Msg) {
        dashboard_trace!("dispatch {msg:?}");
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
    }

    /// Waits for the next message from a background task and applies it.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        }
    }

    /// Applies every message already waiting. Returns how many there were.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.dispatch(msg);
            applied += 1;
        }
        applied
    }

    /// Processes messages until `done` holds for the state.
    pub async fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut(&AppState) -> bool,
    {
        while !done(&self.state) {
            if !self.process_next().await {
                break;
            }
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    pub fn consume_dirty(&mut self) -> bool {
        self.state.consume_dirty()
    }

    pub fn pollers(&self) -> &PollerSet {
        self.runner.pollers()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.tx.clone()
    }

    pub fn start_document_phase(&mut self, document_id: DocumentId, phase: Phase) {
        self.dispatch(Msg::StartPhaseRequested {
            key: DocumentPhaseKey::new(document_id, phase),
        });
    }

    /// Sends `action` for a document phase. Without a job id nothing is sent
    /// and the unit records that no operation is in progress.
    pub fn perform_action(
        &mut self,
        job_id: Option<JobId>,
        document_id: DocumentId,
        phase: Phase,
        action: JobAction,
    ) {
        self.dispatch(Msg::JobActionRequested {
            key: DocumentPhaseKey::new(document_id, phase),
            job_id,
            action,
        });
    }

    pub fn dispose_all(&mut self) {
        self.dispatch(Msg::Teardown);
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.runner.pollers().dispose_all();
    }
}
