use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dashboard_core::{Effect, Failure, Listing, Msg};
use dashboard_logging::{dashboard_error, dashboard_info, dashboard_warn};

use crate::{Backend, MsgSink, PollSettings, PollTarget, PollerSet, StateStore};

/// Executes effects produced by `update`. Every outcome comes back as a
/// message through the sink; nothing here touches application state.
pub struct EffectRunner {
    backend: Arc<dyn Backend>,
    sink: Arc<dyn MsgSink>,
    pollers: PollerSet,
    store: StateStore,
}

impl EffectRunner {
    pub fn new(
        backend: Arc<dyn Backend>,
        sink: Arc<dyn MsgSink>,
        poll: PollSettings,
        store: StateStore,
    ) -> Self {
        let pollers = PollerSet::new(Arc::clone(&backend), Arc::clone(&sink), poll);
        Self {
            backend,
            sink,
            pollers,
            store,
        }
    }

    pub fn pollers(&self) -> &PollerSet {
        &self.pollers
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Runs each effect. Must be called from within a tokio runtime.
    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    fn run(&self, effect: Effect) {
        match effect {
            Effect::StartDocumentPhase { key } => {
                dashboard_info!("StartDocumentPhase key={key}");
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.start_document_phase(key).await {
                        Ok(job_id) => Msg::PhaseStartAccepted { key, job_id },
                        Err(err) => {
                            dashboard_warn!("starting {key} failed: {err}");
                            Msg::PhaseStartFailed {
                                key,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::SendJobAction {
                key,
                job_id,
                action,
            } => {
                dashboard_info!("SendJobAction key={key} job_id={job_id} action={action}");
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.document_job_action(&job_id, action).await {
                        Ok(new_job_id) => Msg::JobActionAccepted {
                            key,
                            job_id,
                            action,
                            new_job_id,
                        },
                        Err(err) => {
                            dashboard_warn!("{action} on job {job_id} failed: {err}");
                            Msg::JobActionFailed {
                                key,
                                action,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::PollDocumentJob { key, job_id } => {
                self.pollers.start(job_id, PollTarget::DocumentPhase(key));
            }
            Effect::StopPolling { job_id } => {
                self.pollers.stop(&job_id);
            }
            Effect::StartHarvest { origin, request } => {
                dashboard_info!(
                    "StartHarvest harvester={} tasks={:?} resume={}",
                    request.harvester_type,
                    request.tasks,
                    request.resume
                );
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.start_harvest(&request).await {
                        Ok(job_id) => Msg::HarvestStarted {
                            origin,
                            job_id,
                            tasks: request.tasks,
                        },
                        Err(err) => {
                            dashboard_warn!("starting harvest failed: {err}");
                            Msg::HarvestStartFailed {
                                origin,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::StopHarvest { job_id } => {
                dashboard_info!("StopHarvest job_id={job_id}");
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.stop_harvest(&job_id).await {
                        Ok(()) => Msg::HarvestStopAccepted { job_id },
                        Err(err) => {
                            dashboard_warn!("stopping harvest {job_id} failed: {err}");
                            Msg::HarvestStopFailed {
                                job_id,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::PollHarvest { job_id } => {
                self.pollers.start(job_id, PollTarget::Harvest);
            }
            Effect::ExportHarvest { job_id } => {
                dashboard_info!("ExportHarvest job_id={job_id}");
                let backend = Arc::clone(&self.backend);
                let store = self.store.clone();
                self.spawn(async move {
                    let payload = match backend.export_harvest(&job_id).await {
                        Ok(payload) => payload,
                        Err(err) => {
                            let error = Failure::from(err).describe("export failed");
                            return Msg::ExportFailed { job_id, error };
                        }
                    };
                    let saved = tokio::task::spawn_blocking({
                        let job_id = job_id.clone();
                        move || store.save_export(&job_id, &payload, Utc::now())
                    })
                    .await;
                    match saved {
                        Ok(Ok(path)) => Msg::ExportSaved { job_id, path },
                        Ok(Err(err)) => Msg::ExportFailed {
                            job_id,
                            error: err.to_string(),
                        },
                        Err(err) => Msg::ExportFailed {
                            job_id,
                            error: err.to_string(),
                        },
                    }
                });
            }
            Effect::ReloadSites => {
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.list_sites().await {
                        Ok(sites) => Msg::SitesLoaded(sites),
                        Err(err) => {
                            dashboard_warn!("loading sites failed: {err}");
                            Msg::ListingFailed {
                                listing: Listing::Sites,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::ReloadDocuments { site_id, query } => {
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    match backend.list_documents(site_id, &query).await {
                        Ok(page) => Msg::DocumentsLoaded { site_id, page },
                        Err(err) => {
                            dashboard_warn!("loading documents of site {site_id} failed: {err}");
                            Msg::ListingFailed {
                                listing: Listing::Documents,
                                failure: err.into(),
                            }
                        }
                    }
                });
            }
            Effect::PersistSiteConfigs(configs) => {
                if let Err(err) = self.store.save_site_configs(&configs) {
                    dashboard_error!("saving site configs failed: {err}");
                }
            }
            Effect::DisposeAll => self.pollers.dispose_all(),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move { sink.send(task.await) });
    }
}
