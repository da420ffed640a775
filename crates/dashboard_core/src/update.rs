use crate::{
    normalize_tasks, AppState, DocumentJobPatch, DocumentJobSnapshot, DocumentJobStatus,
    DocumentPage, DocumentPhaseKey, Effect, Failure, HarvestCommand, HarvestJobSnapshot,
    HarvestRequest, HarvestStatus, JobAction, JobId, Listing, Msg, Phase, PhaseAction, PhaseStatus,
    SiteConfig, SiteId, TaskOptions, TrackedJob,
};

const START_PHASE_FALLBACK: &str = "could not start phase";
const JOB_ACTION_FALLBACK: &str = "action rejected";
const HARVEST_START_FALLBACK: &str = "could not start harvest";
const HARVEST_STOP_FALLBACK: &str = "could not stop harvest";
const POLL_FALLBACK: &str = "status tracking failed";
const LISTING_FALLBACK: &str = "could not load listing";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SitesRequested => {
            state.loading.sites = true;
            state.mark_dirty();
            vec![Effect::ReloadSites]
        }
        Msg::SitesLoaded(sites) => {
            state.sites = sites;
            state.loading.sites = false;
            state.mark_dirty();
            Vec::new()
        }
        Msg::SiteSelected(site_id) => select_site(&mut state, site_id),
        Msg::DocumentsRequested { page, page_size } => {
            let page = page.unwrap_or(state.documents.page);
            let page_size = page_size.unwrap_or(state.documents.page_size);
            reload_documents(&mut state, page, page_size)
        }
        Msg::FiltersChanged(filters) => {
            state.filters = filters;
            let page_size = state.documents.page_size;
            reload_documents(&mut state, 1, page_size)
        }
        Msg::DocumentsLoaded { site_id, page } => {
            // A late page for a previously selected site is dropped.
            if state.selected_site == Some(site_id) {
                state.document_jobs.prune_for_page(&page.items);
                state.documents = page;
                state.loading.documents = false;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ListingFailed { listing, failure } => {
            match listing {
                Listing::Sites => state.loading.sites = false,
                Listing::Documents => state.loading.documents = false,
            }
            state.notice = Some(failure.describe(LISTING_FALLBACK));
            state.mark_dirty();
            Vec::new()
        }

        Msg::StartPhaseRequested { key } => start_document_phase(&mut state, key),
        Msg::JobActionRequested {
            key,
            job_id,
            action,
        } => request_job_action(&mut state, key, job_id, action),
        Msg::PhaseActionClicked { key, action } => match action {
            PhaseAction::Start => start_document_phase(&mut state, key),
            PhaseAction::Job(action) => {
                let job_id = state
                    .document_jobs
                    .get(&key)
                    .and_then(|job| job.job_id.clone());
                request_job_action(&mut state, key, job_id, action)
            }
        },
        Msg::TrackDocumentJob { key, job_id } => {
            state
                .document_jobs
                .upsert(key, DocumentJobPatch::new().with_job_id(job_id.clone()));
            state.mark_dirty();
            vec![Effect::PollDocumentJob { key, job_id }]
        }
        Msg::PhaseStartAccepted { key, job_id } => {
            state.document_jobs.upsert(
                key,
                DocumentJobPatch::new()
                    .with_job_id(job_id.clone())
                    .with_status(DocumentJobStatus::Running)
                    .with_error(None)
                    .with_requested_action(None),
            );
            state.mark_dirty();
            vec![Effect::PollDocumentJob { key, job_id }]
        }
        Msg::PhaseStartFailed { key, failure } => {
            state.document_jobs.upsert(
                key,
                DocumentJobPatch::new()
                    .with_status(DocumentJobStatus::Error)
                    .with_error(Some(failure.describe(START_PHASE_FALLBACK)))
                    .with_requested_action(None),
            );
            state.mark_dirty();
            Vec::new()
        }
        Msg::JobActionAccepted {
            key,
            job_id,
            action,
            new_job_id,
        } => job_action_accepted(&mut state, key, job_id, action, new_job_id),
        Msg::JobActionFailed { key, failure, .. } => {
            state.document_jobs.upsert(
                key,
                DocumentJobPatch::new()
                    .with_error(Some(failure.describe(JOB_ACTION_FALLBACK)))
                    .with_requested_action(None),
            );
            state.mark_dirty();
            Vec::new()
        }
        Msg::DocumentJobPolled {
            key,
            job_id,
            outcome,
        } => document_job_polled(&mut state, key, job_id, outcome),

        Msg::HarvesterSelected(harvester) => {
            state.harvester = harvester;
            state.mark_dirty();
            Vec::new()
        }
        Msg::FormFieldChanged { name, value } => {
            state.form.insert(name, value);
            state.mark_dirty();
            Vec::new()
        }
        Msg::TaskToggled(phase) => {
            let running = state
                .harvest
                .as_ref()
                .is_some_and(|job| job.status == HarvestStatus::Running);
            if !running {
                state.task_options.toggle(phase);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::RestoreSiteConfigs(configs) => {
            state.site_configs = configs;
            state.mark_dirty();
            Vec::new()
        }

        Msg::HarvestLaunchClicked { tasks } => {
            launch_harvest(&mut state, tasks, HarvestCommand::Launch)
        }
        Msg::HarvestResumeClicked => match state.harvest.as_ref().map(TrackedJob::resume_tasks) {
            Some(tasks) => launch_harvest(&mut state, Some(tasks), HarvestCommand::Resume),
            None => Vec::new(),
        },
        Msg::HarvestStopClicked => stop_harvest(&mut state),
        Msg::HarvestCancelClicked => cancel_harvest(&mut state),
        Msg::HarvestExportClicked => {
            match state.harvest.as_ref().map(|job| job.id.clone()) {
                Some(job_id) if !state.commands.is_set(HarvestCommand::Export) => {
                    state.commands.set(HarvestCommand::Export, true);
                    state.mark_dirty();
                    vec![Effect::ExportHarvest { job_id }]
                }
                _ => Vec::new(),
            }
        }
        Msg::HarvestAttached { job_id } => {
            let mut effects = stop_previous_harvest_poller(&state, &job_id);
            state.harvest = Some(TrackedJob::attached(job_id.clone()));
            state.last_collect_status = None;
            state.mark_dirty();
            effects.push(Effect::PollHarvest { job_id });
            effects
        }
        Msg::HarvestStarted {
            origin,
            job_id,
            tasks,
        } => {
            let mut effects = stop_previous_harvest_poller(&state, &job_id);
            state.commands.set(origin, false);
            state.harvest = Some(TrackedJob::launched(
                job_id.clone(),
                tasks,
                state.selected_site,
            ));
            state.last_collect_status = None;
            state.notice = None;
            state.mark_dirty();
            effects.push(Effect::PollHarvest { job_id });
            effects
        }
        Msg::HarvestStartFailed { origin, failure } => {
            state.commands.set(origin, false);
            state.notice = Some(failure.describe(HARVEST_START_FALLBACK));
            state.mark_dirty();
            Vec::new()
        }
        Msg::HarvestStopAccepted { job_id } => {
            release_stop_commands(&mut state);
            state.mark_dirty();
            // Poll again so the final state of the stopped job is observed.
            match state.harvest.as_ref() {
                Some(job) if job.id == job_id && job.status != HarvestStatus::Cancelled => {
                    vec![Effect::PollHarvest { job_id }]
                }
                _ => Vec::new(),
            }
        }
        Msg::HarvestStopFailed { job_id, failure } => {
            release_stop_commands(&mut state);
            let message = failure.describe(HARVEST_STOP_FALLBACK);
            match state.harvest.as_mut().filter(|job| job.id == job_id) {
                Some(job) => job.error = Some(message),
                None => state.notice = Some(message),
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::HarvestPolled { job_id, outcome } => harvest_polled(&mut state, job_id, outcome),
        Msg::ExportSaved { job_id, path } => {
            state.commands.set(HarvestCommand::Export, false);
            state.last_export = Some((job_id, path));
            state.mark_dirty();
            Vec::new()
        }
        Msg::ExportFailed { job_id, error } => {
            state.commands.set(HarvestCommand::Export, false);
            state.notice = Some(format!("export of job {job_id} failed: {error}"));
            state.mark_dirty();
            Vec::new()
        }

        Msg::Teardown => vec![Effect::DisposeAll],
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn select_site(state: &mut AppState, site_id: SiteId) -> Vec<Effect> {
    state.selected_site = Some(site_id);
    let page_size = state.documents.page_size;
    state.documents = DocumentPage {
        page_size,
        ..DocumentPage::default()
    };

    let site = state.selected_site_summary();
    let base_url = site.and_then(|site| site.base_url.clone());
    let harvester = site
        .and_then(|site| site.harvester_type.clone())
        .unwrap_or_else(|| state.harvester.clone());
    let stored = site.and_then(|site| site.current_parameters.clone());
    let (config, promoted) = state.site_configs.resolve(
        Some(site_id),
        base_url.as_deref(),
        &harvester,
        stored.as_ref(),
    );

    let mut effects = Vec::new();
    if let Some(config) = config {
        state.harvester = config.harvester;
        state.form = config.form_data;
        state.task_options = config.task_options;
    }
    if promoted {
        effects.push(Effect::PersistSiteConfigs(state.site_configs.clone()));
    }
    state.mark_dirty();
    effects.extend(reload_documents(state, 1, page_size));
    effects
}

fn reload_documents(state: &mut AppState, page: u32, page_size: u32) -> Vec<Effect> {
    let Some(site_id) = state.selected_site else {
        return Vec::new();
    };
    state.loading.documents = true;
    state.mark_dirty();
    vec![Effect::ReloadDocuments {
        site_id,
        query: state.document_query(page, page_size),
    }]
}

fn start_document_phase(state: &mut AppState, key: DocumentPhaseKey) -> Vec<Effect> {
    state.document_jobs.upsert(
        key,
        DocumentJobPatch::new()
            .with_status(DocumentJobStatus::Starting)
            .with_error(None)
            .with_requested_action(None),
    );
    state.mark_dirty();
    vec![Effect::StartDocumentPhase { key }]
}

fn request_job_action(
    state: &mut AppState,
    key: DocumentPhaseKey,
    job_id: Option<JobId>,
    action: JobAction,
) -> Vec<Effect> {
    let Some(job_id) = job_id else {
        state.document_jobs.upsert(
            key,
            DocumentJobPatch::new()
                .with_error(Some(Failure::NoActiveJob.to_string()))
                .with_requested_action(None),
        );
        state.mark_dirty();
        return Vec::new();
    };

    state.document_jobs.upsert(
        key,
        DocumentJobPatch::new()
            .with_error(None)
            .with_requested_action(Some(action)),
    );
    state.mark_dirty();
    vec![Effect::SendJobAction {
        key,
        job_id,
        action,
    }]
}

fn job_action_accepted(
    state: &mut AppState,
    key: DocumentPhaseKey,
    job_id: JobId,
    action: JobAction,
    new_job_id: Option<JobId>,
) -> Vec<Effect> {
    let effects = match action {
        JobAction::Resume => {
            let mut effects = vec![Effect::StopPolling { job_id }];
            match new_job_id {
                Some(new_job_id) => {
                    state.document_jobs.upsert(
                        key,
                        DocumentJobPatch::new()
                            .with_job_id(new_job_id.clone())
                            .with_status(DocumentJobStatus::Running)
                            .with_requested_action(None)
                            .with_error(None),
                    );
                    effects.push(Effect::PollDocumentJob {
                        key,
                        job_id: new_job_id,
                    });
                }
                None => {
                    state
                        .document_jobs
                        .upsert(key, DocumentJobPatch::new().with_requested_action(None));
                }
            }
            effects
        }
        // The running poller reports the outcome; until then the request
        // stays visible.
        JobAction::Stop | JobAction::Cancel => {
            state.document_jobs.upsert(
                key,
                DocumentJobPatch::new().with_requested_action(Some(action)),
            );
            Vec::new()
        }
    };
    state.mark_dirty();
    effects
}

fn document_job_polled(
    state: &mut AppState,
    key: DocumentPhaseKey,
    job_id: JobId,
    outcome: Result<DocumentJobSnapshot, Failure>,
) -> Vec<Effect> {
    let tracked = state
        .document_jobs
        .get(&key)
        .and_then(|job| job.job_id.as_ref());
    if tracked.is_some_and(|tracked| *tracked != job_id) {
        // The unit moved on to another job id; this answer is stale.
        return Vec::new();
    }

    match outcome {
        Ok(snapshot) => {
            let terminal = snapshot.status.is_terminal();
            let mut patch = DocumentJobPatch::new()
                .with_job_id(job_id)
                .with_status(snapshot.status)
                .with_requested_action(snapshot.requested_action)
                .with_error(snapshot.error);
            if let Some(result) = snapshot.result {
                patch = patch.with_result(result);
            }
            state.document_jobs.upsert(key, patch);
            state.mark_dirty();
            if terminal {
                let (page, page_size) = (state.documents.page, state.documents.page_size);
                reload_documents(state, page, page_size)
            } else {
                Vec::new()
            }
        }
        Err(failure) => {
            state.document_jobs.upsert(
                key,
                DocumentJobPatch::new()
                    .with_status(DocumentJobStatus::Error)
                    .with_error(Some(failure.describe(POLL_FALLBACK)))
                    .with_requested_action(None),
            );
            state.mark_dirty();
            Vec::new()
        }
    }
}

fn launch_harvest(
    state: &mut AppState,
    tasks_override: Option<Vec<Phase>>,
    origin: HarvestCommand,
) -> Vec<Effect> {
    if state.commands.is_set(origin) {
        return Vec::new();
    }
    let requested = tasks_override
        .filter(|tasks| !tasks.is_empty())
        .unwrap_or_else(|| state.task_options.tasks());
    let tasks = normalize_tasks(&requested);
    state.task_options = TaskOptions::from_tasks(&tasks);

    let mut effects = Vec::new();
    if let Some(site_id) = state.selected_site {
        let config = SiteConfig {
            harvester: state.harvester.clone(),
            form_data: state.form.clone(),
            task_options: state.task_options,
        };
        let url = state.form_url();
        if state.site_configs.save(Some(site_id), url.as_deref(), config) {
            effects.push(Effect::PersistSiteConfigs(state.site_configs.clone()));
        }
    }

    let mut request = HarvestRequest::new(state.harvester.clone(), tasks, &state.form);
    request.resume = origin == HarvestCommand::Resume;
    state.commands.set(origin, true);
    state.notice = None;
    state.mark_dirty();
    effects.push(Effect::StartHarvest { origin, request });
    effects
}

fn stop_harvest(state: &mut AppState) -> Vec<Effect> {
    let Some(job_id) = state.harvest.as_ref().map(|job| job.id.clone()) else {
        return Vec::new();
    };
    if state.commands.is_set(HarvestCommand::Stop) {
        return Vec::new();
    }
    state.commands.set(HarvestCommand::Stop, true);
    state.mark_dirty();
    vec![Effect::StopHarvest { job_id }]
}

fn cancel_harvest(state: &mut AppState) -> Vec<Effect> {
    let Some(job) = state.harvest.as_mut() else {
        return Vec::new();
    };
    let job_id = job.id.clone();
    let mut effects = Vec::new();
    // Only a running job needs the backend told; the stop is not reported.
    if job.status == HarvestStatus::Running {
        state.commands.set(HarvestCommand::Cancel, true);
        effects.push(Effect::StopHarvest {
            job_id: job_id.clone(),
        });
    }
    job.status = HarvestStatus::Cancelled;
    effects.push(Effect::StopPolling { job_id });
    state.mark_dirty();
    effects
}

/// A stop request resolved, whether it came from stop or from cancel.
fn release_stop_commands(state: &mut AppState) {
    state.commands.set(HarvestCommand::Stop, false);
    state.commands.set(HarvestCommand::Cancel, false);
}

fn stop_previous_harvest_poller(state: &AppState, next: &JobId) -> Vec<Effect> {
    match state.harvest.as_ref() {
        Some(previous) if previous.id != *next => vec![Effect::StopPolling {
            job_id: previous.id.clone(),
        }],
        _ => Vec::new(),
    }
}

fn harvest_polled(
    state: &mut AppState,
    job_id: JobId,
    outcome: Result<HarvestJobSnapshot, Failure>,
) -> Vec<Effect> {
    let selected_site = state.selected_site;
    let Some(job) = state.harvest.as_mut().filter(|job| job.id == job_id) else {
        return Vec::new();
    };

    match outcome {
        Ok(snapshot) => {
            job.merge_snapshot(snapshot);
            let terminal = job.status.is_terminal();
            let collect_status = job.phase_status(Phase::Collect).cloned();
            let collect_finished_here = collect_status
                .as_ref()
                .is_some_and(PhaseStatus::is_successful)
                && job.site_id.is_some()
                && job.site_id == selected_site
                && state.last_collect_status != collect_status;
            state.last_collect_status = collect_status;
            state.mark_dirty();

            let mut effects = Vec::new();
            if terminal {
                state.loading.sites = true;
                effects.push(Effect::ReloadSites);
            }
            if terminal || collect_finished_here {
                let page_size = state.documents.page_size;
                effects.extend(reload_documents(state, 1, page_size));
            }
            effects
        }
        Err(failure) => {
            job.error = Some(failure.describe(POLL_FALLBACK));
            state.mark_dirty();
            Vec::new()
        }
    }
}
