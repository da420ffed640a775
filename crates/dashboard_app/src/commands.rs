//! Command flows. Each one drives a [`Controller`] through messages and
//! prints the resulting view until the work it started has settled.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use dashboard_client::{Controller, HttpBackend};
use dashboard_core::{
    AppState, DocumentFilters, DocumentJobStatus, DocumentPhaseJob, DocumentPhaseKey, JobAction,
    JobId, Msg, SiteId,
};
use dashboard_logging::{dashboard_info, dashboard_warn};
use serde_json::Value;

use crate::config::AppConfig;
use crate::render;
use crate::{Command, HarvestJobCommand, PhaseCommand};

pub async fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    if let Command::Config = command {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    let backend = HttpBackend::new(&config.client_settings())
        .with_context(|| format!("invalid backend address {}", config.base_url))?;
    let mut controller = Controller::new(Arc::new(backend), config.controller_settings());
    if let Err(err) = controller.restore() {
        dashboard_warn!("Ignoring saved site configurations: {err}");
    }

    let outcome = match command {
        Command::Sites => list_sites(&mut controller).await,
        Command::Documents {
            site,
            page,
            page_size,
            phase,
            status,
            collection,
        } => {
            let filters = DocumentFilters {
                collection,
                status,
                phase,
                ..DocumentFilters::default()
            };
            list_documents(&mut controller, site, page, page_size, filters).await
        }
        Command::Phase { command } => run_phase(&mut controller, command).await,
        Command::Harvest { command } => run_harvest(&mut controller, command).await,
        Command::Config => Ok(()),
    };

    controller.dispose_all();
    outcome
}

async fn list_sites(controller: &mut Controller) -> anyhow::Result<()> {
    load_sites(controller).await?;
    println!("{}", render::sites(&controller.view()));
    Ok(())
}

async fn load_sites(controller: &mut Controller) -> anyhow::Result<()> {
    controller.dispatch(Msg::SitesRequested);
    controller.run_until(|state| !state.loading().sites).await;
    fail_on_notice(controller)
}

async fn list_documents(
    controller: &mut Controller,
    site: SiteId,
    page: u32,
    page_size: Option<u32>,
    filters: DocumentFilters,
) -> anyhow::Result<()> {
    if filters != DocumentFilters::default() {
        controller.dispatch(Msg::FiltersChanged(filters));
    }
    select_site(controller, site).await?;
    if page != 1 || page_size.is_some() {
        controller.dispatch(Msg::DocumentsRequested {
            page: Some(page),
            page_size,
        });
        wait_for_documents(controller).await?;
    }
    println!("{}", render::documents(&controller.view()));
    Ok(())
}

/// Loads the site list, then selects `site`, which also brings back its saved
/// harvest configuration and first page of documents.
async fn select_site(controller: &mut Controller, site: SiteId) -> anyhow::Result<()> {
    load_sites(controller).await?;
    if !controller.state().sites().iter().any(|summary| summary.id == site) {
        dashboard_warn!("Site {site} is not in the site list");
    }
    controller.dispatch(Msg::SiteSelected(site));
    wait_for_documents(controller).await
}

async fn wait_for_documents(controller: &mut Controller) -> anyhow::Result<()> {
    controller.run_until(|state| !state.loading().documents).await;
    fail_on_notice(controller)
}

fn fail_on_notice(controller: &Controller) -> anyhow::Result<()> {
    match controller.state().notice() {
        Some(notice) => Err(anyhow!(notice.to_string())),
        None => Ok(()),
    }
}

async fn run_phase(controller: &mut Controller, command: PhaseCommand) -> anyhow::Result<()> {
    match command {
        PhaseCommand::Start {
            document,
            phase,
            site,
        } => {
            if let Some(site) = site {
                select_site(controller, site).await?;
            }
            controller.start_document_phase(document, phase);
            follow_document(controller, DocumentPhaseKey::new(document, phase)).await
        }
        PhaseCommand::Action {
            document,
            phase,
            action,
            job,
        } => {
            let key = DocumentPhaseKey::new(document, phase);
            let job_id = JobId::from(job);
            if action == JobAction::Resume {
                return resume_document(controller, key, job_id).await;
            }
            controller.dispatch(Msg::TrackDocumentJob {
                key,
                job_id: job_id.clone(),
            });
            controller.perform_action(Some(job_id), document, phase, action);
            follow_document(controller, key).await
        }
    }
}

/// Resumes `job_id` without polling it first, so only the resume answer can
/// touch the unit. A resume that names no new job leaves nothing to follow.
async fn resume_document(
    controller: &mut Controller,
    key: DocumentPhaseKey,
    job_id: JobId,
) -> anyhow::Result<()> {
    let (document, phase) = (key.document_id, key.phase);
    controller.perform_action(Some(job_id.clone()), document, phase, JobAction::Resume);
    controller
        .run_until(|state| {
            state
                .document_jobs()
                .get(&key)
                .is_none_or(|job| job.requested_action.is_none())
        })
        .await;

    let job = controller.state().document_jobs().get(&key).cloned();
    match job {
        Some(DocumentPhaseJob {
            error: Some(error), ..
        }) => Err(anyhow!(error)),
        Some(DocumentPhaseJob {
            job_id: Some(_), ..
        }) => follow_document(controller, key).await,
        _ => {
            println!("{key}: resumed job {job_id}");
            Ok(())
        }
    }
}

/// A document unit is done once it reports a final status.
fn document_settled(state: &AppState, key: &DocumentPhaseKey) -> bool {
    state
        .document_jobs()
        .get(key)
        .and_then(|job| job.status)
        .is_some_and(DocumentJobStatus::is_terminal)
}

/// Prints the unit's row whenever it changes until it reaches a final
/// status.
async fn follow_document(
    controller: &mut Controller,
    key: DocumentPhaseKey,
) -> anyhow::Result<()> {
    let mut last = String::new();
    loop {
        let view = controller.view();
        if let Some(row) = view.tracked_jobs.iter().find(|row| row.key == key) {
            let line = render::phase_row(row);
            if line != last {
                println!("{}", line);
                last = line;
            }
        }

        if document_settled(controller.state(), &key) {
            let job = controller.state().document_jobs().get(&key).cloned();
            return match job.map(|job| (job.status, job.error)) {
                Some((Some(DocumentJobStatus::Error), Some(error))) => Err(anyhow!(error)),
                Some((Some(DocumentJobStatus::Error), None)) => Err(anyhow!("{key} failed")),
                _ => Ok(()),
            };
        }
        next_message(controller).await?;
    }
}

async fn run_harvest(
    controller: &mut Controller,
    command: HarvestJobCommand,
) -> anyhow::Result<()> {
    match command {
        HarvestJobCommand::Launch {
            site,
            harvester,
            url,
            tasks,
        } => {
            if let Some(site) = site {
                select_site(controller, site).await?;
            }
            if let Some(harvester) = harvester {
                controller.dispatch(Msg::HarvesterSelected(harvester));
            }
            if let Some(url) = url {
                controller.dispatch(Msg::FormFieldChanged {
                    name: "url".to_string(),
                    value: Value::String(url),
                });
            }
            let tasks = (!tasks.is_empty()).then_some(tasks);
            controller.dispatch(Msg::HarvestLaunchClicked { tasks });
            controller.run_until(|state| !state.commands().launch).await;
            if controller.state().harvest().is_none() {
                fail_on_notice(controller)?;
                bail!("harvest was not started");
            }
            follow_harvest(controller).await
        }
        HarvestJobCommand::Watch { job } => {
            attach(controller, job);
            follow_harvest(controller).await
        }
        HarvestJobCommand::Stop { job } => {
            attach(controller, job);
            controller.dispatch(Msg::HarvestStopClicked);
            follow_harvest(controller).await
        }
        HarvestJobCommand::Resume { job, site } => {
            if let Some(site) = site {
                select_site(controller, site).await?;
            }
            attach(controller, job);
            wait_for_first_poll(controller).await;
            controller.dispatch(Msg::HarvestResumeClicked);
            controller.run_until(|state| !state.commands().resume).await;
            fail_on_notice(controller)?;
            follow_harvest(controller).await
        }
        HarvestJobCommand::Cancel { job } => {
            attach(controller, job);
            wait_for_first_poll(controller).await;
            controller.dispatch(Msg::HarvestCancelClicked);
            follow_harvest(controller).await
        }
        HarvestJobCommand::Export { job } => {
            attach(controller, job);
            controller.dispatch(Msg::HarvestExportClicked);
            controller.run_until(|state| !state.commands().export).await;
            match controller.state().last_export() {
                Some((_, path)) => {
                    println!("exported to {}", path.display());
                    Ok(())
                }
                None => {
                    fail_on_notice(controller)?;
                    bail!("export did not complete")
                }
            }
        }
    }
}

fn attach(controller: &mut Controller, job: String) {
    controller.dispatch(Msg::HarvestAttached {
        job_id: JobId::from(job),
    });
}

async fn wait_for_first_poll(controller: &mut Controller) {
    controller
        .run_until(|state| {
            state
                .harvest()
                .is_none_or(|job| job.polls > 0 || job.error.is_some())
        })
        .await;
}

/// The followed harvest is done once no command awaits the backend and the
/// job either reached a final status or recorded an error.
fn harvest_settled(state: &AppState) -> bool {
    !state.commands().any()
        && state
            .harvest()
            .is_none_or(|job| job.status.is_terminal() || job.error.is_some())
}

/// Prints the harvest job whenever it changes until it settles.
async fn follow_harvest(controller: &mut Controller) -> anyhow::Result<()> {
    let mut last = String::new();
    loop {
        let view = controller.view();
        if let Some(harvest) = &view.harvest {
            let text = render::harvest(harvest);
            if text != last {
                println!("{}", text);
                last = text;
            }
        }

        if harvest_settled(controller.state()) {
            let error = controller
                .state()
                .harvest()
                .and_then(|job| job.error.clone());
            return match error {
                Some(error) => Err(anyhow!(error)),
                None => Ok(()),
            };
        }
        next_message(controller).await?;
    }
}

enum Next {
    Applied,
    Closed,
    Interrupted,
}

async fn next_message(controller: &mut Controller) -> anyhow::Result<()> {
    let next = tokio::select! {
        applied = controller.process_next() => {
            if applied {
                Next::Applied
            } else {
                Next::Closed
            }
        }
        _ = tokio::signal::ctrl_c() => Next::Interrupted,
    };
    match next {
        Next::Applied => Ok(()),
        Next::Closed => bail!("message channel closed"),
        Next::Interrupted => {
            dashboard_info!("Interrupted; stopping pollers");
            controller.dispose_all();
            bail!("interrupted")
        }
    }
}
