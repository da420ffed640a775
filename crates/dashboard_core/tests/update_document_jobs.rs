use std::sync::Once;

use dashboard_core::{
    update, AppState, DocumentJobSnapshot, DocumentJobStatus, DocumentPage, DocumentPhaseKey,
    DocumentQuery, DocumentSummary, Effect, Failure, JobAction, JobId, Msg, Phase, PhaseAction,
    SiteStats, SiteSummary,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(dashboard_logging::initialize_for_tests);
}

fn key() -> DocumentPhaseKey {
    DocumentPhaseKey::new(42, Phase::Download)
}

fn started(job: &str) -> AppState {
    let (state, _) = update(AppState::new(), Msg::StartPhaseRequested { key: key() });
    let (state, _) = update(
        state,
        Msg::PhaseStartAccepted {
            key: key(),
            job_id: JobId::from(job),
        },
    );
    state
}

fn with_site(state: AppState) -> AppState {
    let (state, _) = update(
        state,
        Msg::SitesLoaded(vec![SiteSummary {
            id: 7,
            name: Some("Example".to_string()),
            base_url: Some("https://www.example.org".to_string()),
            harvester_type: None,
            stats: SiteStats {
                total: 1,
                ..SiteStats::default()
            },
            current_parameters: None,
        }]),
    );
    let (state, _) = update(state, Msg::SiteSelected(7));
    state
}

fn snapshot(status: DocumentJobStatus) -> DocumentJobSnapshot {
    DocumentJobSnapshot {
        status,
        requested_action: None,
        error: None,
        result: None,
    }
}

#[test]
fn start_phase_walks_from_starting_to_running() {
    init_logging();
    let (mut state, effects) = update(AppState::new(), Msg::StartPhaseRequested { key: key() });

    assert_eq!(effects, vec![Effect::StartDocumentPhase { key: key() }]);
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Starting));
    assert_eq!(job.job_id, None);
    assert!(state.consume_dirty());

    let (state, effects) = update(
        state,
        Msg::PhaseStartAccepted {
            key: key(),
            job_id: JobId::from("j1"),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::PollDocumentJob {
            key: key(),
            job_id: JobId::from("j1"),
        }]
    );
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Running));
    assert_eq!(job.job_id, Some(JobId::from("j1")));
}

#[test]
fn completed_poll_keeps_result_and_reloads_listing() {
    init_logging();
    let state = with_site(started("j1"));

    let mut done = snapshot(DocumentJobStatus::Completed);
    done.result = Some(json!({ "bytes": 1000 }));
    let (state, effects) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j1"),
            outcome: Ok(done),
        },
    );

    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Completed));
    assert_eq!(job.result, Some(json!({ "bytes": 1000 })));
    assert!(state.loading().documents);
    assert!(matches!(
        effects.as_slice(),
        [Effect::ReloadDocuments { site_id: 7, query: DocumentQuery { page: 1, .. } }]
    ));

    // A later snapshot without a result leaves the stored one alone.
    let (state, _) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j1"),
            outcome: Ok(snapshot(DocumentJobStatus::Completed)),
        },
    );
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.result, Some(json!({ "bytes": 1000 })));
}

#[test]
fn missing_job_reports_not_found() {
    init_logging();
    let state = started("j9");

    let (state, effects) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j9"),
            outcome: Err(Failure::NotFound),
        },
    );

    assert!(effects.is_empty());
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Error));
    assert_eq!(job.error.as_deref(), Some("job not found or terminated"));
}

#[test]
fn action_without_job_id_sets_error_and_sends_nothing() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::JobActionRequested {
            key: key(),
            job_id: None,
            action: JobAction::Stop,
        },
    );

    assert!(effects.is_empty());
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.error.as_deref(), Some("no operation in progress"));
    assert_eq!(job.requested_action, None);
}

#[test]
fn menu_action_uses_tracked_job_id() {
    init_logging();
    let state = started("j1");

    let (state, effects) = update(
        state,
        Msg::PhaseActionClicked {
            key: key(),
            action: PhaseAction::Job(JobAction::Stop),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::SendJobAction {
            key: key(),
            job_id: JobId::from("j1"),
            action: JobAction::Stop,
        }]
    );
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.requested_action, Some(JobAction::Stop));
}

#[test]
fn resume_swaps_pollers_to_new_job_id() {
    init_logging();
    let state = started("j1");
    let (state, _) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j1"),
            outcome: Ok(snapshot(DocumentJobStatus::Stopped)),
        },
    );

    let (state, effects) = update(
        state,
        Msg::JobActionAccepted {
            key: key(),
            job_id: JobId::from("j1"),
            action: JobAction::Resume,
            new_job_id: Some(JobId::from("j2")),
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::StopPolling {
                job_id: JobId::from("j1"),
            },
            Effect::PollDocumentJob {
                key: key(),
                job_id: JobId::from("j2"),
            },
        ]
    );
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.job_id, Some(JobId::from("j2")));
    assert_eq!(job.status, Some(DocumentJobStatus::Running));
    assert_eq!(job.requested_action, None);
}

#[test]
fn stale_poll_for_replaced_job_is_ignored() {
    init_logging();
    let state = started("j1");
    let (state, _) = update(
        state,
        Msg::JobActionAccepted {
            key: key(),
            job_id: JobId::from("j1"),
            action: JobAction::Resume,
            new_job_id: Some(JobId::from("j2")),
        },
    );

    let (mut state, _) = update(state, Msg::NoOp);
    state.consume_dirty();
    let (mut state, effects) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j1"),
            outcome: Ok(snapshot(DocumentJobStatus::Cancelled)),
        },
    );

    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Running));
}

#[test]
fn stop_acceptance_keeps_requested_action_until_polled() {
    init_logging();
    let state = started("j1");
    let (state, _) = update(
        state,
        Msg::JobActionAccepted {
            key: key(),
            job_id: JobId::from("j1"),
            action: JobAction::Stop,
            new_job_id: None,
        },
    );
    assert_eq!(
        state.document_jobs().get(&key()).and_then(|job| job.requested_action),
        Some(JobAction::Stop)
    );

    let (state, _) = update(
        state,
        Msg::DocumentJobPolled {
            key: key(),
            job_id: JobId::from("j1"),
            outcome: Ok(snapshot(DocumentJobStatus::Stopped)),
        },
    );
    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.status, Some(DocumentJobStatus::Stopped));
    assert_eq!(job.requested_action, None);
}

#[test]
fn rejected_action_clears_request_and_shows_backend_message() {
    init_logging();
    let state = started("j1");
    let (state, _) = update(
        state,
        Msg::JobActionFailed {
            key: key(),
            action: JobAction::Cancel,
            failure: Failure::BackendRejected {
                message: Some("job already finished".to_string()),
            },
        },
    );

    let job = state.document_jobs().get(&key()).expect("entry");
    assert_eq!(job.error.as_deref(), Some("job already finished"));
    assert_eq!(job.requested_action, None);
    assert_eq!(job.status, Some(DocumentJobStatus::Running));
}

#[test]
fn updates_for_one_unit_leave_others_alone() {
    init_logging();
    let other = DocumentPhaseKey::new(42, Phase::Analyze);
    let state = started("j1");
    let (state, _) = update(state, Msg::StartPhaseRequested { key: other });
    let (state, _) = update(
        state,
        Msg::PhaseStartFailed {
            key: other,
            failure: Failure::Network("connection refused".to_string()),
        },
    );

    let first = state.document_jobs().get(&key()).expect("first");
    let second = state.document_jobs().get(&other).expect("second");
    assert_eq!(first.status, Some(DocumentJobStatus::Running));
    assert_eq!(first.error, None);
    assert_eq!(second.status, Some(DocumentJobStatus::Error));
    assert_eq!(second.error.as_deref(), Some("connection refused"));
}

#[test]
fn refreshed_page_prunes_registry() {
    init_logging();
    let state = with_site(started("j1"));
    let finished = DocumentPhaseKey::new(43, Phase::Collect);
    let (state, _) = update(state, Msg::StartPhaseRequested { key: finished });
    let (state, _) = update(
        state,
        Msg::PhaseStartAccepted {
            key: finished,
            job_id: JobId::from("j3"),
        },
    );
    let (state, _) = update(
        state,
        Msg::DocumentJobPolled {
            key: finished,
            job_id: JobId::from("j3"),
            outcome: Ok(snapshot(DocumentJobStatus::Completed)),
        },
    );

    let page = DocumentPage {
        items: vec![DocumentSummary {
            id: 43,
            title: None,
            phases: [("collect".to_string(), "success".to_string().into())]
                .into_iter()
                .collect(),
        }],
        total: 1,
        ..DocumentPage::default()
    };
    let (state, _) = update(state, Msg::DocumentsLoaded { site_id: 7, page });

    // Document 42 is off the page but still running; 43 caught up.
    assert!(state.document_jobs().get(&key()).is_some());
    assert!(state.document_jobs().get(&finished).is_none());
    assert!(!state.loading().documents);
}
