use std::time::Duration;

use dashboard_client::{ApiError, Backend, ClientSettings, HttpBackend};
use dashboard_core::{
    DocumentFilters, DocumentJobStatus, DocumentPhaseKey, DocumentQuery, Failure, HarvestRequest,
    HarvestStatus, JobAction, JobId, Phase, PhaseStatus,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&ClientSettings {
        base_url: format!("{}/api", server.uri()),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
    })
    .expect("backend")
}

#[tokio::test]
async fn start_phase_accepts_numeric_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/42/phase/download/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": 17 })))
        .expect(1)
        .mount(&server)
        .await;

    let job_id = backend(&server)
        .start_document_phase(DocumentPhaseKey::new(42, Phase::Download))
        .await
        .expect("job id");
    assert_eq!(job_id, JobId::from("17"));
}

#[tokio::test]
async fn start_phase_error_payload_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/7/phase/analyze/start"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "already running" })),
        )
        .mount(&server)
        .await;

    let err = backend(&server)
        .start_document_phase(DocumentPhaseKey::new(7, Phase::Analyze))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Rejected("already running".to_string()));
    assert_eq!(
        Failure::from(err).describe("could not start phase"),
        "already running"
    );
}

#[tokio::test]
async fn job_status_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/jobs/j1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "requested_action": "stop",
            "error": null,
            "result": { "pages": 3 }
        })))
        .mount(&server)
        .await;

    let snapshot = backend(&server)
        .document_job_status(&JobId::from("j1"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.status, DocumentJobStatus::Running);
    assert_eq!(snapshot.requested_action, Some(JobAction::Stop));
    assert_eq!(snapshot.result, Some(json!({ "pages": 3 })));
}

#[tokio::test]
async fn any_failed_status_check_means_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/jobs/j9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/harvest/h9"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let err = backend
        .document_job_status(&JobId::from("j9"))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound);
    assert_eq!(Failure::from(err).to_string(), "job not found or terminated");
    assert_eq!(
        backend.harvest_status(&JobId::from("h9")).await.unwrap_err(),
        ApiError::NotFound
    );
}

#[tokio::test]
async fn resume_returns_new_job_id_and_stop_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/jobs/j1/resume"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "j2" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/documents/jobs/j2/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/documents/jobs/j3/cancel"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "finished" })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    assert_eq!(
        backend
            .document_job_action(&JobId::from("j1"), JobAction::Resume)
            .await
            .unwrap(),
        Some(JobId::from("j2"))
    );
    assert_eq!(
        backend
            .document_job_action(&JobId::from("j2"), JobAction::Stop)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        backend
            .document_job_action(&JobId::from("j3"), JobAction::Cancel)
            .await
            .unwrap_err(),
        ApiError::Status {
            status: 409,
            message: Some("finished".to_string()),
        }
    );
}

#[tokio::test]
async fn harvest_request_flattens_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/harvest"))
        .and(body_json(json!({
            "harvester_type": "generic",
            "tasks": ["collect", "download"],
            "url": "https://example.org",
            "max_pages": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "h1" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut form = Map::new();
    form.insert("url".to_string(), json!("https://example.org"));
    form.insert("max_pages".to_string(), json!(5));
    form.insert("tasks".to_string(), json!(["ignored"]));
    let request = HarvestRequest::new("generic", vec![Phase::Collect, Phase::Download], &form);

    let job_id = backend(&server).start_harvest(&request).await.expect("job id");
    assert_eq!(job_id, JobId::from("h1"));
}

#[tokio::test]
async fn harvest_status_keeps_known_phases() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/harvest/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "partial",
            "site_id": 3,
            "phases": {
                "collect": { "status": "completed", "processed": 10, "total": 10 },
                "download": { "status": "running", "processed": 4, "total": 10 }
            },
            "tasks": ["collect", "download"],
            "started_at": "2024-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let snapshot = backend(&server)
        .harvest_status(&JobId::from("h1"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.status, HarvestStatus::Partial);
    assert_eq!(snapshot.site_id, Some(3));
    let phases = snapshot.phases.expect("phases");
    assert_eq!(phases["collect"].status, PhaseStatus::Completed);
    assert_eq!(phases["download"].processed, 4);
}

#[tokio::test]
async fn stop_harvest_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/harvest/h1/stop"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/harvest/h2/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "nope" })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.stop_harvest(&JobId::from("h1")).await.expect("stopped");
    let failure = Failure::from(backend.stop_harvest(&JobId::from("h2")).await.unwrap_err());
    assert_eq!(failure.describe("could not stop harvest"), "nope");
}

#[tokio::test]
async fn export_error_field_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/harvest/h1/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": [1, 2] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/harvest/h2/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "expired" })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    assert_eq!(
        backend.export_harvest(&JobId::from("h1")).await.unwrap(),
        json!({ "documents": [1, 2] })
    );
    assert_eq!(
        backend.export_harvest(&JobId::from("h2")).await.unwrap_err(),
        ApiError::Rejected("expired".to_string())
    );
}

#[tokio::test]
async fn listings_are_decoded_with_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sites": [
                {
                    "id": 1,
                    "name": "JORADP",
                    "base_url": "https://www.joradp.dz",
                    "stats": { "total": 4, "downloaded": 3, "analyzed": 1 },
                    "current_parameters": { "harvester_type": "joradp", "year": 2024 }
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sites/1/documents"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "10"))
        .and(query_param("phase", "analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": 11,
                    "title": "JO 2024-01",
                    "phases": { "collect": "success", "analyze": "queued" }
                }
            ],
            "total": 11,
            "collections": ["2024"]
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let sites = backend.list_sites().await.expect("sites");
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].display_name(), "joradp.dz");
    assert_eq!(sites[0].stats.downloaded, 3);
    assert_eq!(sites[0].stats.analyze_errors, 0);
    let parameters = sites[0].current_parameters.as_ref().expect("recorded parameters");
    assert_eq!(parameters.get("year"), Some(&json!(2024)));

    let query = DocumentQuery {
        page: 2,
        page_size: 10,
        filters: DocumentFilters {
            phase: Some(Phase::Analyze),
            ..DocumentFilters::default()
        },
    };
    let page = backend.list_documents(1, &query).await.expect("documents");
    assert_eq!(page.total, 11);
    assert_eq!(page.page, 2);
    assert_eq!(page.collections, vec!["2024".to_string()]);
    assert_eq!(
        page.items[0].phase_status(Phase::Analyze),
        Some(&PhaseStatus::Queued)
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    let backend = HttpBackend::new(&ClientSettings {
        base_url: "http://127.0.0.1:9/api".to_string(),
        connect_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(1),
    })
    .expect("backend");

    let err = backend.list_sites().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_) | ApiError::Timeout(_)));
    assert!(matches!(Failure::from(err), Failure::Network(_)));
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = HttpBackend::new(&ClientSettings {
        base_url: "not a url".to_string(),
        ..ClientSettings::default()
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidUrl(_)));
}
