//! HTTP surface of the orchestrator: job submission and the read path the
//! frontend polls.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::error::SubmitError;
use crate::job::IngestionJobRequest;
use crate::orchestrator::Orchestrator;

/// Shared state for the orchestrator HTTP surface.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/{job_id}", get(get_job_status))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on the given address.
pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("orchestrator API listening on {}:{}", host, port);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "workflow-orchestrator" }))
}

async fn submit_job(
    State(state): State<ApiState>,
    Json(request): Json<IngestionJobRequest>,
) -> (StatusCode, Json<Value>) {
    let job_id = request.job_id.clone();
    match state.orchestrator.submit_job(request).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": job_id, "status": "queued" })),
        ),
        Err(SubmitError::DuplicateJob(id)) => (
            StatusCode::CONFLICT,
            Json(json!({ "detail": format!("job {id} already exists") })),
        ),
        Err(e) => {
            tracing::error!(job_id = %job_id, "submission failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "submission failed" })),
            )
        }
    }
}

async fn get_job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.orchestrator.get_job(&job_id).await {
        Ok(Some(job)) => match serde_json::to_value(&job) {
            Ok(doc) => (StatusCode::OK, Json(doc)),
            Err(e) => {
                tracing::error!(job_id = %job_id, "state could not be encoded: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "state could not be encoded" })),
                )
            }
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Job not found" })),
        ),
        Err(e) => {
            tracing::error!(job_id = %job_id, "state could not be loaded: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "state could not be loaded" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::broker::MemoryBroker;
    use crate::config::Settings;

    fn test_state() -> ApiState {
        let mut settings = Settings::default();
        settings.workers.validation.timeout = Duration::from_millis(50);
        let broker = MemoryBroker::new();
        ApiState {
            orchestrator: Arc::new(Orchestrator::new(broker, &settings)),
        }
    }

    fn submit_body(job_id: &str) -> Body {
        Body::from(
            serde_json::to_vec(&serde_json::json!({
                "job_id": job_id,
                "file_path": "/tmp/x.pdf",
                "content_type": "application/pdf",
                "checksum_sha256": "a".repeat(64),
                "submitted_by": "tester",
            }))
            .unwrap(),
        )
    }

    fn post_jobs(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let router = router(test_state());
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_returns_accepted_then_conflict() {
        let state = test_state();

        let resp = router(state.clone())
            .oneshot(post_jobs(submit_body("j2")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let resp = router(state)
            .oneshot(post_jobs(submit_body("j2")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let router = router(test_state());
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/jobs/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submitted_job_is_readable() {
        let state = test_state();

        let resp = router(state.clone())
            .oneshot(post_jobs(submit_body("j3")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let resp = router(state)
            .oneshot(
                Request::builder()
                    .uri("/jobs/j3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["job_id"], serde_json::json!("j3"));
    }
}
