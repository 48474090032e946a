use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use kinerja::error::AppError;
use kinerja::pipeline::{ImportPayload, LevelMapping, ResolutionMap};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Body of an import call. A paused import is continued by posting the same
/// text again together with `resolutions`.
#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) roster: LevelMapping,
    #[serde(default)]
    pub(crate) organization_levels: LevelMapping,
    #[serde(default)]
    pub(crate) resolutions: ResolutionMap,
    /// Overrides the configured choice for names nobody can place.
    #[serde(default)]
    pub(crate) accept_unmatched_as_new: Option<bool>,
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/performance/import", post(import_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "directory_entries": state.importer.directory().len() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn import_endpoint(
    Extension(state): Extension<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportPayload>, AppError> {
    let ImportRequest {
        text,
        roster,
        organization_levels,
        resolutions,
        accept_unmatched_as_new,
    } = request;
    debug!(
        bytes = text.len(),
        resolutions = resolutions.len(),
        "received performance import"
    );

    // Cloning shares the directory snapshot; only the request mappings are owned.
    let mut importer = state
        .importer
        .as_ref()
        .clone()
        .with_roster(roster)
        .with_organization_levels(organization_levels);
    if let Some(accept) = accept_unmatched_as_new {
        importer = importer.accept_unmatched_as_new(accept);
    }
    let outcome = importer.import_with_resolutions(&text, &resolutions)?;

    Ok(Json(outcome.into_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use kinerja::pipeline::{DirectoryEntry, PerformanceImporter};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    const PASTE: &str = "Penilai\tJabatan\t1. Komunikasi [Budi Santoso]\t2. Integritas [Joko Widodo]\nAtasan\tStaff\t90\tBaik\n";

    fn app(ready: bool) -> axum::Router {
        let importer = PerformanceImporter::new(vec![DirectoryEntry::new(
            "1987",
            "Budi Santoso",
            "Eselon III",
        )]);
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            importer: Arc::new(importer),
        };
        router().layer(Extension(state))
    }

    fn post_import(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/performance/import")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(true)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_waits_for_listener() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["directory_entries"], 1);
    }

    #[tokio::test]
    async fn unknown_names_ask_for_resolution() {
        let response = app(true)
            .oneshot(post_import(json!({ "text": PASTE })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "needs_resolution");
        assert_eq!(body["unresolved_names"], json!(["Joko Widodo"]));
        assert_eq!(
            body["partial_directory_mapping"]["Budi Santoso"],
            "Eselon III"
        );
    }

    #[tokio::test]
    async fn reposting_with_resolutions_completes() {
        let request = post_import(json!({
            "text": PASTE,
            "resolutions": {
                "Joko Widodo": { "kind": "new_employee", "organizational_level": "Staff" }
            }
        }));
        let response = app(true).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["employees"][0]["name"], "Budi Santoso");
        assert_eq!(body["employees"][0]["organizational_level"], "Eselon III");
        assert_eq!(body["employees"][0]["performance"][0]["score"], 85.0);
        assert_eq!(body["employees"][1]["organizational_level"], "Staff");
        assert_eq!(body["validation"]["severity"], "success");
    }

    #[tokio::test]
    async fn roster_overrides_directory_level() {
        let request = post_import(json!({
            "text": PASTE,
            "roster": { "Budi Santoso": "Eselon II" },
            "resolutions": {
                "Joko Widodo": { "kind": "new_employee", "organizational_level": "Staff" }
            }
        }));
        let body = json_body(app(true).oneshot(request).await.expect("response")).await;
        assert_eq!(body["employees"][0]["organizational_level"], "Eselon II");
        assert_eq!(body["employees"][0]["level_source"], "roster");
    }

    #[tokio::test]
    async fn request_can_accept_unknown_names_as_new() {
        let request = post_import(json!({
            "text": PASTE,
            "accept_unmatched_as_new": true
        }));
        let body = json_body(app(true).oneshot(request).await.expect("response")).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["employees"][1]["name"], "Joko Widodo");
        assert_eq!(body["name_matches"][1]["is_new_employee"], true);
    }

    #[tokio::test]
    async fn resolution_to_a_name_outside_the_directory_keeps_waiting() {
        let request = post_import(json!({
            "text": PASTE,
            "resolutions": {
                "Joko Widodo": {
                    "kind": "existing",
                    "directory_name": "Joko Widodo",
                    "organizational_level": "Staff"
                }
            }
        }));
        let body = json_body(app(true).oneshot(request).await.expect("response")).await;
        assert_eq!(body["status"], "needs_resolution");
        assert_eq!(body["unresolved_names"], json!(["Joko Widodo"]));
    }

    #[tokio::test]
    async fn malformed_paste_is_unprocessable() {
        let response = app(true)
            .oneshot(post_import(json!({ "text": "Nama\tNilai\nBudi\t80\n" })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("no employee columns found"));
    }
}
