//! HTTP control surface.
//!
//! A thin transport over the store and engine: it deserializes a new
//! schedule (or ring duration), swaps it into the [`ScheduleStore`], and
//! asks the [`BellEngine`] to reload — in that order, within the same
//! request. Routes and response messages match the original web UI's
//! contract.

use crate::config::ServerConfig;
use crate::engine::BellEngine;
use crate::error::{BellError, Result};
use crate::schedule::ScheduleStore;
use crate::trigger::{self, WireTrigger};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<ScheduleStore>,
    engine: Arc<BellEngine>,
    /// Precomputed `Basic` credential value for the admin account.
    basic_credential: String,
}

impl AppState {
    /// Build the handler state with basic-auth credentials from settings.
    pub fn new(store: Arc<ScheduleStore>, engine: Arc<BellEngine>, server: &ServerConfig) -> Self {
        let raw = format!("{}:{}", server.admin_user, server.admin_password);
        Self {
            store,
            engine,
            basic_credential: base64::engine::general_purpose::STANDARD.encode(raw),
        }
    }
}

#[derive(serde::Deserialize)]
struct DurationBody {
    /// String-typed, as the web form submits it.
    duration: String,
}

/// Build the control router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/schedule", get(get_schedule))
        .route("/api/update_spec", post(update_spec))
        .route("/api/update_ring_duration", post(update_ring_duration))
        .with_state(state)
}

/// Bind and serve the control API until the process exits.
pub async fn run_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BellError::Server(format!("cannot bind {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| BellError::Server(e.to_string()))?;

    tracing::info!("control api listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| BellError::Server(e.to_string()))?;
    Ok(())
}

fn basic_auth_is_valid(headers: &HeaderMap, expected: &str) -> bool {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let candidate = header_value.strip_prefix("Basic ").unwrap_or_default();
    !expected.is_empty() && candidate == expected
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"chime\"")],
        Json(serde_json::json!({"message": "unauthorized"})),
    )
        .into_response()
}

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({"message": "pong"}))
}

async fn get_schedule(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !basic_auth_is_valid(&headers, &state.basic_credential) {
        return unauthorized();
    }

    let schedule = state.store.current();
    Json(serde_json::json!({
        "triggers": trigger::encode_wire(&schedule.triggers),
        "ring_duration": schedule.ring_duration,
    }))
    .into_response()
}

async fn update_spec(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(wire): Json<Vec<WireTrigger>>,
) -> impl IntoResponse {
    if !basic_auth_is_valid(&headers, &state.basic_credential) {
        return unauthorized();
    }

    // Malformed entries drop out here; the rest of the submission is
    // applied. Duration is carried over unchanged.
    let triggers = trigger::decode_wire(&wire);
    tracing::info!(
        submitted = wire.len(),
        accepted = triggers.len(),
        "schedule update from control api"
    );

    state.store.replace_triggers(triggers);
    state.engine.reload().await;

    Json(serde_json::json!({"message": "Update successful!"})).into_response()
}

async fn update_ring_duration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DurationBody>,
) -> impl IntoResponse {
    if !basic_auth_is_valid(&headers, &state.basic_credential) {
        return unauthorized();
    }

    let Ok(duration) = body.duration.trim().parse::<u64>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "Update failed!"})),
        )
            .into_response();
    };

    tracing::info!(duration, "ring duration update from control api");

    state.store.replace_duration(duration);
    state.engine.reload().await;

    Json(serde_json::json!({"message": "Update ring duration successful!"})).into_response()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::relay::{Relay, test_pin::RecordingPin};
    use crate::schedule::Schedule;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn test_state(lines: &[&str], ring_duration: u64) -> (AppState, Arc<BellEngine>) {
        let store = Arc::new(ScheduleStore::in_memory(Schedule::from_lines(
            lines,
            ring_duration,
        )));
        let relay = Arc::new(Relay::new(RecordingPin::default()));
        let engine = Arc::new(BellEngine::new(Arc::clone(&store), relay));
        let server = ServerConfig::default();
        (
            AppState::new(Arc::clone(&store), Arc::clone(&engine), &server),
            engine,
        )
    }

    fn admin_credential() -> String {
        base64::engine::general_purpose::STANDARD.encode("admin:password")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_is_open() {
        let (state, _engine) = test_state(&["0 10 * * *"], 5);
        let response = router(state)
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "pong");
    }

    #[tokio::test]
    async fn schedule_requires_auth() {
        let (state, _engine) = test_state(&["0 10 * * *"], 5);
        let router = router(state);

        let response = router
            .clone()
            .oneshot(Request::get("/api/schedule").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = base64::engine::general_purpose::STANDARD.encode("admin:wrong");
        let response = router
            .oneshot(
                Request::get("/api/schedule")
                    .header(header::AUTHORIZATION, format!("Basic {wrong}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn schedule_renders_wire_form() {
        let (state, _engine) = test_state(&["0 10 * * *", "5 7 * * 6"], 5);
        let response = router(state)
            .oneshot(
                Request::get("/api/schedule")
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", admin_credential()),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["ring_duration"], 5);
        assert_eq!(json["triggers"][0]["index"], "00");
        assert_eq!(json["triggers"][0]["hour"], "10");
        assert_eq!(json["triggers"][0]["minute"], "00");
        assert_eq!(json["triggers"][1]["hour"], "07");
        assert_eq!(json["triggers"][1]["minute"], "05");
        assert_eq!(json["triggers"][1]["day"], "Saturday");
    }

    #[tokio::test]
    async fn update_spec_replaces_schedule_and_reloads() {
        let (state, engine) = test_state(&["0 10 * * *", "10 10 * * *"], 5);
        engine.start().await;
        assert_eq!(engine.armed_len().await, 2);

        let body = serde_json::json!([
            {"index": "00", "hour": "14", "minute": "30", "day": "Saturday"}
        ]);
        let response = router(state.clone())
            .oneshot(
                Request::post("/api/update_spec")
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", admin_credential()),
                    )
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Update successful!");

        let schedule = state.store.current();
        assert_eq!(schedule.triggers.len(), 1);
        assert_eq!(schedule.triggers[0].hour, 14);
        assert_eq!(schedule.ring_duration, 5);

        assert_eq!(engine.armed_len().await, 1);
        assert_eq!(engine.generation().await, 2);
    }

    #[tokio::test]
    async fn update_spec_drops_malformed_entries() {
        let (state, engine) = test_state(&[], 5);
        engine.start().await;

        let body = serde_json::json!([
            {"index": "00", "hour": "10", "minute": "00", "day": "All days"},
            {"index": "01", "hour": "10", "minute": "30", "day": "Someday"}
        ]);
        let response = router(state.clone())
            .oneshot(
                Request::post("/api/update_spec")
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", admin_credential()),
                    )
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.current().triggers.len(), 1);
    }

    #[tokio::test]
    async fn update_duration_parses_string_body() {
        let (state, engine) = test_state(&["0 10 * * *"], 5);
        engine.start().await;

        let response = router(state.clone())
            .oneshot(
                Request::post("/api/update_ring_duration")
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", admin_credential()),
                    )
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"duration":"0"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.ring_duration(), 0);
        // Triggers untouched, engine re-armed.
        assert_eq!(state.store.current().triggers.len(), 1);
        assert_eq!(engine.generation().await, 2);
    }

    #[tokio::test]
    async fn update_duration_rejects_non_numeric() {
        let (state, _engine) = test_state(&["0 10 * * *"], 5);

        let response = router(state.clone())
            .oneshot(
                Request::post("/api/update_ring_duration")
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", admin_credential()),
                    )
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"duration":"soon"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.ring_duration(), 5);
    }
}
