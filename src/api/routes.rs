//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{course}", get(course_state))
        .route("/courses/{course}/log", get(course_log))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "data": data,
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

fn error_envelope(error: impl std::fmt::Display) -> Json<Value> {
    Json(json!({
        "data": null,
        "meta": { "error": error.to_string() }
    }))
}

async fn health() -> Json<Value> {
    envelope(json!({ "status": "ok" }))
}

async fn list_courses(State(state): State<AppState>) -> Json<Value> {
    match state.store.courses() {
        Ok(courses) => envelope(json!({ "courses": courses })),
        Err(e) => error_envelope(e),
    }
}

async fn course_state(
    State(state): State<AppState>,
    Path(course): Path<String>,
) -> Json<Value> {
    let snapshot = (|| -> Result<Value, crate::storage::StoreError> {
        let schedule = state.store.schedule(&course)?;
        let priority = state.store.priority_list(&course)?;
        let sessions = state.store.sessions(&course)?;
        let ledger =
            crate::storage::ledger::AttemptLedger::new(state.store.pool().clone(), course.clone());
        Ok(json!({
            "course": course,
            "schedule": schedule,
            "priority": priority,
            "sessions": sessions,
            "attempts": {
                "count": ledger.get()?,
                "max_attempts": state.store.max_attempts(&course)?,
            },
        }))
    })();

    match snapshot {
        Ok(data) => envelope(data),
        Err(e) => error_envelope(e),
    }
}

#[derive(Deserialize)]
struct LogQuery {
    limit: Option<usize>,
}

async fn course_log(
    State(state): State<AppState>,
    Path(course): Path<String>,
    Query(query): Query<LogQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(50);
    match state.status.recent(Some(&course), limit) {
        Ok(entries) => match serde_json::to_value(entries) {
            Ok(entries) => envelope(json!({ "entries": entries })),
            Err(e) => error_envelope(e),
        },
        Err(e) => error_envelope(e),
    }
}
