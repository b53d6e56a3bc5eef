//! Health check endpoint

use axum::Json;
use axum::extract::State;
use serde_json::{Map, Value, json};

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let mut domains = Map::new();
    for hub in state.hubs.all() {
        domains.insert(
            hub.topic().to_string(),
            json!({
                "topics": hub.registry().topic_count(),
                "listener": hub.listener_state().name(),
            }),
        );
    }

    Json(json!({
        "status": "ok",
        "service": "crab-realtime",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("GIT_HASH").unwrap_or("dev"),
        "domains": domains,
    }))
}
