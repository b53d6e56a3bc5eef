//! Public order tracking socket
//!
//! GET /api/public/orders/ws?order=<order number>&token=<tracking token>

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};

use super::{serve_topic, split_client, wait_for_close};
use crate::db::public_order::{TrackingCheck, verify_tracking_token};
use crate::error::ServiceError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrackingQuery {
    order: String,
    token: String,
}

pub async fn handle_public_order_ws(
    State(state): State<AppState>,
    Query(query): Query<TrackingQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ServiceError> {
    let order = query.order.trim().to_string();
    if order.is_empty() {
        return Err(AppError::with_message(ErrorCode::TopicKeyInvalid, "order number is empty").into());
    }

    match verify_tracking_token(&state.pool, &order, query.token.trim()).await? {
        TrackingCheck::Valid => {}
        TrackingCheck::Mismatch => return Err(AppError::new(ErrorCode::TrackingTokenInvalid).into()),
        TrackingCheck::UnknownOrder => return Err(AppError::new(ErrorCode::OrderNotFound).into()),
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let (client, stream) = split_client(socket);
        serve_topic(
            &state.hubs.public_order,
            &order,
            client,
            wait_for_close(stream),
            &state.shutdown,
            true,
        )
        .await;
    }))
}
