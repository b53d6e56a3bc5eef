//! Customer-facing display socket
//!
//! GET /api/customer-display/ws?token=<JWT>
//!
//! Nothing is sent until the merchant's display state first changes.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use http::HeaderMap;
use shared::error::AppError;

use super::{TokenQuery, serve_topic, split_client, wait_for_close};
use crate::auth::{bearer_token, verify_token};
use crate::state::AppState;

pub async fn handle_customer_display_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers, query.token.as_deref())?;
    let merchant_id = verify_token(token, &state.jwt_secret)?.merchant_id.to_string();

    Ok(ws.on_upgrade(move |socket| async move {
        let (client, stream) = split_client(socket);
        serve_topic(
            &state.hubs.customer_display,
            &merchant_id,
            client,
            wait_for_close(stream),
            &state.shutdown,
            false,
        )
        .await;
    }))
}
