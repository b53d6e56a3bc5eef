//! Merchant order board socket
//!
//! GET /api/merchant/orders/ws?token=<JWT>
//!
//! Sends the active-order snapshot on connect, then `merchant_orders.state`
//! followed by the legacy `merchant_orders.refresh` on every change.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use http::HeaderMap;
use shared::error::AppError;

use super::{TokenQuery, serve_topic, split_client, wait_for_close};
use crate::auth::{bearer_token, verify_token};
use crate::state::AppState;

pub async fn handle_merchant_orders_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers, query.token.as_deref())?;
    let claims = verify_token(token, &state.jwt_secret)?;
    let merchant_id = claims.merchant_id.to_string();

    Ok(ws.on_upgrade(move |socket| async move {
        let (client, stream) = split_client(socket);
        serve_topic(
            &state.hubs.merchant_orders,
            &merchant_id,
            client,
            wait_for_close(stream),
            &state.shutdown,
            true,
        )
        .await;
    }))
}
