//! API routes for crab-realtime

pub mod health;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let sockets = Router::new()
        .route(
            "/api/merchant/orders/ws",
            get(ws::merchant_orders::handle_merchant_orders_ws),
        )
        .route(
            "/api/customer-display/ws",
            get(ws::customer_display::handle_customer_display_ws),
        )
        .route(
            "/api/public/orders/ws",
            get(ws::public_order::handle_public_order_ws),
        )
        .route(
            "/api/group-orders/ws",
            get(ws::group_order::handle_group_order_ws),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(sockets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
