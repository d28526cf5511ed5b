//! Report API Module
//!
//! Keyset-paginated database reads plus the cache-first views.

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/reports/refunded", get(handler::get_refunded_orders))
        .route("/reports/history", get(handler::get_order_history))
        .route("/reports/history/v2", get(handler::get_order_history_v2))
        .route("/reports/active", get(handler::get_all_active_orders))
        .route("/reports/{user_id}/orders", get(handler::get_user_orders))
        .route(
            "/reports/{user_id}/orders/active",
            get(handler::get_user_active_orders),
        )
}
