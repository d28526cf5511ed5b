//! Order API Module

mod handler;

use axum::{
    Router,
    routing::{delete, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders", post(handler::accept_order))
        .route("/orders/{id}/return", delete(handler::return_order))
}
