//! Issue/Refund Actions Module

mod handler;

use axum::{Router, routing::put};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/actions/issues_refunds", put(handler::issue_refund_orders))
}
