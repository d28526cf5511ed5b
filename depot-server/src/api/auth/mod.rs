//! Auth API Module (public routes)

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/users/signup", post(handler::signup))
        .route("/users/login", post(handler::login))
}
