//! 审计中间件
//!
//! 请求进入时发 ApiRequest，响应返回后发 ApiResponse。
//! 发送是非阻塞的（管道内部有界等待），不影响请求延迟。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::core::ServerState;
use crate::domain::EventType;

pub async fn audit_middleware(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    state
        .pipeline
        .send_event(
            EventType::ApiRequest,
            serde_json::json!({"method": method, "path": path}),
        )
        .await;

    let response = next.run(req).await;

    state
        .pipeline
        .send_event(
            EventType::ApiResponse,
            serde_json::json!({"status": response.status().as_u16(), "path": path}),
        )
        .await;

    response
}
