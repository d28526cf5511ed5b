//! HTTP 路由和应用构造
//!
//! 每个资源模块暴露自己的 `router()`，在 [`build_app`] 里合并并
//! 挂载中间件。除登录、注册、健康检查外的路由都要求 JWT 认证；
//! 审计中间件对每个请求发出 ApiRequest/ApiResponse 事件。

use axum::Router;
use axum::middleware as axum_middleware;
use http::{HeaderName, HeaderValue};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::core::ServerState;

pub mod actions;
pub mod audit_log;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod reports;

/// 自定义请求 ID 生成器
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// 构建配置完整的应用程序，包含所有中间件和状态
pub fn build_app(state: ServerState) -> Router {
    // 需要认证的路由组
    let protected = Router::new()
        .merge(orders::router())
        .merge(actions::router())
        .merge(reports::router())
        .merge(audit_log::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // 公开路由：注册/登录/健康检查
    let public = Router::new()
        .merge(auth::router())
        .merge(health::router());

    Router::new()
        .merge(protected)
        .merge(public)
        // 审计 - 每个请求的 ApiRequest/ApiResponse 事件
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::audit_middleware,
        ))
        // CORS - 处理跨域请求
        .layer(CorsLayer::permissive())
        // 追踪 - 请求追踪 (INFO 级别日志)
        .layer(TraceLayer::new_for_http())
        // 请求 ID - 为每个请求生成唯一 ID 并传播到响应头
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .with_state(state)
}
