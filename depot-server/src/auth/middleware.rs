//! 认证中间件
//!
//! 保护路由组的 JWT 校验。令牌来源：`jwt` cookie，或 `Authorization: Bearer`。
//! 登录、注册、健康检查路由不经过该中间件。

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::core::ServerState;
use crate::utils::AppError;

/// JWT 校验中间件
pub async fn require_auth(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req).ok_or(AppError::Unauthorized)?;

    let claims = state
        .jwt_service
        .validate_token(&token)
        .map_err(|_| AppError::InvalidToken)?;

    tracing::debug!(user = %claims.email, "Authenticated request");
    Ok(next.run(req).await)
}

/// 从 cookie 或 Authorization 头提取令牌
fn extract_token(req: &Request) -> Option<String> {
    if let Some(cookie_header) = req.headers().get(header::COOKIE) {
        if let Ok(cookies) = cookie_header.to_str() {
            for pair in cookies.split(';') {
                if let Some(value) = pair.trim().strip_prefix("jwt=") {
                    return Some(value.to_string());
                }
            }
        }
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: header::HeaderName, value: &str) -> Request {
        axum::http::Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn token_from_cookie() {
        let req = request_with_header(header::COOKIE, "theme=dark; jwt=abc.def.ghi");
        assert_eq!(extract_token(&req), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn token_from_bearer_header() {
        let req = request_with_header(header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(extract_token(&req), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn missing_token() {
        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_token(&req), None);
    }
}
