//! JWT 令牌服务
//!
//! HS256 签名，claim 为用户 email，有效期 24 小时。
//! 令牌通过 `jwt` cookie 下发，中间件同时接受 Bearer 头。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 令牌有效期（小时）
pub const TOKEN_EXPIRATION_HOURS: i64 = 24;

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 email
    pub email: String,
    /// 过期时间戳
    pub exp: i64,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),
}

/// JWT 令牌服务
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService").finish_non_exhaustive()
    }
}

impl JwtService {
    /// 从环境变量 `JWT_SECRET` 创建；未设置时使用固定开发密钥
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using fixed development key");
            "depot-server-development-secret-key!".to_string()
        });
        Self::with_secret(&secret)
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// 为用户签发令牌
    pub fn generate_token(&self, email: &str) -> Result<String, JwtError> {
        let expiration = Utc::now() + Duration::hours(TOKEN_EXPIRATION_HOURS);
        let claims = Claims {
            email: email.to_string(),
            exp: expiration.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                _ => JwtError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let service = JwtService::with_secret("unit-test-secret-at-least-32-bytes!");
        let token = service.generate_token("user@example.com").unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.email, "user@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn foreign_signature_rejected() {
        let issuer = JwtService::with_secret("unit-test-secret-at-least-32-bytes!");
        let verifier = JwtService::with_secret("another-secret-entirely-32-bytes!!");
        let token = issuer.generate_token("user@example.com").unwrap();
        assert!(verifier.validate_token(&token).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        let service = JwtService::with_secret("unit-test-secret-at-least-32-bytes!");
        assert!(matches!(
            service.validate_token("not.a.token"),
            Err(JwtError::InvalidToken(_))
        ));
    }
}
