//! 认证服务
//!
//! 注册与登录。密码以 argon2 哈希入库，登录成功签发 24 小时 JWT。

use std::sync::Arc;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::JwtService;
use crate::db::repository::{RepoError, UserRepository};
use crate::utils::AppError;

/// 认证服务
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    jwt: Arc<JwtService>,
}

impl AuthService {
    pub fn new(users: UserRepository, jwt: Arc<JwtService>) -> Self {
        Self { users, jwt }
    }

    /// 注册新用户
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AppError> {
        if password.is_empty() {
            return Err(AppError::Validation("password must not be empty".into()));
        }

        let existing = self
            .users
            .get_user_by_email(email)
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(AppError::UserAlreadyExists);
        }

        let hash = hash_password(password)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

        match self.users.create_user(email, &hash).await {
            Ok(()) => Ok(()),
            Err(RepoError::Duplicate(_)) => Err(AppError::UserAlreadyExists),
            Err(e) => Err(db_error(e)),
        }
    }

    /// 登录；成功返回签发的令牌
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .users
            .get_user_by_email(email)
            .await
            .map_err(db_error)?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password) {
            return Err(AppError::InvalidCredentials);
        }

        self.jwt
            .generate_token(email)
            .map_err(|e| AppError::Internal(format!("token generation failed: {e}")))
    }
}

fn db_error(err: RepoError) -> AppError {
    AppError::Database(err.to_string())
}
