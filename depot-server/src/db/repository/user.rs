//! User Repository
//!
//! users 表：email 主键 + 密码哈希。认证流程见 `services/auth_service`。

use sqlx::PgPool;

use super::{RepoError, RepoResult};

/// 注册用户
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub email: String,
    /// argon2 密码哈希
    pub password: String,
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建用户；email 冲突报 Duplicate
    pub async fn create_user(&self, email: &str, password_hash: &str) -> RepoResult<()> {
        sqlx::query("INSERT INTO users (email, password) VALUES ($1, $2)")
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(RepoError::from)?;
        Ok(())
    }

    /// 按 email 查找
    pub async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        let user: Option<UserRecord> =
            sqlx::query_as("SELECT email, password FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}
