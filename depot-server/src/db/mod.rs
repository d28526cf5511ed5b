//! 数据库层
//!
//! PostgreSQL 连接池构建 + 内嵌迁移。仓储实现见 [`repository`]。

pub mod repository;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// 建立连接池并执行迁移
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database connected and migrations applied");
    Ok(pool)
}
