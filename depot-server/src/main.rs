//! Depot Server 二进制入口
//!
//! 此文件负责:
//! - 加载 .env 配置文件
//! - 初始化日志系统
//! - 启动服务器

use depot_server::{Config, Server, ServerState, init_logger_with_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件 (仅 bin 层面支持)
    dotenvy::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(Some(&log_level), log_dir.as_deref());

    tracing::info!("Depot server starting...");

    let config = Config::from_env();

    let (state, channels) = ServerState::initialize(&config).await?;

    let server = Server::with_state(config, state, channels);

    // ctrl_c 触发取消令牌；run() 随后完成 graceful shutdown
    let token = server.shutdown_token();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
        token.cancel();
    });

    let result = server.run().await;
    if let Err(e) = &result {
        tracing::error!("Server error: {}", e);
    }
    result
}
