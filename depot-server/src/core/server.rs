//! Server Implementation
//!
//! HTTP 服务器启动和 graceful shutdown

use tokio_util::sync::CancellationToken;

use crate::api;
use crate::audit::PipelineChannels;
use crate::core::{Config, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
    channels: Option<PipelineChannels>,
    shutdown: CancellationToken,
}

impl Server {
    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState, channels: PipelineChannels) -> Self {
        Self {
            config,
            state,
            channels: Some(channels),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        // 后台任务（审计 worker、outbox、缓存刷新）先于流量启动
        let channels = self
            .channels
            .take()
            .ok_or_else(|| anyhow::anyhow!("server already started"))?;
        let tasks = self.state.start_background_tasks(channels).await;

        let app = api::build_app(self.state.clone());

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Depot server listening on {}", addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        // HTTP 停止后 drain 后台任务（审计 worker flush 残余批次）
        tasks.shutdown().await;
        Ok(())
    }
}
