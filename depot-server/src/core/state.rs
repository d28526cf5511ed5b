//! 服务器状态 - 组合根
//!
//! `ServerState` 持有全部进程级单例（连接池、缓存客户端、审计管道、
//! JWT 服务），依赖一律按参数传递，不使用模块级可变状态。
//!
//! | 字段 | 说明 |
//! |------|------|
//! | config | 配置项（不可变） |
//! | pool | PostgreSQL 连接池 |
//! | cache | Redis 客户端 |
//! | jwt_service | JWT 认证服务 |
//! | pipeline | 审计事件管道 |
//! | order_service / auth_service | 业务服务 |
//! | audit_tasks | outbox 仓储 |
//! | producer | 事务性 Kafka 生产者 |

use std::sync::Arc;

use sqlx::PgPool;

use crate::audit::{
    DbSink, OutboxWorker, Pipeline, PipelineChannels, StdoutSink, Worker,
};
use crate::audit::pipeline::EventFilter;
use crate::auth::JwtService;
use crate::cache::{CacheRefresher, OrderCache};
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db;
use crate::db::repository::{
    AuditTaskRepository, OrderRepository, ReportRepository, UserOrderRepository, UserRepository,
};
use crate::kafka::AuditProducer;
use crate::services::{AuthService, OrderService};

/// 服务器状态 - 持有所有服务的单例引用
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: PgPool,
    pub cache: OrderCache,
    pub jwt_service: Arc<JwtService>,
    pub pipeline: Arc<Pipeline>,
    pub order_service: OrderService,
    pub auth_service: AuthService,
    pub audit_tasks: AuditTaskRepository,
    pub producer: AuditProducer,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序：数据库（含迁移）→ 缓存 → Kafka 生产者 → 审计管道 → 服务。
    /// 返回的 [`PipelineChannels`] 交给 [`start_background_tasks`](Self::start_background_tasks)。
    pub async fn initialize(config: &Config) -> anyhow::Result<(Self, PipelineChannels)> {
        let pool = db::connect(&config.database_url).await?;

        let cache = OrderCache::connect(&config.cache_connection_url())
            .await
            .map_err(|e| anyhow::anyhow!("redis connection failed: {e}"))?;

        let producer = AuditProducer::new(&config.kafka_brokers, &config.kafka_topic)
            .map_err(|e| anyhow::anyhow!("kafka producer init failed: {e}"))?;

        let (pipeline, channels) = Pipeline::new();
        let pipeline = Arc::new(pipeline);

        let jwt_service = Arc::new(JwtService::from_env());

        let orders = OrderRepository::new(pool.clone());
        let user_orders = UserOrderRepository::new(pool.clone());
        let reports = ReportRepository::new(pool.clone());
        let users = UserRepository::new(pool.clone());
        let audit_tasks = AuditTaskRepository::new(pool.clone());

        let order_service = OrderService::new(
            orders,
            user_orders,
            reports,
            cache.clone(),
            pipeline.clone(),
        );
        let auth_service = AuthService::new(users, jwt_service.clone());

        let state = Self {
            config: config.clone(),
            pool,
            cache,
            jwt_service,
            pipeline,
            order_service,
            auth_service,
            audit_tasks,
            producer,
        };
        Ok((state, channels))
    }

    /// 启动后台任务
    ///
    /// - **Warmup**: 缓存预热（索引集合 + 订单 blob）
    /// - **Worker**: 审计 worker ×4（db/stdout 池 × api/status 通道）、outbox worker
    /// - **Periodic**: 缓存刷新器（在架 5 分钟 / 历史 30 分钟）
    pub async fn start_background_tasks(&self, channels: PipelineChannels) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        // ═══ Warmup：流量进入前灌满读路径 ═══
        let refresher = self.new_refresher();
        refresher.warmup().await;

        // ═══ 审计 worker 池 ═══
        let db_sink = Arc::new(DbSink::new(self.audit_tasks.clone()));
        let stdout_sink = Arc::new(StdoutSink::new(EventFilter::new(
            self.config.audit_filter.clone(),
        )));

        let token = tasks.shutdown_token();
        let worker = Worker::new(db_sink.clone(), "db_status");
        tasks.spawn("audit_db_status", TaskKind::Worker, async move {
            worker.run(channels.db.status_rx, token).await;
        });

        let token = tasks.shutdown_token();
        let worker = Worker::new(db_sink, "db_api");
        tasks.spawn("audit_db_api", TaskKind::Worker, async move {
            worker.run(channels.db.api_rx, token).await;
        });

        let token = tasks.shutdown_token();
        let worker = Worker::new(stdout_sink.clone(), "stdout_status");
        tasks.spawn("audit_stdout_status", TaskKind::Worker, async move {
            worker.run(channels.stdout.status_rx, token).await;
        });

        let token = tasks.shutdown_token();
        let worker = Worker::new(stdout_sink, "stdout_api");
        tasks.spawn("audit_stdout_api", TaskKind::Worker, async move {
            worker.run(channels.stdout.api_rx, token).await;
        });

        // ═══ Outbox worker：审计行 → Kafka ═══
        let outbox = OutboxWorker::new(self.audit_tasks.clone(), self.producer.clone());
        let token = tasks.shutdown_token();
        tasks.spawn("outbox_worker", TaskKind::Worker, async move {
            outbox.run(token).await;
        });

        // ═══ 缓存刷新器 ═══
        let refresher = self.new_refresher();
        let token = tasks.shutdown_token();
        tasks.spawn("cache_refresher", TaskKind::Periodic, async move {
            refresher.run(token).await;
        });

        tasks.log_summary();
        tasks
    }

    fn new_refresher(&self) -> CacheRefresher {
        CacheRefresher::new(
            self.cache.clone(),
            OrderRepository::new(self.pool.clone()),
            ReportRepository::new(self.pool.clone()),
        )
    }
}
