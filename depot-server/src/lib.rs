//! Depot Server - 自提点订单仓储服务
//!
//! # 架构概述
//!
//! 接收包裹入库，保管到收件人取件；48 小时窗口内可退款；
//! 过期未取退回承运方。所有状态变更和 API 调用都会产生审计事件，
//! 经进程内管道落库（outbox）并转发到 Kafka。
//!
//! # 模块结构
//!
//! ```text
//! depot-server/src/
//! ├── core/      # 配置、状态、服务器、后台任务
//! ├── domain/    # 订单生命周期、包装策略、审计事件
//! ├── db/        # PostgreSQL 仓储（行锁批量操作、skip-locked outbox）
//! ├── cache/     # Redis cache-aside 层 + 定时刷新
//! ├── audit/     # 审计管道、批处理 worker、outbox worker
//! ├── kafka/     # 事务性 Kafka 生产者
//! ├── auth/      # JWT 认证、密码哈希
//! ├── services/  # 业务编排
//! ├── api/       # HTTP 路由和处理器
//! └── utils/     # 错误映射、日志
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod core;
pub mod db;
pub mod domain;
pub mod kafka;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use crate::domain::{Order, OrderError, OrderStatus};
pub use crate::utils::logger::{init_logger, init_logger_with_file};
pub use crate::utils::{AppError, AppResult};
