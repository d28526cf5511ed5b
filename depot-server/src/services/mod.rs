//! 业务服务层
//!
//! 编排仓储、缓存与审计管道。缓存是建议性的：写失败只记日志，
//! 读失败回源数据库。

pub mod auth_service;
pub mod order_service;

pub use auth_service::AuthService;
pub use order_service::OrderService;
