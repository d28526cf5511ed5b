//! 领域模型
//!
//! 订单生命周期、包装策略、审计事件的核心类型定义。
//! 该层不依赖数据库和传输层，保持纯函数语义。

pub mod audit;
pub mod order;
pub mod packaging;

pub use audit::{AuditTask, Event, EventType, TaskStatus};
pub use order::{Order, OrderError, OrderStatus, ProcessedOrders};
pub use packaging::{PackagingStrategy, parse_packaging};
