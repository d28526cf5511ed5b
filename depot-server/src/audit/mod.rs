//! 审计管道
//!
//! 每个状态变更和 API 调用产生一个 [`Event`](crate::domain::Event)，
//! 经 [`Pipeline`] 扇出到两个 worker 池：
//!
//! - db 池 — 落库为 outbox 行（[`OutboxWorker`] 负责转发到 Kafka）
//! - stdout 池 — 经关键字过滤后写入日志
//!
//! 每个池有 `api`/`status` 两条容量 1000 的通道，各由一个批处理
//! worker 消费（批量 5 条或 500ms 刷新）。

pub mod outbox;
pub mod pipeline;
pub mod worker;

pub use outbox::OutboxWorker;
pub use pipeline::{EventFilter, Pipeline, PipelineChannels};
pub use worker::{DbSink, EventSink, StdoutSink, Worker};
