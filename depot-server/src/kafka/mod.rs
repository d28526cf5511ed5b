//! Kafka 接入：审计事件的事务性生产者

pub mod producer;

pub use producer::AuditProducer;
