//! 审计消费者
//!
//! 订阅审计主题并打印每条记录。read-committed 隔离级别：
//! 只消费生产者已提交的事务消息。记录以 outbox 任务 id 为 key，
//! 崩溃重放会产生同 key 的重复记录，下游据此去重。

use rdkafka::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(
            env_or("LOG_LEVEL", "info")
                .parse()
                .unwrap_or(tracing::Level::INFO),
        )
        .with_target(false)
        .init();

    let brokers = env_or("KAFKA_BROKERS", "localhost:9092");
    let group = env_or("KAFKA_CONSUMER_GROUP", "audit-consumer");
    let topic = env_or("KAFKA_TOPIC", "audit_logs");

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group)
        .set("isolation.level", "read_committed")
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "latest")
        .set("session.timeout.ms", "30000")
        .set("heartbeat.interval.ms", "5000")
        .create()?;

    consumer.subscribe(&[topic.as_str()])?;
    tracing::info!(brokers = %brokers, group = %group, topic = %topic, "Audit consumer started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Audit consumer stopping");
                return Ok(());
            }
            message = consumer.recv() => {
                match message {
                    Ok(record) => {
                        let key = record
                            .key()
                            .map(String::from_utf8_lossy)
                            .unwrap_or_default();
                        let value = record
                            .payload()
                            .map(String::from_utf8_lossy)
                            .unwrap_or_default();
                        tracing::info!(
                            topic = record.topic(),
                            partition = record.partition(),
                            offset = record.offset(),
                            key = %key,
                            value = %value,
                            "[KAFKA AUDIT]"
                        );
                        if let Err(e) = consumer.commit_message(&record, CommitMode::Async) {
                            tracing::error!(error = %e, "Failed to commit offset");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Fetch error");
                    }
                }
            }
        }
    }
}
