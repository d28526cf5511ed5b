//! 事务性 Kafka 生产者
//!
//! 每条 outbox 任务对应一条以任务 id 为 key 的记录。生产者配置事务 id，
//! 发送失败会中止事务，保证不会出现半提交。事务边界不覆盖数据库的
//! 状态更新，因此崩溃会导致同 key 重放（at-least-once，下游按 key 去重）。

use std::time::Duration;

use rdkafka::ClientConfig;
use rdkafka::error::KafkaResult;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

/// 单次发送的截止时间
const SEND_TIMEOUT: Duration = Duration::from_secs(2);
/// 事务初始化/提交的截止时间
const TX_TIMEOUT: Duration = Duration::from_secs(5);

/// 审计事件生产者
#[derive(Clone)]
pub struct AuditProducer {
    producer: FutureProducer,
    topic: String,
}

impl AuditProducer {
    pub fn new(brokers: &[String], topic: &str) -> KafkaResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("transactional.id", "audit-producer-v1")
            .set("allow.auto.create.topics", "true")
            .set("message.timeout.ms", "3000")
            .create()?;

        producer.init_transactions(Timeout::After(TX_TIMEOUT))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    /// 事务性发送一条审计记录
    pub async fn send_transactional(&self, task_id: i64, payload: &[u8]) -> anyhow::Result<()> {
        self.producer.begin_transaction()?;

        let key = task_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
        {
            Ok(_) => {
                self.producer
                    .commit_transaction(Timeout::After(TX_TIMEOUT))?;
                Ok(())
            }
            Err((e, _)) => {
                if let Err(abort_err) = self
                    .producer
                    .abort_transaction(Timeout::After(TX_TIMEOUT))
                {
                    tracing::error!(error = %abort_err, "Failed to abort kafka transaction");
                }
                Err(e.into())
            }
        }
    }
}
