//! Outbox worker
//!
//! 每 500ms 认领一批待发送的审计任务并转发到 Kafka：
//!
//! 1. 短事务内 `FOR UPDATE SKIP LOCKED` 取最多 100 行并提交
//!    （提交释放行锁，任务集留在内存里继续处理）。
//! 2. 逐个任务：标记 Processing → 2s 截止时间内事务性发送 →
//!    成功 Finished / 失败 Failed（2s 后重试，第 3 次失败 Exhausted）。
//!
//! 总线事务不覆盖数据库更新：发送成功后崩溃会以同 key 重放。

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::db::repository::AuditTaskRepository;
use crate::domain::AuditTask;
use crate::kafka::AuditProducer;

/// 拉取周期
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// 单批任务上限
const BATCH_SIZE: i64 = 100;
/// 失败重试间隔
const RETRY_DELAY: chrono::Duration = chrono::Duration::seconds(2);
/// 单次总线发送截止时间
const BUS_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbox worker
pub struct OutboxWorker {
    repo: AuditTaskRepository,
    producer: AuditProducer,
}

impl OutboxWorker {
    pub fn new(repo: AuditTaskRepository, producer: AuditProducer) -> Self {
        Self { repo, producer }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Outbox worker started");
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Outbox worker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.process_batch(&shutdown).await;
                }
            }
        }
    }

    async fn process_batch(&self, shutdown: &CancellationToken) {
        let tasks = match self.claim_pending().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim outbox tasks");
                return;
            }
        };

        for task in tasks {
            if shutdown.is_cancelled() {
                return;
            }
            if let Err(e) = self.process_task(task).await {
                tracing::error!(error = %e, "Failed to process outbox task");
            }
        }
    }

    /// 事务内 skip-locked 认领一批任务，提交后返回
    async fn claim_pending(&self) -> anyhow::Result<Vec<AuditTask>> {
        let mut tx = self.repo.pool().begin().await?;
        let tasks = self.repo.fetch_pending_tasks(&mut tx, BATCH_SIZE).await?;
        tx.commit().await?;
        Ok(tasks)
    }

    async fn process_task(&self, mut task: AuditTask) -> anyhow::Result<()> {
        let now = Utc::now();
        task.status = crate::domain::TaskStatus::Processing;
        task.updated_at = now;
        self.repo.update_task(&task).await?;

        let send = tokio::time::timeout(
            BUS_SEND_TIMEOUT,
            self.producer.send_transactional(task.id, &task.payload),
        )
        .await;

        let now = Utc::now();
        match send {
            Ok(Ok(())) => {
                task.mark_finished(now);
            }
            Ok(Err(e)) => {
                tracing::warn!(task_id = task.id, error = %e, "Bus send failed");
                task.mark_failed(now, RETRY_DELAY);
            }
            Err(_) => {
                tracing::warn!(task_id = task.id, "Bus send timed out");
                task.mark_failed(now, RETRY_DELAY);
            }
        }
        self.repo.update_task(&task).await?;
        Ok(())
    }
}
