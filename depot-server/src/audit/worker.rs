//! 审计批处理 worker
//!
//! 从 mpsc 通道消费事件并攒批：批量达到 5 条立即刷新，否则每 500ms
//! 刷新一次。收到 shutdown 信号或通道关闭时，刷掉残余批次再退出。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audit::pipeline::EventFilter;
use crate::db::repository::AuditTaskRepository;
use crate::domain::Event;

/// 触发刷新的批量大小
const BATCH_SIZE: usize = 5;
/// 批量等待上限
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// 事件落地端
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn process(&self, event: &Event) -> anyhow::Result<()>;
}

/// 落库端：事件持久化为 outbox 行
pub struct DbSink {
    repo: AuditTaskRepository,
}

impl DbSink {
    pub fn new(repo: AuditTaskRepository) -> Self {
        Self { repo }
    }
}

#[async_trait::async_trait]
impl EventSink for DbSink {
    async fn process(&self, event: &Event) -> anyhow::Result<()> {
        self.repo.save_log(event).await?;
        Ok(())
    }
}

/// stdout 端：经关键字过滤后写结构化日志
pub struct StdoutSink {
    filter: EventFilter,
}

impl StdoutSink {
    pub fn new(filter: EventFilter) -> Self {
        Self { filter }
    }
}

#[async_trait::async_trait]
impl EventSink for StdoutSink {
    async fn process(&self, event: &Event) -> anyhow::Result<()> {
        if self.filter.matches(event) {
            tracing::info!(
                target: "audit",
                event_type = %event.event_type,
                data = %event.data,
                "[AUDIT]"
            );
        }
        Ok(())
    }
}

/// 批处理 worker（每条通道一个）
pub struct Worker<S: EventSink> {
    sink: Arc<S>,
    worker_type: &'static str,
}

impl<S: EventSink> Worker<S> {
    pub fn new(sink: Arc<S>, worker_type: &'static str) -> Self {
        Self { sink, worker_type }
    }

    /// 消费循环，直到通道关闭或 shutdown
    pub async fn run(self, mut rx: mpsc::Receiver<Event>, shutdown: CancellationToken) {
        let mut batch: Vec<Event> = Vec::with_capacity(BATCH_SIZE);
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            batch.push(event);
                            if batch.len() >= BATCH_SIZE {
                                self.flush(&mut batch).await;
                            }
                        }
                        None => {
                            self.flush(&mut batch).await;
                            tracing::debug!(worker_type = self.worker_type, "Audit channel closed, worker stopping");
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch).await;
                    }
                }
                _ = shutdown.cancelled() => {
                    self.flush(&mut batch).await;
                    tracing::debug!(worker_type = self.worker_type, "Audit worker received shutdown signal");
                    return;
                }
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<Event>) {
        for event in batch.drain(..) {
            if let Err(e) = self.sink.process(&event).await {
                tracing::error!(
                    worker_type = self.worker_type,
                    error = %e,
                    "Failed to process audit event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;
    use std::sync::Mutex;

    struct RecordingSink {
        seen: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl EventSink for RecordingSink {
        async fn process(&self, event: &Event) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn event() -> Event {
        Event::new(EventType::StatusChange, serde_json::json!({"order_id": "o1"}))
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_flushes_immediately() {
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(sink.clone(), "test").run(rx, shutdown.clone()));

        for _ in 0..5 {
            tx.send(event()).await.unwrap();
        }
        // no timer advance needed: size threshold alone triggers the flush
        tokio::task::yield_now().await;
        assert_eq!(sink.count(), 5);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_flushes_after_interval() {
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(sink.clone(), "test").run(rx, shutdown.clone()));

        for _ in 0..3 {
            tx.send(event()).await.unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(sink.count(), 0, "partial batch must wait for the ticker");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(sink.count(), 3);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_residual_batch() {
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(sink.clone(), "test").run(rx, shutdown.clone()));

        tx.send(event()).await.unwrap();
        tx.send(event()).await.unwrap();
        tokio::task::yield_now().await;

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn channel_close_drains_residual_batch() {
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(
            Worker::new(sink.clone(), "test").run(rx, CancellationToken::new()),
        );

        tx.send(event()).await.unwrap();
        drop(tx);
        handle.await.unwrap();
        assert_eq!(sink.count(), 1);
    }
}
