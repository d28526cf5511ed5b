//! 审计事件扇出
//!
//! [`Pipeline::send_event`] 把事件分发到 db 池和 stdout 池的对应通道。
//! 通道饱和时用有界 `send_timeout` 等待（100ms），超时丢弃并告警：
//! 不阻塞请求路径，也不产生无界的派发任务。调用方永远不会收到错误。

use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::{Event, EventType};

/// 每条通道的容量
const CHANNEL_CAPACITY: usize = 1000;
/// 通道饱和时的有界等待
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// stdout 池的关键字过滤器
///
/// 命中规则：data 顶层对象的任意键、或任意字符串值，包含关键字
/// （区分大小写的子串匹配）。空关键字放行全部事件。
#[derive(Debug, Clone)]
pub struct EventFilter {
    keyword: String,
}

impl EventFilter {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if self.keyword.is_empty() {
            return true;
        }
        let Some(map) = event.data.as_object() else {
            return false;
        };
        map.iter().any(|(key, value)| {
            key.contains(&self.keyword)
                || value
                    .as_str()
                    .is_some_and(|s| s.contains(&self.keyword))
        })
    }
}

/// 一个 worker 池的发送端（api + status 两条通道）
pub struct PoolSenders {
    status_tx: mpsc::Sender<Event>,
    api_tx: mpsc::Sender<Event>,
}

/// 池的接收端，交给 worker 消费
pub struct PoolChannels {
    pub status_rx: mpsc::Receiver<Event>,
    pub api_rx: mpsc::Receiver<Event>,
}

fn pool() -> (PoolSenders, PoolChannels) {
    let (status_tx, status_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (api_tx, api_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        PoolSenders { status_tx, api_tx },
        PoolChannels { status_rx, api_rx },
    )
}

/// 全部四条通道的接收端
pub struct PipelineChannels {
    pub db: PoolChannels,
    pub stdout: PoolChannels,
}

/// 审计管道（进程内单例）
pub struct Pipeline {
    db: PoolSenders,
    stdout: PoolSenders,
}

impl Pipeline {
    pub fn new() -> (Self, PipelineChannels) {
        let (db_tx, db_rx) = pool();
        let (stdout_tx, stdout_rx) = pool();
        (
            Self {
                db: db_tx,
                stdout: stdout_tx,
            },
            PipelineChannels {
                db: db_rx,
                stdout: stdout_rx,
            },
        )
    }

    /// 构造事件并分发到两个池
    ///
    /// 永不向调用方返回错误：饱和超时与通道关闭都只记日志。
    pub async fn send_event(&self, event_type: EventType, data: serde_json::Value) {
        let event = Event::new(event_type, data);
        self.dispatch(&self.db, &event).await;
        self.dispatch(&self.stdout, &event).await;
    }

    async fn dispatch(&self, pool: &PoolSenders, event: &Event) {
        let tx = match event.event_type {
            EventType::StatusChange => &pool.status_tx,
            EventType::ApiRequest | EventType::ApiResponse => &pool.api_tx,
        };
        if let Err(e) = tx.send_timeout(event.clone(), SEND_TIMEOUT).await {
            tracing::warn!(
                event_type = %event.event_type,
                error = %e,
                "Audit event dropped (channel saturated or closed)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: serde_json::Value) -> Event {
        Event::new(EventType::ApiRequest, data)
    }

    #[test]
    fn empty_filter_admits_everything() {
        let filter = EventFilter::new("");
        assert!(filter.matches(&event(serde_json::json!({"path": "/orders"}))));
        assert!(filter.matches(&event(serde_json::json!(null))));
    }

    #[test]
    fn filter_matches_substring_of_value() {
        let filter = EventFilter::new("orders");
        assert!(filter.matches(&event(serde_json::json!({"path": "/reports/u1/orders"}))));
        assert!(!filter.matches(&event(serde_json::json!({"path": "/health"}))));
    }

    #[test]
    fn filter_matches_key_names_too() {
        let filter = EventFilter::new("order_id");
        assert!(filter.matches(&event(serde_json::json!({"order_id": "x"}))));
    }

    #[test]
    fn filter_is_case_sensitive() {
        let filter = EventFilter::new("Orders");
        assert!(!filter.matches(&event(serde_json::json!({"path": "/orders"}))));
    }

    #[test]
    fn non_string_values_do_not_match() {
        let filter = EventFilter::new("200");
        assert!(!filter.matches(&event(serde_json::json!({"status": 200}))));
        assert!(filter.matches(&event(serde_json::json!({"status": "200"}))));
    }

    #[tokio::test]
    async fn events_route_by_type() {
        let (pipeline, mut channels) = Pipeline::new();

        pipeline
            .send_event(EventType::StatusChange, serde_json::json!({"id": "o1"}))
            .await;
        pipeline
            .send_event(EventType::ApiRequest, serde_json::json!({"path": "/x"}))
            .await;

        let status_event = channels.db.status_rx.try_recv().unwrap();
        assert_eq!(status_event.event_type, EventType::StatusChange);
        let api_event = channels.db.api_rx.try_recv().unwrap();
        assert_eq!(api_event.event_type, EventType::ApiRequest);

        // stdout 池收到同一份事件
        assert!(channels.stdout.status_rx.try_recv().is_ok());
        assert!(channels.stdout.api_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_channel_drops_instead_of_blocking() {
        let (pipeline, channels) = Pipeline::new();
        // 接收端保活但不消费
        let _held = channels;

        for _ in 0..1001 {
            pipeline
                .send_event(EventType::ApiRequest, serde_json::json!({"path": "/x"}))
                .await;
        }
        // 到这里没有死锁就算通过：第 1001 条在 100ms 超时后被丢弃
    }
}
