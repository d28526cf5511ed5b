//! 审计事件与 outbox 任务
//!
//! 每次状态变更和 API 调用都会生成 [`Event`]，经审计管道落库为
//! [`AuditTask`]（outbox 行），再由 outbox worker 转发到消息总线。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 审计事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    ApiRequest,
    ApiResponse,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::StatusChange => write!(f, "status_change"),
            EventType::ApiRequest => write!(f, "api_request"),
            EventType::ApiResponse => write!(f, "api_response"),
        }
    }
}

/// 审计事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub time: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self {
            event_type,
            data,
            time: Utc::now(),
        }
    }
}

/// outbox 任务状态
///
/// 不变式：
/// - `Finished` ⇒ `finished_at` 非空
/// - `Failed` ⇒ `next_retry_at` > `updated_at`
/// - `Exhausted` ⇔ `attempt_count` ≥ [`MAX_ATTEMPTS`](AuditTask::MAX_ATTEMPTS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Processing,
    Failed,
    Finished,
    Exhausted,
}

impl TaskStatus {
    /// 数据库列中的文本表示
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Exhausted => "EXHAUSTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(TaskStatus::Created),
            "PROCESSING" => Some(TaskStatus::Processing),
            "FAILED" => Some(TaskStatus::Failed),
            "FINISHED" => Some(TaskStatus::Finished),
            "EXHAUSTED" => Some(TaskStatus::Exhausted),
            _ => None,
        }
    }
}

/// outbox 行：待转发到消息总线的已持久化审计记录
#[derive(Debug, Clone)]
pub struct AuditTask {
    /// 单调递增主键（同时作为总线消息的 key）
    pub id: i64,
    /// 序列化后的事件负载
    pub payload: Vec<u8>,
    pub status: TaskStatus,
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl AuditTask {
    /// 总线发送的最大尝试次数
    pub const MAX_ATTEMPTS: i32 = 3;

    /// 发送成功 → 终态 Finished
    pub fn mark_finished(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Finished;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// 发送失败 → Failed 并安排重试；尝试耗尽 → Exhausted
    pub fn mark_failed(&mut self, now: DateTime<Utc>, retry_delay: chrono::Duration) {
        self.attempt_count += 1;
        self.updated_at = now;
        self.next_retry_at = Some(now + retry_delay);
        self.status = if self.attempt_count >= Self::MAX_ATTEMPTS {
            TaskStatus::Exhausted
        } else {
            TaskStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task() -> AuditTask {
        let now = Utc::now();
        AuditTask {
            id: 1,
            payload: b"{}".to_vec(),
            status: TaskStatus::Created,
            attempt_count: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
            next_retry_at: None,
        }
    }

    #[test]
    fn finished_sets_finished_at() {
        let mut t = task();
        let now = Utc::now();
        t.mark_finished(now);
        assert_eq!(t.status, TaskStatus::Finished);
        assert_eq!(t.finished_at, Some(now));
    }

    #[test]
    fn failed_schedules_retry_after_update() {
        let mut t = task();
        let now = Utc::now();
        t.mark_failed(now, Duration::seconds(2));
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.attempt_count, 1);
        assert!(t.next_retry_at.unwrap() > t.updated_at);
    }

    #[test]
    fn third_failure_exhausts() {
        let mut t = task();
        for _ in 0..3 {
            t.mark_failed(Utc::now(), Duration::seconds(2));
        }
        assert_eq!(t.status, TaskStatus::Exhausted);
        assert_eq!(t.attempt_count, AuditTask::MAX_ATTEMPTS);
    }

    #[test]
    fn status_text_round_trips() {
        for status in [
            TaskStatus::Created,
            TaskStatus::Processing,
            TaskStatus::Failed,
            TaskStatus::Finished,
            TaskStatus::Exhausted,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("NO_SUCH"), None);
    }
}
