//! 订单模型
//!
//! 订单状态由三个可空时间戳推导：最新的非空时间戳即为当前状态。
//! `stored_at` 在订单存在时必定非空；`refunded_at` 非空表示终态。

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 退款窗口：自发放时刻起 48 小时
pub const REFUND_WINDOW_HOURS: i64 = 48;

/// 订单状态（由时间戳推导，不单独持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Stored,
    Issued,
    Refunded,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Stored => write!(f, "stored"),
            OrderStatus::Issued => write!(f, "issued"),
            OrderStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// 仓储订单
///
/// 序列化时附带派生的 `status` 字段（反序列化忽略，始终以时间戳为准）。
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    /// 业务 ID（调用方提供，全局唯一）
    pub id: String,
    /// 收件人 ID
    pub recipient_id: String,
    /// 存储截止时间（UTC，日期 + 24h 语义）
    pub expiry: DateTime<Utc>,
    /// 入库时间
    pub stored_at: Option<DateTime<Utc>>,
    /// 发放时间
    pub issued_at: Option<DateTime<Utc>>,
    /// 退款时间（终态）
    pub refunded_at: Option<DateTime<Utc>>,
    /// 商品价格
    pub base_price: Decimal,
    /// 重量（kg）
    pub weight: Decimal,
    /// 包装标签（如 "bag"、"box+film"）
    pub packaging: String,
    /// 包装附加费（由包装策略推导）
    pub package_price: Decimal,
}

impl Order {
    /// 当前状态 = 最新非空时间戳的标签
    pub fn status(&self) -> OrderStatus {
        if self.refunded_at.is_some() {
            OrderStatus::Refunded
        } else if self.issued_at.is_some() {
            OrderStatus::Issued
        } else {
            OrderStatus::Stored
        }
    }

    /// 最近一次状态变更时间（历史报表的复合游标使用）
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.refunded_at
            .or(self.issued_at)
            .or(self.stored_at)
            .unwrap_or(self.expiry)
    }

    /// 发放后是否仍在退款窗口内
    pub fn within_refund_window(&self, now: DateTime<Utc>) -> bool {
        match self.issued_at {
            Some(issued) => now - issued <= Duration::hours(REFUND_WINDOW_HOURS),
            None => false,
        }
    }
}

impl Serialize for Order {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("Order", 11)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("recipient_id", &self.recipient_id)?;
        s.serialize_field("expiry", &self.expiry)?;
        s.serialize_field("status", &self.status())?;
        s.serialize_field("stored_at", &self.stored_at)?;
        s.serialize_field("issued_at", &self.issued_at)?;
        s.serialize_field("refunded_at", &self.refunded_at)?;
        s.serialize_field("base_price", &self.base_price)?;
        s.serialize_field("weight", &self.weight)?;
        s.serialize_field("packaging", &self.packaging)?;
        s.serialize_field("package_price", &self.package_price)?;
        s.end()
    }
}

/// 批量发放/退款结果
///
/// 部分成功：验证失败前处理的订单提交，失败 ID 与首个错误一并返回。
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessedOrders {
    pub user_id: String,
    pub processed: Vec<String>,
    pub failed: Vec<String>,
    /// 批次中断原因（首个验证错误）
    pub error: Option<String>,
}

/// 订单领域错误
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order storage period has already expired")]
    Expired,

    #[error("order storage period has not expired yet")]
    NotExpired,

    #[error("order with this id already exists")]
    Duplicate,

    #[error("order with this id does not exist")]
    NotFound,

    #[error("order {order_id} does not belong to user {user_id}")]
    NotOwned { order_id: String, user_id: String },

    #[error("order is not stored in the warehouse")]
    NotStored,

    #[error("order has not been issued, refund is impossible")]
    NotIssued,

    #[error("more than 48 hours have passed since the order was issued")]
    RefundPeriodExpired,

    #[error("order weight exceeds the packaging limit")]
    InvalidWeight,

    #[error("unknown packaging type: {0}")]
    UnknownPackaging(String),

    #[error("main packaging types cannot be combined")]
    ConflictingMain,

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_order() -> Order {
        Order {
            id: "o1".into(),
            recipient_id: "u1".into(),
            expiry: Utc.with_ymd_and_hms(2099, 1, 2, 0, 0, 0).unwrap(),
            stored_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()),
            issued_at: None,
            refunded_at: None,
            base_price: Decimal::from(1000),
            weight: Decimal::from(2),
            packaging: "box".into(),
            package_price: Decimal::from(20),
        }
    }

    #[test]
    fn status_follows_latest_timestamp() {
        let mut order = base_order();
        assert_eq!(order.status(), OrderStatus::Stored);

        order.issued_at = Some(Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap());
        assert_eq!(order.status(), OrderStatus::Issued);

        order.refunded_at = Some(Utc.with_ymd_and_hms(2025, 1, 3, 10, 0, 0).unwrap());
        assert_eq!(order.status(), OrderStatus::Refunded);
    }

    #[test]
    fn last_updated_picks_latest_stage() {
        let mut order = base_order();
        assert_eq!(order.last_updated(), order.stored_at.unwrap());

        let issued = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        order.issued_at = Some(issued);
        assert_eq!(order.last_updated(), issued);
    }

    #[test]
    fn refund_window_boundary() {
        let issued = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut order = base_order();
        order.issued_at = Some(issued);

        let exactly_48h = issued + Duration::hours(48);
        assert!(order.within_refund_window(exactly_48h));

        let past_window = issued + Duration::hours(49);
        assert!(!order.within_refund_window(past_window));
    }

    #[test]
    fn refund_window_requires_issue() {
        let order = base_order();
        assert!(!order.within_refund_window(Utc::now()));
    }

    #[test]
    fn cache_blob_round_trips() {
        let order = base_order();
        let raw = serde_json::to_string(&order).unwrap();
        // the derived status travels with the blob but is never authoritative
        assert!(raw.contains("\"status\":\"stored\""));
        let parsed: Order = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.id, order.id);
        assert_eq!(parsed.recipient_id, order.recipient_id);
        assert_eq!(parsed.expiry, order.expiry);
        assert_eq!(parsed.stored_at, order.stored_at);
        assert_eq!(parsed.base_price, order.base_price);
        assert_eq!(parsed.package_price, order.package_price);
        assert_eq!(parsed.status(), order.status());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Stored).unwrap(),
            "\"stored\""
        );
        assert_eq!(OrderStatus::Issued.to_string(), "issued");
    }
}
