//! 订单缓存层 (Redis)
//!
//! cache-aside：权威状态始终在数据库，缓存条目是派生数据。
//!
//! # 键布局
//!
//! | 键 | 内容 | TTL |
//! |----|------|-----|
//! | `order:<id>` | 订单 JSON | 按生命周期推导（见 [`order_ttl`]） |
//! | `active:<user_id>` | 用户在架订单 id 集合 | 14 天 |
//! | `active:all` | 全部在架订单 id 集合 | 14 天 |
//! | `history` | 所有入库过的订单 id 集合 | 14 天 |
//!
//! 批量读取用一次 MGET 往返；未命中与解码失败都按 miss 处理，
//! 由调用方回源数据库。

pub mod refresher;

pub use refresher::CacheRefresher;

use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};

use crate::domain::Order;

/// 索引集合的 TTL：14 天
const INDEX_TTL_SECS: i64 = 14 * 24 * 3600;

/// 无时间戳订单的兜底 TTL：24 小时
const DEFAULT_TTL_HOURS: i64 = 24;

/// `order:<id>` 的 TTL 推导
///
/// - 已退款 → 不缓存（驱逐）
/// - 已发放 → 存活到退款窗口关闭
/// - 在架 → 存活到存储截止时间
/// - 兜底 → 24 小时
pub fn order_ttl(order: &Order, now: DateTime<Utc>) -> Option<std::time::Duration> {
    let remaining = if order.refunded_at.is_some() {
        return None;
    } else if let Some(issued) = order.issued_at {
        issued + Duration::hours(crate::domain::order::REFUND_WINDOW_HOURS) - now
    } else if order.stored_at.is_some() {
        order.expiry - now
    } else {
        Duration::hours(DEFAULT_TTL_HOURS)
    };

    remaining.to_std().ok().filter(|d| !d.is_zero())
}

/// 订单缓存客户端
#[derive(Clone)]
pub struct OrderCache {
    conn: ConnectionManager,
}

impl OrderCache {
    /// 建立连接（进程内单例，由组合根持有）
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    fn order_key(id: &str) -> String {
        format!("order:{id}")
    }

    fn user_active_key(user_id: &str) -> String {
        format!("active:{user_id}")
    }

    const ALL_ACTIVE_KEY: &'static str = "active:all";
    const HISTORY_KEY: &'static str = "history";

    // ========== 订单 blob ==========

    /// 写入订单 blob；TTL 过期或已退款时改为驱逐
    pub async fn set_order(&self, order: &Order) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let key = Self::order_key(&order.id);
        match order_ttl(order, Utc::now()) {
            Some(ttl) => {
                let data = serde_json::to_string(order).map_err(|e| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "order encode",
                        e.to_string(),
                    ))
                })?;
                conn.set_ex(key, data, ttl.as_secs().max(1)).await
            }
            None => conn.del(key).await,
        }
    }

    pub async fn get_order(&self, order_id: &str) -> RedisResult<Option<Order>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(Self::order_key(order_id)).await?;
        Ok(data.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(order) => Some(order),
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Undecodable cached order, treating as miss");
                None
            }
        }))
    }

    /// 批量读取：一次 MGET 往返；返回命中的订单和未命中的 id
    pub async fn get_orders(&self, ids: &[String]) -> RedisResult<(Vec<Order>, Vec<String>)> {
        if ids.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        for id in ids {
            cmd.arg(Self::order_key(id));
        }
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;

        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for (id, value) in ids.iter().zip(values) {
            match value.and_then(|raw| serde_json::from_str::<Order>(&raw).ok()) {
                Some(order) => hits.push(order),
                None => misses.push(id.clone()),
            }
        }
        Ok((hits, misses))
    }

    pub async fn delete_order(&self, order_id: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.del(Self::order_key(order_id)).await
    }

    /// 发放后更新缓存 blob 的 `issued_at`（miss 不算错误）
    pub async fn mark_issued(
        &self,
        order_id: &str,
        issued_at: DateTime<Utc>,
    ) -> RedisResult<()> {
        if let Some(mut order) = self.get_order(order_id).await? {
            order.issued_at = Some(issued_at);
            self.set_order(&order).await?;
        }
        Ok(())
    }

    // ========== 索引集合 ==========

    pub async fn add_user_active(&self, user_id: &str, order_id: &str) -> RedisResult<()> {
        self.add_to_set(&Self::user_active_key(user_id), order_id)
            .await
    }

    pub async fn remove_user_active(&self, user_id: &str, order_id: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.srem(Self::user_active_key(user_id), order_id).await
    }

    pub async fn get_user_active(&self, user_id: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(Self::user_active_key(user_id)).await
    }

    pub async fn replace_user_active(&self, user_id: &str, ids: &[String]) -> RedisResult<()> {
        self.replace_set(&Self::user_active_key(user_id), ids).await
    }

    pub async fn add_all_active(&self, order_id: &str) -> RedisResult<()> {
        self.add_to_set(Self::ALL_ACTIVE_KEY, order_id).await
    }

    pub async fn remove_all_active(&self, order_id: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.srem(Self::ALL_ACTIVE_KEY, order_id).await
    }

    pub async fn get_all_active(&self) -> RedisResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(Self::ALL_ACTIVE_KEY).await
    }

    pub async fn replace_all_active(&self, ids: &[String]) -> RedisResult<()> {
        self.replace_set(Self::ALL_ACTIVE_KEY, ids).await
    }

    pub async fn add_history(&self, order_id: &str) -> RedisResult<()> {
        self.add_to_set(Self::HISTORY_KEY, order_id).await
    }

    pub async fn remove_history(&self, order_id: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.srem(Self::HISTORY_KEY, order_id).await
    }

    pub async fn get_history(&self) -> RedisResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(Self::HISTORY_KEY).await
    }

    pub async fn replace_history(&self, ids: &[String]) -> RedisResult<()> {
        self.replace_set(Self::HISTORY_KEY, ids).await
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async(&mut conn).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.sadd(key, member).ignore();
        pipe.expire(key, INDEX_TTL_SECS).ignore();
        pipe.query_async(&mut conn).await
    }

    /// 整体替换集合内容（刷新任务使用）
    async fn replace_set(&self, key: &str, ids: &[String]) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(key).ignore();
        if !ids.is_empty() {
            pipe.sadd(key, ids).ignore();
            pipe.expire(key, INDEX_TTL_SECS).ignore();
        }
        pipe.query_async(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: "o1".into(),
            recipient_id: "u1".into(),
            expiry: now + Duration::days(3),
            stored_at: Some(now),
            issued_at: None,
            refunded_at: None,
            base_price: Decimal::from(100),
            weight: Decimal::from(1),
            packaging: "film".into(),
            package_price: Decimal::from(1),
        }
    }

    #[test]
    fn refunded_orders_are_not_cached() {
        let mut o = order();
        o.issued_at = Some(Utc::now());
        o.refunded_at = Some(Utc::now());
        assert!(order_ttl(&o, Utc::now()).is_none());
    }

    #[test]
    fn issued_ttl_runs_to_refund_window_close() {
        let now = Utc::now();
        let mut o = order();
        o.issued_at = Some(now - Duration::hours(12));
        let ttl = order_ttl(&o, now).unwrap();
        // 48h window minus 12h elapsed, within a second of slack
        let expected = 36 * 3600;
        assert!((ttl.as_secs() as i64 - expected).abs() <= 1);
    }

    #[test]
    fn stored_ttl_runs_to_expiry() {
        let now = Utc::now();
        let o = order();
        let ttl = order_ttl(&o, now).unwrap();
        let expected = 3 * 24 * 3600;
        assert!((ttl.as_secs() as i64 - expected).abs() <= 1);
    }

    #[test]
    fn elapsed_lifecycle_means_no_caching() {
        let now = Utc::now();
        let mut o = order();
        o.expiry = now - Duration::hours(1);
        assert!(order_ttl(&o, now).is_none());

        o.issued_at = Some(now - Duration::hours(50));
        assert!(order_ttl(&o, now).is_none());
    }

    #[test]
    fn blank_timestamps_fall_back_to_a_day() {
        let mut o = order();
        o.stored_at = None;
        let ttl = order_ttl(&o, Utc::now()).unwrap();
        assert_eq!(ttl.as_secs(), 24 * 3600);
    }
}
