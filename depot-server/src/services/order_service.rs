//! 订单服务
//!
//! 生命周期操作的编排层：
//!
//! - 入库校验（截止时间、包装、重量）后写库
//! - 提交成功后在分离任务里做缓存写入（5s 截止时间，不拖慢请求）
//! - 每个处理成功的订单发出一条 StatusChange 审计事件（按 id，不按批次）
//! - 报表读路径 cache-aside：索引集合 → 订单 blob → 数据库回源

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::audit::Pipeline;
use crate::cache::OrderCache;
use crate::db::repository::{
    OrderRepository, ReportRepository, UserOrderRepository,
};
use crate::domain::{
    EventType, Order, OrderError, OrderStatus, ProcessedOrders, parse_packaging,
};

/// 分离缓存写入的截止时间
const CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// 订单服务
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    user_orders: UserOrderRepository,
    reports: ReportRepository,
    cache: OrderCache,
    pipeline: Arc<Pipeline>,
}

impl OrderService {
    pub fn new(
        orders: OrderRepository,
        user_orders: UserOrderRepository,
        reports: ReportRepository,
        cache: OrderCache,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            orders,
            user_orders,
            reports,
            cache,
            pipeline,
        }
    }

    // ========== 生命周期操作 ==========

    /// 接收包裹入库
    ///
    /// `order` 由传输层组装，`stored_at` 与 `package_price` 在这里推导。
    pub async fn accept_order(&self, mut order: Order) -> Result<(), OrderError> {
        if order.expiry <= Utc::now() {
            return Err(OrderError::Expired);
        }

        let packaging = parse_packaging(&order.packaging)?;
        if !packaging.admits(order.weight) {
            return Err(OrderError::InvalidWeight);
        }
        order.package_price = packaging.price();
        order.stored_at = Some(Utc::now());

        self.orders.save_order(&order).await?;

        // 提交成功后的缓存写入：分离任务，失败只告警
        let cache = self.cache.clone();
        let cached = order.clone();
        spawn_cache_write("accept", async move {
            cache.set_order(&cached).await?;
            cache.add_history(&cached.id).await?;
            cache.add_user_active(&cached.recipient_id, &cached.id).await?;
            cache.add_all_active(&cached.id).await
        });

        self.emit_status_change(&order.id, &order.recipient_id, "stored")
            .await;
        Ok(())
    }

    /// 过期未取的包裹退回承运方（删除订单行）
    pub async fn return_order(&self, order_id: &str) -> Result<(), OrderError> {
        let order = self.orders.find_order_by_id(order_id).await?;

        if order.status() != OrderStatus::Stored {
            return Err(OrderError::NotStored);
        }
        if order.expiry > Utc::now() {
            return Err(OrderError::NotExpired);
        }

        self.orders.delete_order(order_id).await?;

        let cache = self.cache.clone();
        let id = order.id.clone();
        let user_id = order.recipient_id.clone();
        spawn_cache_write("return", async move {
            cache.delete_order(&id).await?;
            cache.remove_user_active(&user_id, &id).await?;
            cache.remove_all_active(&id).await
        });

        self.emit_status_change(order_id, &order.recipient_id, "returned")
            .await;
        Ok(())
    }

    /// 批量发放
    pub async fn issue_orders(
        &self,
        user_id: &str,
        order_ids: &[String],
    ) -> Result<ProcessedOrders, OrderError> {
        let result = self.user_orders.issue_orders(user_id, order_ids).await?;
        let issued_at = Utc::now();

        for id in &result.processed {
            let cache = self.cache.clone();
            let id_owned = id.clone();
            let user = user_id.to_string();
            spawn_cache_write("issue", async move {
                cache.mark_issued(&id_owned, issued_at).await?;
                // 在架集合即时剪除；刷新任务兜底
                cache.remove_user_active(&user, &id_owned).await?;
                cache.remove_all_active(&id_owned).await
            });

            self.emit_status_change(id, user_id, "issued").await;
        }
        Ok(result)
    }

    /// 批量退款
    pub async fn refund_orders(
        &self,
        user_id: &str,
        order_ids: &[String],
    ) -> Result<ProcessedOrders, OrderError> {
        let result = self.user_orders.refund_orders(user_id, order_ids).await?;

        for id in &result.processed {
            let cache = self.cache.clone();
            let id_owned = id.clone();
            spawn_cache_write("refund", async move {
                cache.delete_order(&id_owned).await?;
                cache.remove_history(&id_owned).await
            });

            self.emit_status_change(id, user_id, "refunded")
                .await;
        }
        Ok(result)
    }

    // ========== 报表（数据库直读，keyset 分页）==========

    pub async fn get_user_orders(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<i64>,
        status: &str,
    ) -> Result<(Vec<Order>, Option<String>), OrderError> {
        Ok(self
            .reports
            .get_user_orders(user_id, limit, cursor, status)
            .await?)
    }

    pub async fn get_refunded_orders(
        &self,
        limit: i64,
        cursor: Option<i64>,
    ) -> Result<(Vec<Order>, Option<String>), OrderError> {
        Ok(self.reports.get_refunded_orders(limit, cursor).await?)
    }

    pub async fn get_order_history(
        &self,
        limit: i64,
        cursor: Option<(DateTime<Utc>, i64)>,
    ) -> Result<(Vec<Order>, Option<String>), OrderError> {
        Ok(self.reports.get_order_history(limit, cursor).await?)
    }

    // ========== 缓存优先读路径 ==========

    /// 全部在架订单（cache-aside）
    pub async fn get_all_active_orders(&self) -> Result<Vec<Order>, OrderError> {
        let mut ids = match self.cache.get_all_active().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Active index read failed, falling back to store");
                Vec::new()
            }
        };

        if ids.is_empty() {
            ids = self.reports.get_all_active_order_ids().await?;
            if let Err(e) = self.cache.replace_all_active(&ids).await {
                tracing::warn!(error = %e, "Failed to repopulate active:all index");
            }
        }

        self.load_orders_through_cache(&ids).await
    }

    /// 某用户的在架订单（cache-aside）
    pub async fn get_user_active_orders(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        let mut ids = match self.cache.get_user_active(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "User active index read failed, falling back to store");
                Vec::new()
            }
        };

        if ids.is_empty() {
            ids = self.reports.get_user_active_order_ids(user_id).await?;
            if let Err(e) = self.cache.replace_user_active(user_id, &ids).await {
                tracing::warn!(error = %e, "Failed to repopulate user active index");
            }
        }

        self.load_orders_through_cache(&ids).await
    }

    /// 全量历史（cache-aside）
    pub async fn get_order_history_cached(&self) -> Result<Vec<Order>, OrderError> {
        let mut ids = match self.cache.get_history().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "History index read failed, falling back to store");
                Vec::new()
            }
        };

        if ids.is_empty() {
            ids = self.reports.get_history_order_ids().await?;
            if let Err(e) = self.cache.replace_history(&ids).await {
                tracing::warn!(error = %e, "Failed to repopulate history index");
            }
        }

        self.load_orders_through_cache(&ids).await
    }

    /// 批量读 blob：一次 MGET，miss 的 id 回源数据库并回填
    async fn load_orders_through_cache(&self, ids: &[String]) -> Result<Vec<Order>, OrderError> {
        let (mut orders, misses) = match self.cache.get_orders(ids).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Cache batch read failed, falling back to store");
                (Vec::new(), ids.to_vec())
            }
        };

        if !misses.is_empty() {
            let fetched = self.orders.find_orders_by_ids(&misses).await?;
            for order in &fetched {
                if let Err(e) = self.cache.set_order(order).await {
                    tracing::warn!(order_id = %order.id, error = %e, "Failed to repopulate order blob");
                }
            }
            orders.extend(fetched);
        }
        Ok(orders)
    }

    async fn emit_status_change(&self, order_id: &str, user_id: &str, status: &str) {
        self.pipeline
            .send_event(
                EventType::StatusChange,
                serde_json::json!({
                    "order_id": order_id,
                    "user_id": user_id,
                    "status": status,
                }),
            )
            .await;
    }
}

/// 分离的缓存写入：5s 截止时间，错误只告警
fn spawn_cache_write<F>(what: &'static str, fut: F)
where
    F: std::future::Future<Output = redis::RedisResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(CACHE_WRITE_TIMEOUT, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(flow = what, error = %e, "Cache write failed"),
            Err(_) => tracing::warn!(flow = what, "Cache write timed out"),
        }
    });
}
