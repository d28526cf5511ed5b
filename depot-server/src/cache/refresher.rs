//! 缓存预热与定时刷新
//!
//! 启动时用数据库权威视图灌满索引集合与订单 blob；运行期间两个
//! ticker（在架 5 分钟、历史 30 分钟）整体重建索引集合，修正
//! 发放/退款留下的增量漂移。

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::OrderCache;
use crate::db::repository::{OrderRepository, ReportRepository};

/// 在架索引刷新间隔
const ACTIVE_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// 历史索引刷新间隔
const HISTORY_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// 缓存刷新器
pub struct CacheRefresher {
    cache: OrderCache,
    orders: OrderRepository,
    reports: ReportRepository,
}

impl CacheRefresher {
    pub fn new(cache: OrderCache, orders: OrderRepository, reports: ReportRepository) -> Self {
        Self {
            cache,
            orders,
            reports,
        }
    }

    /// 启动预热：索引集合 + 订单 blob，流量进入前完成
    pub async fn warmup(&self) {
        self.refresh_active().await;
        self.refresh_history().await;

        let history_ids = match self.reports.get_history_order_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Cache warmup: failed to list history ids");
                return;
            }
        };

        let orders = match self.orders.find_orders_by_ids(&history_ids).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Cache warmup: failed to load order blobs");
                return;
            }
        };

        let mut cached = 0usize;
        for order in &orders {
            match self.cache.set_order(order).await {
                Ok(()) => cached += 1,
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Cache warmup: blob write failed")
                }
            }
        }
        tracing::info!(
            total = orders.len(),
            cached,
            "Cache warmup complete"
        );
    }

    /// 刷新循环（两个 ticker 在同一个任务里）
    pub async fn run(self, shutdown: CancellationToken) {
        let mut active_tick = tokio::time::interval(ACTIVE_REFRESH_INTERVAL);
        let mut history_tick = tokio::time::interval(HISTORY_REFRESH_INTERVAL);
        // warmup 已经刷过一轮，跳过两个 ticker 的立即触发
        active_tick.tick().await;
        history_tick.tick().await;

        tracing::info!("Cache refresher started (active: 5m, history: 30m)");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Cache refresher received shutdown signal");
                    break;
                }
                _ = active_tick.tick() => {
                    self.refresh_active().await;
                }
                _ = history_tick.tick() => {
                    self.refresh_history().await;
                }
            }
        }
    }

    /// 整体重建 active:all 与每个用户的 active:<user> 集合
    async fn refresh_active(&self) {
        let pairs = match self.reports.get_active_order_pairs().await {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::error!(error = %e, "Active index refresh failed to query store");
                return;
            }
        };

        let all_ids: Vec<String> = pairs.iter().map(|(id, _)| id.clone()).collect();
        if let Err(e) = self.cache.replace_all_active(&all_ids).await {
            tracing::warn!(error = %e, "Failed to replace active:all index");
        }

        let mut by_user: HashMap<String, Vec<String>> = HashMap::new();
        for (order_id, user_id) in pairs {
            by_user.entry(user_id).or_default().push(order_id);
        }
        for (user_id, ids) in by_user {
            if let Err(e) = self.cache.replace_user_active(&user_id, &ids).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to replace user active index");
            }
        }
        tracing::debug!(orders = all_ids.len(), "Active index refreshed");
    }

    /// 整体重建 history 集合
    async fn refresh_history(&self) {
        match self.reports.get_history_order_ids().await {
            Ok(ids) => {
                if let Err(e) = self.cache.replace_history(&ids).await {
                    tracing::warn!(error = %e, "Failed to replace history index");
                } else {
                    tracing::debug!(orders = ids.len(), "History index refreshed");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "History index refresh failed to query store");
            }
        }
    }
}
