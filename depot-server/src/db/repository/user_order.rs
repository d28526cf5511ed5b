//! User-Order Repository
//!
//! Atomic batch issue/refund. One transaction per batch:
//!
//! 1. Lock phase: `SELECT ... FOR UPDATE` on each target row, acquired in
//!    sorted id order so overlapping batches cannot deadlock.
//! 2. Apply phase: validate and update in the caller's input order. The
//!    first validation failure halts the loop; ids after it are reported
//!    failed without validation, ids before it stay in the commit.
//!
//! Missing ids record the error and are skipped without halting the batch.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use super::order::{ORDER_COLUMNS, OrderRow};
use super::RepoResult;
use crate::domain::{Order, OrderError, OrderStatus, ProcessedOrders};

#[derive(Clone)]
pub struct UserOrderRepository {
    pool: PgPool,
}

enum Command {
    Issue,
    Refund,
}

impl UserOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue stored, unexpired orders owned by `user_id`
    pub async fn issue_orders(
        &self,
        user_id: &str,
        order_ids: &[String],
    ) -> RepoResult<ProcessedOrders> {
        self.process(user_id, order_ids, Command::Issue).await
    }

    /// Refund issued orders within the 48 h window
    pub async fn refund_orders(
        &self,
        user_id: &str,
        order_ids: &[String],
    ) -> RepoResult<ProcessedOrders> {
        self.process(user_id, order_ids, Command::Refund).await
    }

    async fn process(
        &self,
        user_id: &str,
        order_ids: &[String],
        command: Command,
    ) -> RepoResult<ProcessedOrders> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let mut locked = lock_orders(&mut tx, order_ids).await?;

        let mut processed: Vec<String> = Vec::new();
        let mut batch_error: Option<String> = None;

        for id in order_ids {
            let Some(order) = locked.get_mut(id) else {
                batch_error = Some(format!("{}: {}", OrderError::NotFound, id));
                continue;
            };

            let verdict = match command {
                Command::Issue => validate_for_issue(order, user_id, now),
                Command::Refund => validate_for_refund(order, user_id, now),
            };
            if let Err(err) = verdict {
                batch_error = Some(err.to_string());
                break;
            }

            let column = match command {
                Command::Issue => "issued_at",
                Command::Refund => "refunded_at",
            };
            sqlx::query(&format!(
                "UPDATE orders SET {column} = $1 WHERE order_id = $2"
            ))
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            // keep the in-memory snapshot current so a repeated id in the
            // same batch validates against the new state
            match command {
                Command::Issue => order.issued_at = Some(now),
                Command::Refund => order.refunded_at = Some(now),
            }

            processed.push(id.clone());
        }

        tx.commit().await?;

        let failed = failed_ids(order_ids, &processed);
        Ok(ProcessedOrders {
            user_id: user_id.to_string(),
            processed,
            failed,
            error: batch_error,
        })
    }
}

/// Lock target rows in sorted id order; missing ids are absent from the map
async fn lock_orders(
    tx: &mut Transaction<'_, Postgres>,
    order_ids: &[String],
) -> RepoResult<HashMap<String, Order>> {
    let mut sorted: Vec<&String> = order_ids.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut locked = HashMap::with_capacity(sorted.len());
    for id in sorted {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = row {
            locked.insert(id.clone(), Order::from(row));
        }
    }
    Ok(locked)
}

fn validate_for_issue(
    order: &Order,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), OrderError> {
    if order.recipient_id != user_id {
        return Err(OrderError::NotOwned {
            order_id: order.id.clone(),
            user_id: user_id.to_string(),
        });
    }
    if order.status() != OrderStatus::Stored {
        return Err(OrderError::NotStored);
    }
    if order.expiry <= now {
        return Err(OrderError::Expired);
    }
    Ok(())
}

fn validate_for_refund(
    order: &Order,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), OrderError> {
    if order.recipient_id != user_id {
        return Err(OrderError::NotOwned {
            order_id: order.id.clone(),
            user_id: user_id.to_string(),
        });
    }
    if order.status() != OrderStatus::Issued {
        return Err(OrderError::NotIssued);
    }
    if !order.within_refund_window(now) {
        return Err(OrderError::RefundPeriodExpired);
    }
    Ok(())
}

/// Input ids not processed, in input order
fn failed_ids(order_ids: &[String], processed: &[String]) -> Vec<String> {
    order_ids
        .iter()
        .filter(|id| !processed.contains(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn stored_order(id: &str, user: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.into(),
            recipient_id: user.into(),
            expiry: now + Duration::days(7),
            stored_at: Some(now),
            issued_at: None,
            refunded_at: None,
            base_price: Decimal::from(100),
            weight: Decimal::from(1),
            packaging: "bag".into(),
            package_price: Decimal::from(5),
        }
    }

    #[test]
    fn issue_rejects_foreign_order() {
        let order = stored_order("o3", "u2");
        let err = validate_for_issue(&order, "u1", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            OrderError::NotOwned {
                order_id: "o3".into(),
                user_id: "u1".into()
            }
        );
        assert_eq!(err.to_string(), "order o3 does not belong to user u1");
    }

    #[test]
    fn issue_rejects_expired_order() {
        let mut order = stored_order("o1", "u1");
        order.expiry = Utc::now() - Duration::hours(1);
        assert_eq!(
            validate_for_issue(&order, "u1", Utc::now()).unwrap_err(),
            OrderError::Expired
        );
    }

    #[test]
    fn issue_rejects_already_issued() {
        let mut order = stored_order("o1", "u1");
        order.issued_at = Some(Utc::now());
        assert_eq!(
            validate_for_issue(&order, "u1", Utc::now()).unwrap_err(),
            OrderError::NotStored
        );
    }

    #[test]
    fn refund_rejects_stored_order_with_distinct_kind() {
        let order = stored_order("o1", "u1");
        assert_eq!(
            validate_for_refund(&order, "u1", Utc::now()).unwrap_err(),
            OrderError::NotIssued
        );
    }

    #[test]
    fn refund_rejects_stale_issue() {
        let mut order = stored_order("o1", "u1");
        let now = Utc::now();
        order.issued_at = Some(now - Duration::hours(49));
        assert_eq!(
            validate_for_refund(&order, "u1", now).unwrap_err(),
            OrderError::RefundPeriodExpired
        );
    }

    #[test]
    fn refund_accepts_within_window() {
        let mut order = stored_order("o1", "u1");
        let now = Utc::now();
        order.issued_at = Some(now - Duration::hours(47));
        assert!(validate_for_refund(&order, "u1", now).is_ok());
    }

    #[test]
    fn failed_ids_keep_input_order() {
        let input = vec!["o1".to_string(), "o3".to_string(), "o2".to_string()];
        let processed = vec!["o1".to_string()];
        assert_eq!(
            failed_ids(&input, &processed),
            vec!["o3".to_string(), "o2".to_string()]
        );
    }
}
