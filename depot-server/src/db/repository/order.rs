//! Order Repository
//!
//! Single-order persistence: save (with packaging dictionary upsert),
//! lookup, batch lookup, delete. Batch state transitions live in
//! [`super::user_order`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{RepoError, RepoResult};
use crate::domain::{Order, parse_packaging};

/// sqlx row for the orders table
#[derive(sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub order_id: String,
    pub recipient_id: String,
    pub expiry: DateTime<Utc>,
    pub stored_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub base_price: Decimal,
    pub weight: Decimal,
    pub packaging: String,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        // package_price is derived, not stored: recompute from the tag.
        // The tag was validated at accept time, so parse cannot fail here;
        // fall back to zero rather than poisoning a read path.
        let package_price = parse_packaging(&row.packaging)
            .map(|s| s.price())
            .unwrap_or_default();
        Order {
            id: row.order_id,
            recipient_id: row.recipient_id,
            expiry: row.expiry,
            stored_at: row.stored_at,
            issued_at: row.issued_at,
            refunded_at: row.refunded_at,
            base_price: row.base_price,
            weight: row.weight,
            packaging: row.packaging,
            package_price,
        }
    }
}

pub(crate) const ORDER_COLUMNS: &str = "order_id, recipient_id, expiry, \
     stored_at, issued_at, refunded_at, base_price, weight, packaging";

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new order: upsert the packaging dictionary row, then insert
    /// the order. One transaction; a unique violation surfaces as Duplicate.
    pub async fn save_order(&self, order: &Order) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO packaging_types (id, packaging_price) VALUES ($1, $2)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&order.packaging)
        .bind(order.package_price)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO orders (
                order_id, recipient_id, expiry, stored_at, issued_at, refunded_at,
                base_price, weight, packaging
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&order.id)
        .bind(&order.recipient_id)
        .bind(order.expiry)
        .bind(order.stored_at)
        .bind(order.issued_at)
        .bind(order.refunded_at)
        .bind(order.base_price)
        .bind(order.weight)
        .bind(&order.packaging)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Find order by business id
    pub async fn find_order_by_id(&self, id: &str) -> RepoResult<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::from)
            .ok_or_else(|| RepoError::NotFound(format!("order {id}")))
    }

    /// Batch lookup; missing ids are silently omitted, order unspecified
    pub async fn find_orders_by_ids(&self, ids: &[String]) -> RepoResult<Vec<Order>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Delete an order row. Only the return flow reaches this, after the
    /// stored-and-expired predicates held under the service's check.
    pub async fn delete_order(&self, id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
