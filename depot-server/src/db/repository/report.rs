//! Report Repository
//!
//! Keyset-paginated reads over the orders table plus the id-list queries
//! that feed the cache indexes. Cursors key on the surrogate `id` column
//! (and the latest-update timestamp for full history) so pages stay stable
//! under concurrent inserts and deletes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::order::OrderRow;
use super::RepoResult;
use crate::domain::Order;

/// Row + surrogate id, for cursor construction
#[derive(sqlx::FromRow)]
struct PagedOrderRow {
    id: i64,
    order_id: String,
    recipient_id: String,
    expiry: DateTime<Utc>,
    stored_at: Option<DateTime<Utc>>,
    issued_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    base_price: Decimal,
    weight: Decimal,
    packaging: String,
}

impl PagedOrderRow {
    fn split(self) -> (i64, Order) {
        let surrogate = self.id;
        let order = Order::from(OrderRow {
            order_id: self.order_id,
            recipient_id: self.recipient_id,
            expiry: self.expiry,
            stored_at: self.stored_at,
            issued_at: self.issued_at,
            refunded_at: self.refunded_at,
            base_price: self.base_price,
            weight: self.weight,
            packaging: self.packaging,
        });
        (surrogate, order)
    }
}

const PAGED_COLUMNS: &str = "id, order_id, recipient_id, expiry, \
     stored_at, issued_at, refunded_at, base_price, weight, packaging";

/// GREATEST over the timestamp triple = moment of the latest state change
const LAST_UPDATED: &str = "GREATEST(\
     COALESCE(stored_at, 'epoch'::timestamptz), \
     COALESCE(issued_at, 'epoch'::timestamptz), \
     COALESCE(refunded_at, 'epoch'::timestamptz))";

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Orders of one user, newest first. Optional status filter currently
    /// supports only `stored` (the timestamp-triple shape of "on the shelf").
    pub async fn get_user_orders(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<i64>,
        status: &str,
    ) -> RepoResult<(Vec<Order>, Option<String>)> {
        let rows: Vec<PagedOrderRow> = sqlx::query_as(&format!(
            "SELECT {PAGED_COLUMNS} FROM orders
             WHERE recipient_id = $1
               AND ($2::BIGINT IS NULL OR id < $2)
               AND ($4 = '' OR (
                       $4 = 'stored'
                       AND stored_at IS NOT NULL
                       AND issued_at IS NULL
                       AND refunded_at IS NULL))
             ORDER BY id DESC
             LIMIT $3"
        ))
        .bind(user_id)
        .bind(cursor)
        .bind(limit)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(paginate_by_id(rows))
    }

    /// Refunded orders across all users, newest first
    pub async fn get_refunded_orders(
        &self,
        limit: i64,
        cursor: Option<i64>,
    ) -> RepoResult<(Vec<Order>, Option<String>)> {
        let rows: Vec<PagedOrderRow> = sqlx::query_as(&format!(
            "SELECT {PAGED_COLUMNS} FROM orders
             WHERE refunded_at IS NOT NULL
               AND ($1::BIGINT IS NULL OR id < $1)
             ORDER BY id DESC
             LIMIT $2"
        ))
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(paginate_by_id(rows))
    }

    /// Full history ordered by latest state change, composite keyset cursor
    /// `(last_updated, id)` in strict lexicographic descending order.
    pub async fn get_order_history(
        &self,
        limit: i64,
        cursor: Option<(DateTime<Utc>, i64)>,
    ) -> RepoResult<(Vec<Order>, Option<String>)> {
        let (cursor_ts, cursor_id) = match cursor {
            Some((ts, id)) => (Some(ts), Some(id)),
            None => (None, None),
        };

        let rows: Vec<PagedOrderRow> = sqlx::query_as(&format!(
            "SELECT {PAGED_COLUMNS} FROM orders
             WHERE ($1::TIMESTAMPTZ IS NULL
                    OR {LAST_UPDATED} < $1
                    OR ({LAST_UPDATED} = $1 AND id < $2))
             ORDER BY {LAST_UPDATED} DESC, id DESC
             LIMIT $3"
        ))
        .bind(cursor_ts)
        .bind(cursor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        let mut next_cursor = None;
        for row in rows {
            let (surrogate, order) = row.split();
            next_cursor = Some(format!(
                "{},{}",
                order
                    .last_updated()
                    .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
                surrogate
            ));
            orders.push(order);
        }
        Ok((orders, next_cursor))
    }

    /// Ids of orders sitting on the shelf (stored, not issued, not refunded)
    pub async fn get_all_active_order_ids(&self) -> RepoResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT order_id FROM orders
             WHERE stored_at IS NOT NULL AND issued_at IS NULL AND refunded_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Active order ids of one user
    pub async fn get_user_active_order_ids(&self, user_id: &str) -> RepoResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT order_id FROM orders
             WHERE recipient_id = $1
               AND stored_at IS NOT NULL AND issued_at IS NULL AND refunded_at IS NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// `(order_id, recipient_id)` pairs of every active order, for the index
    /// refresher to rebuild both the global and the per-user sets in one scan
    pub async fn get_active_order_pairs(&self) -> RepoResult<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = sqlx::query_as(
            "SELECT order_id, recipient_id FROM orders
             WHERE stored_at IS NOT NULL AND issued_at IS NULL AND refunded_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pairs)
    }

    /// Ids of every order ever stored
    pub async fn get_history_order_ids(&self) -> RepoResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT order_id FROM orders")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

fn paginate_by_id(rows: Vec<PagedOrderRow>) -> (Vec<Order>, Option<String>) {
    let mut orders = Vec::with_capacity(rows.len());
    let mut next_cursor = None;
    for row in rows {
        let (surrogate, order) = row.split();
        next_cursor = Some(surrogate.to_string());
        orders.push(order);
    }
    (orders, next_cursor)
}

/// Parse a `<RFC3339Nano>,<id>` history cursor
pub fn parse_history_cursor(raw: &str) -> Option<(DateTime<Utc>, i64)> {
    let (ts, id) = raw.split_once(',')?;
    let ts = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
    let id = id.parse::<i64>().ok()?;
    Some((ts, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn paged_row(id: i64, order_id: &str) -> PagedOrderRow {
        let now = Utc::now();
        PagedOrderRow {
            id,
            order_id: order_id.into(),
            recipient_id: "u1".into(),
            expiry: now + chrono::Duration::days(1),
            stored_at: Some(now),
            issued_at: None,
            refunded_at: None,
            base_price: Decimal::from(100),
            weight: Decimal::from(1),
            packaging: "bag".into(),
        }
    }

    #[test]
    fn id_cursor_points_at_last_row() {
        let rows = vec![paged_row(9, "o9"), paged_row(7, "o7"), paged_row(4, "o4")];
        let (orders, cursor) = paginate_by_id(rows);
        assert_eq!(orders.len(), 3);
        assert_eq!(cursor.as_deref(), Some("4"));
        // derived surcharge comes back with the row
        assert_eq!(orders[0].package_price, Decimal::from(5));
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let (orders, cursor) = paginate_by_id(Vec::new());
        assert!(orders.is_empty());
        assert!(cursor.is_none());
    }

    #[test]
    fn history_cursor_round_trips_without_precision_loss() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let encoded = format!(
            "{},{}",
            ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            42
        );
        let (parsed_ts, parsed_id) = parse_history_cursor(&encoded).unwrap();
        assert_eq!(parsed_ts, ts);
        assert_eq!(parsed_id, 42);
    }

    #[test]
    fn malformed_cursors_are_rejected() {
        assert!(parse_history_cursor("not-a-cursor").is_none());
        assert!(parse_history_cursor("2025-03-01T12:00:00Z").is_none());
        assert!(parse_history_cursor("2025-03-01T12:00:00Z,abc").is_none());
        assert!(parse_history_cursor("yesterday,42").is_none());
    }
}
