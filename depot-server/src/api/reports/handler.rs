//! Report API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::db::repository::report::parse_history_cursor;
use crate::domain::Order;
use crate::utils::{AppError, AppResult};

const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrdersPage {
    pub orders: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

fn parse_limit(limit: Option<i64>) -> AppResult<i64> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(l) if l >= 1 => Ok(l),
        Some(_) => Err(AppError::Validation("invalid limit format".into())),
    }
}

fn parse_id_cursor(cursor: &Option<String>) -> AppResult<Option<i64>> {
    match cursor {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Validation("invalid cursor format".into())),
    }
}

/// Orders of one user, newest first
pub async fn get_user_orders(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<OrdersPage>> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_id_cursor(&query.cursor)?;

    let (orders, next_cursor) = state
        .order_service
        .get_user_orders(&user_id, limit, cursor, &query.status)
        .await?;
    Ok(Json(OrdersPage {
        orders,
        next_cursor,
    }))
}

/// Refunded orders across all users
pub async fn get_refunded_orders(
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<OrdersPage>> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_id_cursor(&query.cursor)?;

    let (orders, next_cursor) = state
        .order_service
        .get_refunded_orders(limit, cursor)
        .await?;
    Ok(Json(OrdersPage {
        orders,
        next_cursor,
    }))
}

/// Full history, composite `<RFC3339Nano>,<id>` cursor
pub async fn get_order_history(
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<OrdersPage>> {
    let limit = parse_limit(query.limit)?;
    let cursor = match &query.cursor {
        None => None,
        Some(raw) => Some(
            parse_history_cursor(raw)
                .ok_or_else(|| AppError::Validation("invalid cursor format".into()))?,
        ),
    };

    let (orders, next_cursor) = state.order_service.get_order_history(limit, cursor).await?;
    Ok(Json(OrdersPage {
        orders,
        next_cursor,
    }))
}

/// Cache-first view over every ever-stored order
pub async fn get_order_history_v2(
    State(state): State<ServerState>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.order_service.get_order_history_cached().await?;
    Ok(Json(orders))
}

/// Cache-first view over all orders on the shelf
pub async fn get_all_active_orders(
    State(state): State<ServerState>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.order_service.get_all_active_orders().await?;
    Ok(Json(orders))
}

/// Cache-first view over one user's orders on the shelf
pub async fn get_user_active_orders(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.order_service.get_user_active_orders(&user_id).await?;
    Ok(Json(orders))
}
