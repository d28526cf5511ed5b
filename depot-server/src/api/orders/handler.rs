//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::core::ServerState;
use crate::domain::Order;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct AcceptOrderRequest {
    pub id: String,
    pub recipient_id: String,
    /// Last day of storage, `YYYY-MM-DD`
    pub expiry: String,
    pub base_price: Decimal,
    pub weight: Decimal,
    pub packaging: String,
}

/// The wire date is the last day of storage: expire at the end of that day,
/// so a request at midnight of day+1 already fails with Expired.
fn parse_expiry_date(raw: &str) -> Result<chrono::DateTime<Utc>, AppError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid expiry date format".into()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)) + chrono::Duration::hours(24))
}

/// Accept a parcel into the warehouse
pub async fn accept_order(
    State(state): State<ServerState>,
    Json(req): Json<AcceptOrderRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let expiry = parse_expiry_date(&req.expiry)?;

    let order = Order {
        id: req.id,
        recipient_id: req.recipient_id,
        expiry,
        stored_at: None,
        issued_at: None,
        refunded_at: None,
        base_price: req.base_price,
        weight: req.weight,
        packaging: req.packaging,
        package_price: Decimal::ZERO,
    };

    state.order_service.accept_order(order).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "order accepted"})),
    ))
}

/// Return an expired stored parcel to the courier
pub async fn return_order(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.order_service.return_order(&id).await?;
    Ok(Json(json!({"message": "order returned to courier"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_end_of_the_supplied_day() {
        let expiry = parse_expiry_date("2099-01-01").unwrap();
        assert_eq!(
            expiry,
            Utc.with_ymd_and_hms(2099, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_expiry_date("01.02.2099").is_err());
        assert!(parse_expiry_date("2099-13-01").is_err());
        assert!(parse_expiry_date("tomorrow").is_err());
    }
}
