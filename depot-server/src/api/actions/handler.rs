//! Issue/Refund Batch Handler
//!
//! One endpoint, two commands. Partial success is a 200: the transaction
//! committed, and the body carries processed ids, failed ids, and the
//! error that halted the batch.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct IssueRefundRequest {
    pub command: String,
    pub user_id: String,
    pub order_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueRefundResponse {
    pub processed_order_ids: Vec<String>,
    pub failed_order_ids: Vec<String>,
    pub error: Option<String>,
}

pub async fn issue_refund_orders(
    State(state): State<ServerState>,
    Json(req): Json<IssueRefundRequest>,
) -> AppResult<Json<IssueRefundResponse>> {
    let result = match req.command.as_str() {
        "issue" => {
            state
                .order_service
                .issue_orders(&req.user_id, &req.order_ids)
                .await?
        }
        "refund" => {
            state
                .order_service
                .refund_orders(&req.user_id, &req.order_ids)
                .await?
        }
        _ => return Err(AppError::Validation("invalid command".into())),
    };

    Ok(Json(IssueRefundResponse {
        processed_order_ids: result.processed,
        failed_order_ids: result.failed,
        error: result.error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_success_body_shape() {
        let body = IssueRefundResponse {
            processed_order_ids: vec!["o1".into()],
            failed_order_ids: vec!["o3".into(), "o2".into()],
            error: Some("order o3 does not belong to user u1".into()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["processed_order_ids"], serde_json::json!(["o1"]));
        assert_eq!(json["failed_order_ids"], serde_json::json!(["o3", "o2"]));
        assert_eq!(
            json["error"],
            serde_json::json!("order o3 does not belong to user u1")
        );
    }

    #[test]
    fn clean_batch_has_null_error() {
        let body = IssueRefundResponse {
            processed_order_ids: vec!["o1".into(), "o2".into()],
            failed_order_ids: vec![],
            error: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["error"].is_null());
    }
}
