//! 积分账本 API 处理器
//!
//! 变更接口首次写入返回 201，幂等重放返回 200

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{AdjustRequest, AmountRequest, ApiResponse, HistoryParams, PageResponse, ReceiptDto},
    error::BonusError,
    models::{BalanceSnapshot, BonusOperation, LedgerReceipt},
    state::AppState,
};

type ReceiptResponse = (StatusCode, Json<ApiResponse<ReceiptDto>>);

fn receipt_response(receipt: LedgerReceipt) -> ReceiptResponse {
    if receipt.replayed {
        (StatusCode::OK, Json(ApiResponse::replayed(receipt.into())))
    } else {
        (StatusCode::CREATED, Json(ApiResponse::success(receipt.into())))
    }
}

/// 获得积分
///
/// POST /api/v1/bonus/users/{user_id}/earn
pub async fn earn(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<ReceiptResponse, BonusError> {
    req.check()?;
    let (amount, meta) = req.into_parts();
    let receipt = state.ledger.earn(&user_id, amount, meta).await?;
    Ok(receipt_response(receipt))
}

/// 使用积分
///
/// POST /api/v1/bonus/users/{user_id}/apply
pub async fn apply(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<ReceiptResponse, BonusError> {
    req.check()?;
    let (amount, meta) = req.into_parts();
    let receipt = state.ledger.apply(&user_id, amount, meta).await?;
    Ok(receipt_response(receipt))
}

/// 调整积分
///
/// POST /api/v1/bonus/users/{user_id}/adjust
pub async fn adjust(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> Result<ReceiptResponse, BonusError> {
    req.validate()?;
    let (delta, meta) = req.into_parts();
    let receipt = state.ledger.adjust(&user_id, delta, meta).await?;
    Ok(receipt_response(receipt))
}

/// GET /api/v1/bonus/users/{user_id}/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<BalanceSnapshot>>, BonusError> {
    let snapshot = state.ledger.get_balance(&user_id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// GET /api/v1/bonus/users/{user_id}/history?page=&pageSize=
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<PageResponse<BonusOperation>>>, BonusError> {
    params.validate()?;
    let page = state
        .ledger
        .get_history(&user_id, params.page, params.page_size)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

/// GET /api/v1/bonus/operations/{operation_id}
pub async fn get_operation(
    State(state): State<AppState>,
    Path(operation_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BonusOperation>>, BonusError> {
    let operation = state.ledger.get_operation(operation_id).await?;
    Ok(Json(ApiResponse::success(operation)))
}
