//! 积分账本错误类型
//!
//! 定义账本的业务错误和系统错误，以及到 HTTP 响应的映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// 积分账本错误类型
#[derive(Debug, Error)]
pub enum BonusError {
    // === 业务错误 ===
    #[error("积分数量必须为正数: {0}")]
    InvalidAmount(i64),

    #[error("积分余额不足: 需要 {required}, 可用 {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("调整后余额为负: 当前 {balance}, 调整 {delta}")]
    NegativeBalance { balance: i64, delta: i64 },

    #[error("积分流水不存在: {0}")]
    OperationNotFound(Uuid),

    #[error("外部操作 ID 已被不同的请求使用: {external_operation_id}")]
    IdempotencyConflict { external_operation_id: String },

    #[error("积分余额溢出")]
    BalanceOverflow,

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 系统错误 ===
    #[error("并发冲突，请重试")]
    ConcurrencyConflict,

    #[error("获取用户锁超时: {0}")]
    LockTimeout(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
}

/// 积分账本 Result 类型别名
pub type Result<T> = std::result::Result<T, BonusError>;

impl BonusError {
    /// 检查是否为可重试的错误
    ///
    /// 服务内部只对 `ConcurrencyConflict` 做重试，锁超时交给调用方重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::ConcurrencyConflict | Self::LockTimeout(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::NegativeBalance { .. } => "NEGATIVE_BALANCE",
            Self::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            Self::IdempotencyConflict { .. } => "IDEMPOTENCY_CONFLICT",
            Self::BalanceOverflow => "BALANCE_OVERFLOW",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// 映射到 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_)
            | Self::InsufficientBalance { .. }
            | Self::NegativeBalance { .. }
            | Self::BalanceOverflow
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OperationNotFound(_) => StatusCode::NOT_FOUND,
            Self::IdempotencyConflict { .. } => StatusCode::CONFLICT,
            Self::ConcurrencyConflict | Self::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BonusError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for BonusError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
