//! 请求 DTO 定义
//!
//! 反序列化阶段拒绝未知的 reason，validator 负责长度和分页范围校验

use serde::Deserialize;
use validator::Validate;

use crate::error::{BonusError, Result};
use crate::models::BonusReason;
use crate::service::OperationMeta;

/// 获得/使用积分请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    /// 积分数量，必须为正数
    pub amount: i64,
    pub reason: BonusReason,
    #[validate(length(max = 500, message = "备注不能超过500个字符"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 128, message = "外部操作 ID 长度必须在1-128个字符之间"))]
    pub external_operation_id: Option<String>,
}

impl AmountRequest {
    /// 校验字段并检查数量为正
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.amount <= 0 {
            return Err(BonusError::InvalidAmount(self.amount));
        }
        Ok(())
    }

    pub fn into_parts(self) -> (i64, OperationMeta) {
        (
            self.amount,
            OperationMeta {
                reason: self.reason,
                description: self.description,
                external_operation_id: self.external_operation_id,
            },
        )
    }
}

/// 调整积分请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    /// 调整值，可正可负
    pub delta: i64,
    pub reason: BonusReason,
    #[validate(length(max = 500, message = "备注不能超过500个字符"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 128, message = "外部操作 ID 长度必须在1-128个字符之间"))]
    pub external_operation_id: Option<String>,
}

impl AdjustRequest {
    pub fn into_parts(self) -> (i64, OperationMeta) {
        (
            self.delta,
            OperationMeta {
                reason: self.reason,
                description: self.description,
                external_operation_id: self.external_operation_id,
            },
        )
    }
}

/// 流水历史分页参数
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "页码必须大于等于1"))]
    pub page: i64,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "每页条数必须在1-100之间"))]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}
