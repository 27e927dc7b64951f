//! 服务层数据传输对象

use crate::models::BonusReason;

/// 变更操作的附加信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMeta {
    pub reason: BonusReason,
    pub description: Option<String>,
    /// 调用方幂等键，相同键的重复请求返回首次结果
    pub external_operation_id: Option<String>,
}

impl OperationMeta {
    pub fn new(reason: BonusReason) -> Self {
        Self {
            reason,
            description: None,
            external_operation_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_external_id(mut self, external_operation_id: impl Into<String>) -> Self {
        self.external_operation_id = Some(external_operation_id.into());
        self
    }
}

/// 历史查询分页上限
pub const MAX_PAGE_SIZE: i64 = 100;

/// user_id 与 external_operation_id 的最大字符数，与表结构的 VARCHAR(128) 一致
pub const MAX_ID_LEN: usize = 128;

pub const MAX_DESCRIPTION_LEN: usize = 500;
