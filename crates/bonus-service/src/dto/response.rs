//! 响应 DTO 定义

use serde::Serialize;

use crate::models::{BonusOperation, HistoryPage, LedgerReceipt};

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl From<HistoryPage> for PageResponse<BonusOperation> {
    fn from(page: HistoryPage) -> Self {
        Self {
            items: page.items,
            total: page.total_items,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 幂等重放的成功响应
    pub fn replayed(data: T) -> Self {
        Self {
            success: true,
            code: "REPLAYED".to_string(),
            message: "重复请求，返回首次处理结果".to_string(),
            data: Some(data),
        }
    }
}

/// 积分变更回执
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub operation: BonusOperation,
    pub balance: i64,
    pub replayed: bool,
}

impl From<LedgerReceipt> for ReceiptDto {
    fn from(receipt: LedgerReceipt) -> Self {
        Self {
            operation: receipt.operation,
            balance: receipt.balance,
            replayed: receipt.replayed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_response_from_empty_history() {
        let page: PageResponse<BonusOperation> = HistoryPage::new(vec![], 0, 1, 20).into();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["totalPages"], 0);
        assert_eq!(json["pageSize"], 20);
        assert_eq!(json["items"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_api_response_success() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["code"], "SUCCESS");
        assert_eq!(json["data"], 42);
    }
}
