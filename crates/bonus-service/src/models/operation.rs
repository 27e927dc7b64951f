//! 积分流水实体定义
//!
//! 流水一经写入不可修改，余额由用户最新一条流水的 `balance_after` 推导

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BonusReason, OperationKind};

/// 积分流水
///
/// 每次 earn/apply/adjust 产生一条，按用户组成以 `sequence_no` 递增的链
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BonusOperation {
    /// 全局唯一 ID（UUID v7）
    pub operation_id: Uuid,
    /// 用户 ID
    pub user_id: String,
    /// 在用户流水链中的位置，从 1 开始
    pub sequence_no: i64,
    /// 操作类型
    pub kind: OperationKind,
    /// 变动值（正数增加，负数减少）
    pub delta: i64,
    /// 本次变动后的余额
    pub balance_after: i64,
    /// 变动原因
    pub reason: BonusReason,
    /// 备注
    #[sqlx(default)]
    pub description: Option<String>,
    /// 调用方提供的幂等键
    #[sqlx(default)]
    pub external_operation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BonusOperation {
    /// 变动前的余额
    pub fn balance_before(&self) -> i64 {
        self.balance_after - self.delta
    }

    /// 检查 `self` 是否可以接在 `previous` 之后
    ///
    /// 要求序号连续、余额链正确且余额非负
    pub fn follows(&self, previous: Option<&BonusOperation>) -> bool {
        let (prev_seq, prev_balance) = previous
            .map(|p| (p.sequence_no, p.balance_after))
            .unwrap_or((0, 0));

        self.sequence_no == prev_seq + 1
            && prev_balance.checked_add(self.delta) == Some(self.balance_after)
            && self.balance_after >= 0
    }
}

/// 用户余额快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub user_id: String,
    pub balance: i64,
    /// 最新流水时间，无流水时为查询时刻
    pub as_of: DateTime<Utc>,
    /// 是否存在任何流水
    pub has_history: bool,
    pub last_operation_id: Option<Uuid>,
}

impl BalanceSnapshot {
    /// 从用户最新流水构造
    pub fn from_latest(user_id: &str, latest: Option<&BonusOperation>, now: DateTime<Utc>) -> Self {
        match latest {
            Some(op) => Self {
                user_id: user_id.to_string(),
                balance: op.balance_after,
                as_of: op.created_at,
                has_history: true,
                last_operation_id: Some(op.operation_id),
            },
            None => Self {
                user_id: user_id.to_string(),
                balance: 0,
                as_of: now,
                has_history: false,
                last_operation_id: None,
            },
        }
    }
}

/// 变更操作的回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub operation: BonusOperation,
    /// 操作后的余额
    pub balance: i64,
    /// 是否为幂等重放（未写入新流水）
    pub replayed: bool,
}

impl LedgerReceipt {
    pub fn created(operation: BonusOperation) -> Self {
        Self {
            balance: operation.balance_after,
            operation,
            replayed: false,
        }
    }

    pub fn replayed(operation: BonusOperation) -> Self {
        Self {
            balance: operation.balance_after,
            operation,
            replayed: true,
        }
    }
}

/// 流水分页结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// 按时间倒序
    pub items: Vec<BonusOperation>,
    pub total_items: i64,
    pub total_pages: i64,
    pub page: i64,
    pub page_size: i64,
}

impl HistoryPage {
    pub fn new(items: Vec<BonusOperation>, total_items: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + page_size - 1) / page_size
        };

        Self {
            items,
            total_items,
            total_pages,
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(sequence_no: i64, delta: i64, balance_after: i64) -> BonusOperation {
        BonusOperation {
            operation_id: Uuid::now_v7(),
            user_id: "user-1".to_string(),
            sequence_no,
            kind: if delta >= 0 {
                OperationKind::Earn
            } else {
                OperationKind::Apply
            },
            delta,
            balance_after,
            reason: BonusReason::Purchase,
            description: None,
            external_operation_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_follows_first_operation() {
        assert!(op(1, 100, 100).follows(None));
        assert!(!op(2, 100, 100).follows(None));
        assert!(!op(1, 100, 90).follows(None));
    }

    #[test]
    fn test_follows_checks_chain() {
        let prev = op(3, 50, 150);
        assert!(op(4, -75, 75).follows(Some(&prev)));
        assert!(!op(4, -75, 80).follows(Some(&prev)));
        assert!(!op(5, -75, 75).follows(Some(&prev)));
        assert!(!op(4, -200, -50).follows(Some(&prev)));
    }

    #[test]
    fn test_follows_rejects_overflow() {
        let prev = op(1, i64::MAX, i64::MAX);
        assert!(!op(2, 1, i64::MIN).follows(Some(&prev)));
    }

    #[test]
    fn test_balance_before() {
        assert_eq!(op(2, -75, 275).balance_before(), 350);
    }

    #[test]
    fn test_snapshot_without_history() {
        let now = Utc::now();
        let snapshot = BalanceSnapshot::from_latest("user-1", None, now);
        assert_eq!(snapshot.balance, 0);
        assert_eq!(snapshot.as_of, now);
        assert!(!snapshot.has_history);
        assert!(snapshot.last_operation_id.is_none());
    }

    #[test]
    fn test_snapshot_from_latest() {
        let latest = op(2, 50, 150);
        let snapshot = BalanceSnapshot::from_latest("user-1", Some(&latest), Utc::now());
        assert_eq!(snapshot.balance, 150);
        assert_eq!(snapshot.as_of, latest.created_at);
        assert_eq!(snapshot.last_operation_id, Some(latest.operation_id));
    }

    #[test]
    fn test_history_page_total_pages() {
        assert_eq!(HistoryPage::new(vec![], 0, 1, 20).total_pages, 0);
        assert_eq!(HistoryPage::new(vec![], 1, 1, 20).total_pages, 1);
        assert_eq!(HistoryPage::new(vec![], 20, 1, 20).total_pages, 1);
        assert_eq!(HistoryPage::new(vec![], 21, 1, 20).total_pages, 2);
    }

    #[test]
    fn test_operation_serializes_camel_case() {
        let json = serde_json::to_value(op(1, 100, 100)).unwrap();
        assert_eq!(json["balanceAfter"], 100);
        assert_eq!(json["sequenceNo"], 1);
        assert_eq!(json["kind"], "earn");
        assert!(json["externalOperationId"].is_null());
    }
}
