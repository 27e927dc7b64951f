//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体存储，支持 PostgreSQL、内存实现和 mock 测试

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::BonusOperation;

/// 积分流水存储接口
///
/// 只追加、不修改。实现方负责流水链一致性校验：
/// 新流水的 `sequence_no` 必须是已存尾部的后继，且
/// `balance_after = 前一条 balance_after + delta`，否则返回 `ConcurrencyConflict`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 用户最新一条流水（按 created_at、sequence_no 倒序）
    async fn latest(&self, user_id: &str) -> Result<Option<BonusOperation>>;

    /// 追加一条流水
    async fn append(&self, operation: &BonusOperation) -> Result<()>;

    async fn find_by_id(&self, operation_id: Uuid) -> Result<Option<BonusOperation>>;

    /// 按调用方幂等键查找
    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_operation_id: &str,
    ) -> Result<Option<BonusOperation>>;

    /// 按时间倒序分页列出用户流水，同时返回该用户的流水总数
    ///
    /// 总数与本页条目来自同一份快照
    async fn history_page(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<BonusOperation>)>;
}
