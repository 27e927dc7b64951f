//! 内存积分流水存储
//!
//! 使用 DashMap 保存每个用户的流水链，适用于测试、基准测试和无数据库的本地运行。

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::traits::LedgerStore;
use crate::error::{BonusError, Result};
use crate::models::BonusOperation;

/// 内存积分流水存储
///
/// 每个用户的流水按 `sequence_no` 升序保存，倒序即为时间倒序。
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    chains: DashMap<String, Vec<BonusOperation>>,
    /// operation_id -> (user_id, 链中下标)
    index: DashMap<Uuid, (String, usize)>,
    /// (user_id, external_operation_id) -> operation_id
    external_index: DashMap<(String, String), Uuid>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部流水条数
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn latest(&self, user_id: &str) -> Result<Option<BonusOperation>> {
        Ok(self
            .chains
            .get(user_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn append(&self, operation: &BonusOperation) -> Result<()> {
        if self.index.contains_key(&operation.operation_id) {
            return Err(BonusError::ConcurrencyConflict);
        }

        // entry 持有分片写锁，校验和写入在同一临界区内完成
        let mut chain = self.chains.entry(operation.user_id.clone()).or_default();

        if !operation.follows(chain.last()) {
            return Err(BonusError::ConcurrencyConflict);
        }

        let external_key = operation
            .external_operation_id
            .as_ref()
            .map(|ext| (operation.user_id.clone(), ext.clone()));
        if let Some(key) = &external_key
            && self.external_index.contains_key(key)
        {
            return Err(BonusError::ConcurrencyConflict);
        }

        let position = chain.len();
        chain.push(operation.clone());
        self.index.insert(
            operation.operation_id,
            (operation.user_id.clone(), position),
        );
        if let Some(key) = external_key {
            self.external_index.insert(key, operation.operation_id);
        }

        Ok(())
    }

    async fn find_by_id(&self, operation_id: Uuid) -> Result<Option<BonusOperation>> {
        let Some((user_id, position)) = self.index.get(&operation_id).map(|e| e.value().clone())
        else {
            return Ok(None);
        };

        Ok(self
            .chains
            .get(&user_id)
            .and_then(|chain| chain.get(position).cloned()))
    }

    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_operation_id: &str,
    ) -> Result<Option<BonusOperation>> {
        let key = (user_id.to_string(), external_operation_id.to_string());
        let Some(operation_id) = self.external_index.get(&key).map(|e| *e.value()) else {
            return Ok(None);
        };

        self.find_by_id(operation_id).await
    }

    async fn history_page(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<BonusOperation>)> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);

        // 分片读锁内同时取总数和本页
        let Some(chain) = self.chains.get(user_id) else {
            return Ok((0, Vec::new()));
        };
        let items = chain
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok((chain.len() as i64, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BonusReason, OperationKind};
    use chrono::Utc;

    fn op(user_id: &str, sequence_no: i64, delta: i64, balance_after: i64) -> BonusOperation {
        BonusOperation {
            operation_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            sequence_no,
            kind: OperationKind::Adjust,
            delta,
            balance_after,
            reason: BonusReason::SupportAdjustment,
            description: None,
            external_operation_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryLedgerStore::new();
        assert!(store.latest("u1").await.unwrap().is_none());

        store.append(&op("u1", 1, 100, 100)).await.unwrap();
        store.append(&op("u1", 2, 50, 150)).await.unwrap();

        let latest = store.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.balance_after, 150);
        assert_eq!(store.history_page("u1", 1, 0).await.unwrap().0, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_broken_chain() {
        let store = InMemoryLedgerStore::new();
        store.append(&op("u1", 1, 100, 100)).await.unwrap();

        // 序号重复
        let err = store.append(&op("u1", 1, 10, 110)).await.unwrap_err();
        assert!(matches!(err, BonusError::ConcurrencyConflict));

        // 余额链不连续
        let err = store.append(&op("u1", 2, 10, 200)).await.unwrap_err();
        assert!(matches!(err, BonusError::ConcurrencyConflict));

        assert_eq!(store.history_page("u1", 1, 0).await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_external_id() {
        let store = InMemoryLedgerStore::new();
        let mut first = op("u1", 1, 100, 100);
        first.external_operation_id = Some("ext-1".to_string());
        store.append(&first).await.unwrap();

        let mut second = op("u1", 2, 100, 200);
        second.external_operation_id = Some("ext-1".to_string());
        let err = store.append(&second).await.unwrap_err();
        assert!(matches!(err, BonusError::ConcurrencyConflict));

        let found = store.find_by_external_id("u1", "ext-1").await.unwrap();
        assert_eq!(found.map(|o| o.operation_id), Some(first.operation_id));
        assert!(store.find_by_external_id("u2", "ext-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = InMemoryLedgerStore::new();
        let first = op("u1", 1, 100, 100);
        store.append(&first).await.unwrap();

        let found = store.find_by_id(first.operation_id).await.unwrap();
        assert_eq!(found, Some(first));
        assert!(store.find_by_id(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_offset() {
        let store = InMemoryLedgerStore::new();
        let mut balance = 0;
        for seq in 1..=5 {
            balance += 10;
            store.append(&op("u1", seq, 10, balance)).await.unwrap();
        }

        let (total, page) = store.history_page("u1", 2, 1).await.unwrap();
        let seqs: Vec<i64> = page.iter().map(|o| o.sequence_no).collect();
        assert_eq!(total, 5);
        assert_eq!(seqs, vec![4, 3]);

        let (total, page) = store.history_page("u1", 2, 10).await.unwrap();
        assert_eq!(total, 5);
        assert!(page.is_empty());
        assert_eq!(store.history_page("nobody", 2, 0).await.unwrap(), (0, Vec::new()));
    }

    #[tokio::test]
    async fn test_external_id_lookup_is_scoped_per_user() {
        let store = InMemoryLedgerStore::new();
        let mut balance = 0;
        for seq in 1..=50 {
            balance += 1;
            let mut next = op("u1", seq, 1, balance);
            next.external_operation_id = Some(format!("ext-{seq}"));
            store.append(&next).await.unwrap();
        }
        let mut other = op("u2", 1, 1, 1);
        other.external_operation_id = Some("ext-7".to_string());
        store.append(&other).await.unwrap();

        let found = store.find_by_external_id("u1", "ext-7").await.unwrap().unwrap();
        assert_eq!(found.sequence_no, 7);
        assert_eq!(found.user_id, "u1");

        let found = store.find_by_external_id("u2", "ext-7").await.unwrap().unwrap();
        assert_eq!(found.operation_id, other.operation_id);

        assert!(store.find_by_external_id("u1", "ext-51").await.unwrap().is_none());
    }
}
