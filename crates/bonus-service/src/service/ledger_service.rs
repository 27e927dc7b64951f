//! 积分账本服务
//!
//! 处理积分变更的核心业务逻辑：
//! - 参数校验（在访问存储之前完成）
//! - 幂等重放（按 user_id + external_operation_id）
//! - 余额规则（余额不足、调整后为负、溢出）
//! - 追加流水与乐观并发冲突重试
//!
//! ## 变更流程
//!
//! 1. 参数校验 -> 2. 获取用户锁 -> 3. 幂等检查 -> 4. 读取最新流水
//!    -> 5. 计算新余额 -> 6. 条件追加（冲突时退避后回到 3）

use std::sync::Arc;
use std::time::Instant;

use bonus_shared::config::LedgerConfig;
use bonus_shared::observability::metrics;
use bonus_shared::retry::{RetryPolicy, retry_with_policy};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{BonusError, Result};
use crate::lock::{LockConfig, UserLockManager};
use crate::models::{BalanceSnapshot, BonusOperation, HistoryPage, LedgerReceipt, OperationKind};
use crate::repository::LedgerStore;
use crate::service::dto::{MAX_DESCRIPTION_LEN, MAX_ID_LEN, MAX_PAGE_SIZE, OperationMeta};

/// 前一条流水时间超前本机时钟多于该值时告警
const CLOCK_SKEW_WARN_MS: i64 = 1_000;

/// 积分账本服务
///
/// 当前余额始终由最新流水推导，不单独存储
pub struct BonusLedgerService {
    store: Arc<dyn LedgerStore>,
    locks: UserLockManager,
    retry_policy: RetryPolicy,
}

impl BonusLedgerService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        lock_config: LockConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            locks: UserLockManager::new(lock_config),
            retry_policy,
        }
    }

    pub fn with_defaults(store: Arc<dyn LedgerStore>) -> Self {
        Self::new(store, LockConfig::default(), RetryPolicy::default())
    }

    /// 按账本配置创建
    pub fn from_config(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self::new(
            store,
            LockConfig::from_millis(config.lock_timeout_ms),
            RetryPolicy::from_millis(config.conflict_max_retries, config.conflict_retry_delay_ms),
        )
    }

    /// 获得积分
    #[instrument(skip(self, meta), fields(user_id = %user_id))]
    pub async fn earn(
        &self,
        user_id: &str,
        amount: i64,
        meta: OperationMeta,
    ) -> Result<LedgerReceipt> {
        validate_user_id(user_id)?;
        validate_meta(&meta)?;
        validate_amount(amount)?;
        self.mutate(user_id, OperationKind::Earn, amount, meta).await
    }

    /// 使用积分
    #[instrument(skip(self, meta), fields(user_id = %user_id))]
    pub async fn apply(
        &self,
        user_id: &str,
        amount: i64,
        meta: OperationMeta,
    ) -> Result<LedgerReceipt> {
        validate_user_id(user_id)?;
        validate_meta(&meta)?;
        validate_amount(amount)?;
        let delta = amount.checked_neg().ok_or(BonusError::InvalidAmount(amount))?;
        self.mutate(user_id, OperationKind::Apply, delta, meta).await
    }

    /// 调整积分，delta 可为任意符号（包括 0）
    #[instrument(skip(self, meta), fields(user_id = %user_id))]
    pub async fn adjust(
        &self,
        user_id: &str,
        delta: i64,
        meta: OperationMeta,
    ) -> Result<LedgerReceipt> {
        validate_user_id(user_id)?;
        validate_meta(&meta)?;
        self.mutate(user_id, OperationKind::Adjust, delta, meta).await
    }

    /// 查询当前余额
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_balance(&self, user_id: &str) -> Result<BalanceSnapshot> {
        validate_user_id(user_id)?;
        let latest = self.store.latest(user_id).await?;
        Ok(BalanceSnapshot::from_latest(user_id, latest.as_ref(), Utc::now()))
    }

    /// 分页查询流水历史（时间倒序）
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_history(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<HistoryPage> {
        validate_user_id(user_id)?;
        if page < 1 {
            return Err(BonusError::Validation(format!("page 必须大于等于 1: {}", page)));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(BonusError::Validation(format!(
                "page_size 必须在 1 到 {} 之间: {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| BonusError::Validation(format!("page 超出范围: {}", page)))?;

        let (total_items, items) = self.store.history_page(user_id, page_size, offset).await?;

        Ok(HistoryPage::new(items, total_items, page, page_size))
    }

    /// 按 ID 查询单条流水
    #[instrument(skip(self))]
    pub async fn get_operation(&self, operation_id: Uuid) -> Result<BonusOperation> {
        self.store
            .find_by_id(operation_id)
            .await?
            .ok_or(BonusError::OperationNotFound(operation_id))
    }

    /// 加锁执行变更并记录指标
    async fn mutate(
        &self,
        user_id: &str,
        kind: OperationKind,
        delta: i64,
        meta: OperationMeta,
    ) -> Result<LedgerReceipt> {
        let start = Instant::now();
        let result = self.mutate_locked(user_id, kind, delta, &meta).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(receipt) if receipt.replayed => {
                metrics::record_bonus_replay(kind.as_str());
                metrics::record_bonus_operation(kind.as_str(), "replayed", elapsed);
                info!(
                    operation_id = %receipt.operation.operation_id,
                    external_operation_id = ?meta.external_operation_id,
                    "幂等重放，返回已有流水"
                );
            }
            Ok(receipt) => {
                metrics::record_bonus_operation(kind.as_str(), "success", elapsed);
                info!(
                    operation_id = %receipt.operation.operation_id,
                    kind = %kind,
                    delta,
                    balance_after = receipt.balance,
                    "积分流水已写入"
                );
            }
            Err(e) => {
                metrics::record_bonus_operation(kind.as_str(), e.error_code(), elapsed);
                if !e.is_business_error() {
                    warn!(kind = %kind, error = %e, "积分变更失败");
                }
            }
        }

        result
    }

    async fn mutate_locked(
        &self,
        user_id: &str,
        kind: OperationKind,
        delta: i64,
        meta: &OperationMeta,
    ) -> Result<LedgerReceipt> {
        let _guard = self.locks.acquire(user_id).await?;

        let service = self;
        retry_with_policy(
            &self.retry_policy,
            "bonus_append",
            |e: &BonusError| {
                let retryable = e.is_retryable();
                if retryable {
                    metrics::record_conflict_retry();
                }
                retryable
            },
            move || service.try_append(user_id, kind, delta, meta),
        )
        .await
    }

    /// 单次尝试：幂等检查、读取尾部、计算并条件追加
    async fn try_append(
        &self,
        user_id: &str,
        kind: OperationKind,
        delta: i64,
        meta: &OperationMeta,
    ) -> Result<LedgerReceipt> {
        if let Some(ext) = meta.external_operation_id.as_deref()
            && let Some(existing) = self.store.find_by_external_id(user_id, ext).await?
        {
            if existing.kind != kind || existing.delta != delta {
                return Err(BonusError::IdempotencyConflict {
                    external_operation_id: ext.to_string(),
                });
            }
            return Ok(LedgerReceipt::replayed(existing));
        }

        let latest = self.store.latest(user_id).await?;
        let current = latest.as_ref().map(|op| op.balance_after).unwrap_or(0);
        let balance_after = next_balance(kind, current, delta)?;

        let now = Utc::now();
        let (sequence_no, created_at) = match &latest {
            Some(prev) => (prev.sequence_no + 1, next_created_at(prev, now)),
            None => (1, now),
        };

        let operation = BonusOperation {
            operation_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            sequence_no,
            kind,
            delta,
            balance_after,
            reason: meta.reason,
            description: meta.description.clone(),
            external_operation_id: meta.external_operation_id.clone(),
            created_at,
        };

        self.store.append(&operation).await?;

        Ok(LedgerReceipt::created(operation))
    }
}

/// 按操作类型校验余额规则并计算新余额
fn next_balance(kind: OperationKind, current: i64, delta: i64) -> Result<i64> {
    match kind {
        OperationKind::Earn => current.checked_add(delta).ok_or(BonusError::BalanceOverflow),
        OperationKind::Apply => {
            let required = -delta;
            if current < required {
                return Err(BonusError::InsufficientBalance {
                    required,
                    available: current,
                });
            }
            Ok(current - required)
        }
        OperationKind::Adjust => {
            let balance = current.checked_add(delta).ok_or(BonusError::BalanceOverflow)?;
            if balance < 0 {
                return Err(BonusError::NegativeBalance {
                    balance: current,
                    delta,
                });
            }
            Ok(balance)
        }
    }
}

/// 新流水时间不早于前一条；前一条明显超前时说明某个实例时钟偏快
fn next_created_at(prev: &BonusOperation, now: DateTime<Utc>) -> DateTime<Utc> {
    if prev.created_at <= now {
        return now;
    }
    let ahead = prev.created_at - now;
    if ahead > TimeDelta::milliseconds(CLOCK_SKEW_WARN_MS) {
        warn!(
            user_id = %prev.user_id,
            previous_operation_id = %prev.operation_id,
            ahead_ms = ahead.num_milliseconds(),
            "上一条流水时间超前本机时钟，新流水时间沿用上一条"
        );
    }
    prev.created_at
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(BonusError::InvalidAmount(amount));
    }
    Ok(())
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(BonusError::Validation("user_id 不能为空".to_string()));
    }
    if user_id.chars().count() > MAX_ID_LEN {
        return Err(BonusError::Validation(format!(
            "user_id 不能超过{}个字符",
            MAX_ID_LEN
        )));
    }
    Ok(())
}

fn validate_meta(meta: &OperationMeta) -> Result<()> {
    if let Some(ext) = meta.external_operation_id.as_deref()
        && !(1..=MAX_ID_LEN).contains(&ext.chars().count())
    {
        return Err(BonusError::Validation(format!(
            "external_operation_id 长度必须在1-{}个字符之间",
            MAX_ID_LEN
        )));
    }
    if let Some(description) = meta.description.as_deref()
        && description.chars().count() > MAX_DESCRIPTION_LEN
    {
        return Err(BonusError::Validation(format!(
            "description 不能超过{}个字符",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}
