//! 用户锁管理器
//!
//! 按用户串行化余额读取和流水追加，不同用户之间互不阻塞。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use crate::error::{BonusError, Result};

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 获取锁的最长等待时间
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl LockConfig {
    pub fn from_millis(acquire_timeout_ms: u64) -> Self {
        Self {
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
        }
    }
}

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// 进程内用户锁管理器
///
/// 锁表按用户 ID 索引，条目在最后一个持有者释放后移除
#[derive(Debug, Default)]
pub struct UserLockManager {
    locks: Arc<LockTable>,
    config: LockConfig,
}

impl UserLockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 获取用户锁
    ///
    /// 超过 `acquire_timeout` 仍未获取到时返回 `LockTimeout`
    #[instrument(skip(self))]
    pub async fn acquire(&self, user_id: &str) -> Result<UserLockGuard> {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.config.acquire_timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(user_id = %user_id, "User lock acquired");
                Ok(UserLockGuard {
                    guard: Some(guard),
                    user_id: user_id.to_string(),
                    locks: Arc::clone(&self.locks),
                })
            }
            Err(_) => {
                warn!(
                    user_id = %user_id,
                    timeout = ?self.config.acquire_timeout,
                    "User lock timed out"
                );
                Err(BonusError::LockTimeout(user_id.to_string()))
            }
        }
    }

    /// 当前锁表条目数
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}

/// 用户锁守卫
///
/// Drop 时释放锁，无人等待时清理锁表条目
#[derive(Debug)]
pub struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: Arc<LockTable>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // 引用计数为 1 说明只剩锁表自身持有
        self.locks
            .remove_if(&self.user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
