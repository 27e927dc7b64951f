//! 用户级锁模块
//!
//! 同一用户的"读余额 + 追加流水"在进程内串行执行，
//! 通过 `UserLockGuard` 的 RAII 语义保证请求取消时锁也会释放。
//!
//! ```ignore
//! let locks = UserLockManager::new(LockConfig::default());
//! let _guard = locks.acquire("user-123").await?;
//! // 读取余额并追加流水
//! ```

mod lock_manager;

pub use lock_manager::{LockConfig, UserLockGuard, UserLockManager};
