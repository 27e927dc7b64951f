//! 积分流水存储层
//!
//! - 仓储只负责持久化和流水链校验，不包含业务规则
//! - `PgLedgerRepository` 用于生产环境，`InMemoryLedgerStore` 用于测试和本地运行

mod memory_store;
mod pg_repo;
mod traits;

pub use memory_store::InMemoryLedgerStore;
pub use pg_repo::{MIGRATOR, PgLedgerRepository};
pub use traits::*;
