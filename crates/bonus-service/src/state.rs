//! 应用状态定义

use std::sync::Arc;

use bonus_shared::database::Database;

use crate::repository::{InMemoryLedgerStore, LedgerStore};
use crate::service::BonusLedgerService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<BonusLedgerService>,
    /// 使用内存存储时为 None
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(ledger: Arc<BonusLedgerService>, db: Option<Database>) -> Self {
        Self { ledger, db }
    }

    /// 基于内存存储的状态，用于测试和本地调试
    pub fn in_memory() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        Self::new(Arc::new(BonusLedgerService::with_defaults(store)), None)
    }
}
