//! 积分账本服务
//!
//! 以只追加的流水记录用户积分变动，当前余额由最新一条流水推导。
//!
//! ## 模块结构
//!
//! - `models`: 流水实体、余额快照和枚举
//! - `repository`: 流水存储（PostgreSQL 与内存实现）
//! - `lock`: 进程内用户锁
//! - `service`: earn / apply / adjust 与查询
//! - `dto` / `handlers` / `routes`: HTTP 接口

pub mod dto;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{BonusError, Result};
pub use models::*;
pub use repository::{InMemoryLedgerStore, LedgerStore, PgLedgerRepository};
pub use service::{BonusLedgerService, OperationMeta};
