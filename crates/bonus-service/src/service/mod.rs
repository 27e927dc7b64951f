//! 业务服务层

pub mod dto;
mod ledger_service;

pub use dto::OperationMeta;
pub use ledger_service::BonusLedgerService;
