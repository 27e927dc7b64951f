//! 基础设施错误类型
//!
//! 覆盖配置加载、数据库连接与迁移等与业务无关的失败。

use thiserror::Error;

/// 基础设施错误
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),
}

/// 基础设施 Result 类型别名
pub type Result<T> = std::result::Result<T, InfraError>;
