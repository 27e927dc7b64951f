//! PostgreSQL 积分流水仓储
//!
//! 通过条件插入实现乐观并发：只有当新流水正好接在已存尾部之后时才写入。

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::instrument;
use uuid::Uuid;

use super::traits::LedgerStore;
use crate::error::{BonusError, Result};
use crate::models::BonusOperation;

/// 内嵌的数据库迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SELECT_COLUMNS: &str = r#"
    SELECT operation_id, user_id, sequence_no, kind, delta, balance_after,
           reason, description, external_operation_id, created_at
    FROM bonus_operations
"#;

/// 积分流水仓储
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 唯一约束冲突说明并发写入抢先占用了序号或幂等键
fn map_insert_error(err: sqlx::Error) -> BonusError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return BonusError::ConcurrencyConflict;
    }
    BonusError::Database(err)
}

#[async_trait]
impl LedgerStore for PgLedgerRepository {
    #[instrument(skip(self))]
    async fn latest(&self, user_id: &str) -> Result<Option<BonusOperation>> {
        let sql = format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC, sequence_no DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let op = sqlx::query_as::<_, BonusOperation>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(op)
    }

    #[instrument(
        skip(self, operation),
        fields(user_id = %operation.user_id, sequence_no = operation.sequence_no)
    )]
    async fn append(&self, operation: &BonusOperation) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO bonus_operations (
                operation_id, user_id, sequence_no, kind, delta, balance_after,
                reason, description, external_operation_id, created_at
            )
            SELECT $1::uuid, $2::varchar, $3::bigint, $4::varchar, $5::bigint, $6::bigint,
                   $7::varchar, $8::text, $9::varchar, $10::timestamptz
            WHERE (
                SELECT COALESCE(MAX(sequence_no), 0)
                FROM bonus_operations
                WHERE user_id = $2
            ) = $3 - 1
            AND COALESCE((
                SELECT balance_after
                FROM bonus_operations
                WHERE user_id = $2
                ORDER BY sequence_no DESC
                LIMIT 1
            ), 0) + $5 = $6
            "#,
        )
        .bind(operation.operation_id)
        .bind(&operation.user_id)
        .bind(operation.sequence_no)
        .bind(operation.kind)
        .bind(operation.delta)
        .bind(operation.balance_after)
        .bind(operation.reason)
        .bind(&operation.description)
        .bind(&operation.external_operation_id)
        .bind(operation.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        if result.rows_affected() == 0 {
            return Err(BonusError::ConcurrencyConflict);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, operation_id: Uuid) -> Result<Option<BonusOperation>> {
        let sql = format!("{} WHERE operation_id = $1", SELECT_COLUMNS);
        let op = sqlx::query_as::<_, BonusOperation>(&sql)
            .bind(operation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(op)
    }

    #[instrument(skip(self))]
    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_operation_id: &str,
    ) -> Result<Option<BonusOperation>> {
        let sql = format!(
            "{} WHERE user_id = $1 AND external_operation_id = $2",
            SELECT_COLUMNS
        );
        let op = sqlx::query_as::<_, BonusOperation>(&sql)
            .bind(user_id)
            .bind(external_operation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(op)
    }

    /// 计数与分页查询在同一个 REPEATABLE READ 事务内执行
    #[instrument(skip(self))]
    async fn history_page(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<BonusOperation>)> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bonus_operations WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let items = if offset >= total {
            Vec::new()
        } else {
            let sql = format!(
                "{} WHERE user_id = $1 ORDER BY created_at DESC, sequence_no DESC LIMIT $2 OFFSET $3",
                SELECT_COLUMNS
            );
            sqlx::query_as::<_, BonusOperation>(&sql)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *tx)
                .await?
        };

        tx.commit().await?;

        Ok((total, items))
    }
}
