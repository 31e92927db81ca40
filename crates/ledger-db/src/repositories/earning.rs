use crate::models::DbEarning;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

pub struct EarningRepository;

impl EarningRepository {
    /// Insert unless the idempotency key is already taken. Returns false on a
    /// duplicate; nothing is written in that case.
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, earning: &DbEarning) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO earnings (id, user_id, kind, amount, currency, description, metadata, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(earning.id)
        .bind(&earning.user_id)
        .bind(&earning.kind)
        .bind(earning.amount)
        .bind(&earning.currency)
        .bind(&earning.description)
        .bind(&earning.metadata)
        .bind(&earning.idempotency_key)
        .bind(earning.created_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the earning holding an idempotency key
    pub async fn get_by_key(pool: &PgPool, idempotency_key: &str) -> Result<Option<DbEarning>> {
        let result = sqlx::query_as::<_, DbEarning>(
            "SELECT * FROM earnings WHERE idempotency_key = $1",
        )
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await?;
        Ok(result)
    }

    /// Newest-first page of a user's history
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbEarning>> {
        let results = sqlx::query_as::<_, DbEarning>(
            r#"
            SELECT * FROM earnings
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(results)
    }

    /// Sum of a user's earnings at/after `since`, excluding the given kinds
    pub async fn sum_since(
        pool: &PgPool,
        user_id: &str,
        since: DateTime<Utc>,
        exclude: &[String],
    ) -> Result<i64> {
        let (sum,): (Option<i64>,) = sqlx::query_as(
            r#"
            SELECT SUM(amount) FROM earnings
            WHERE user_id = $1 AND created_at >= $2 AND kind != ALL($3)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(exclude)
        .fetch_one(pool)
        .await?;
        Ok(sum.unwrap_or(0))
    }
}
