use crate::models::DbBalance;
use crate::Result;
use sqlx::{PgExecutor, PgPool};

pub struct BalanceRepository;

impl BalanceRepository {
    /// Atomically credit an earning: `available` and `total_earned` both grow
    /// by `amount`, creating the row on first touch.
    pub async fn credit<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, available, pending, total_earned, total_withdrawn, currency, updated_at)
            VALUES ($1, $2, 0, $2, 0, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                available = balances.available + EXCLUDED.available,
                total_earned = balances.total_earned + EXCLUDED.total_earned,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(currency)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Get balance by user
    pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<DbBalance>> {
        let result =
            sqlx::query_as::<_, DbBalance>("SELECT * FROM balances WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(result)
    }

    /// Guarded available -> pending move. Returns false when the guard fails,
    /// i.e. a concurrent spend already drained `available`.
    pub async fn try_reserve<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: &str,
        amount: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET available = available - $2, pending = pending + $2, updated_at = NOW()
            WHERE user_id = $1 AND available >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Settle a reserved amount: completed moves pending into
    /// `total_withdrawn`, failed restores it to `available`.
    pub async fn settle<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: &str,
        amount: i64,
        completed: bool,
    ) -> Result<()> {
        let sql = if completed {
            r#"
            UPDATE balances
            SET pending = pending - $2, total_withdrawn = total_withdrawn + $2, updated_at = NOW()
            WHERE user_id = $1
            "#
        } else {
            r#"
            UPDATE balances
            SET pending = pending - $2, available = available + $2, updated_at = NOW()
            WHERE user_id = $1
            "#
        };
        sqlx::query(sql)
            .bind(user_id)
            .bind(amount)
            .execute(executor)
            .await?;
        Ok(())
    }
}
