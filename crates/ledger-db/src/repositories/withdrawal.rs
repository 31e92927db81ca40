use crate::models::DbWithdrawal;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

pub struct WithdrawalRepository;

impl WithdrawalRepository {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        withdrawal: &DbWithdrawal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests
                (id, user_id, amount, currency, payment_method, payment_details, fee_amount,
                 status, gateway_reference, failure_reason, created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(withdrawal.id)
        .bind(&withdrawal.user_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.currency)
        .bind(&withdrawal.payment_method)
        .bind(&withdrawal.payment_details)
        .bind(withdrawal.fee_amount)
        .bind(&withdrawal.status)
        .bind(&withdrawal.gateway_reference)
        .bind(&withdrawal.failure_reason)
        .bind(withdrawal.created_at)
        .bind(withdrawal.processed_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Get a request by id
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<DbWithdrawal>> {
        let result = sqlx::query_as::<_, DbWithdrawal>(
            "SELECT * FROM withdrawal_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(result)
    }

    /// Get a request by id with a row lock, for a status decision inside a
    /// transaction.
    pub async fn get_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<DbWithdrawal>> {
        let result = sqlx::query_as::<_, DbWithdrawal>(
            "SELECT * FROM withdrawal_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(result)
    }

    /// Overwrite the status columns of a locked row
    pub async fn update_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: &str,
        gateway_reference: Option<&str>,
        failure_reason: Option<&str>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2, gateway_reference = $3, failure_reason = $4, processed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(gateway_reference)
        .bind(failure_reason)
        .bind(processed_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Sum of amounts counted against the weekly cap: pending, processing and
    /// completed requests created at/after `week_start`. Takes any executor
    /// so the reserve path can run it inside its transaction.
    pub async fn weekly_total<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<i64> {
        let (sum,): (Option<i64>,) = sqlx::query_as(
            r#"
            SELECT SUM(amount) FROM withdrawal_requests
            WHERE user_id = $1
              AND created_at >= $2
              AND status IN ('pending', 'processing', 'completed')
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .fetch_one(executor)
        .await?;
        Ok(sum.unwrap_or(0))
    }
}
