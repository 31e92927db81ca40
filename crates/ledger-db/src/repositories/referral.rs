use crate::Result;
use sqlx::PgPool;

pub struct ReferralRepository;

impl ReferralRepository {
    /// Record a direct edge (upsert on the referred side)
    pub async fn upsert(pool: &PgPool, referrer_id: &str, referred_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO referrals (referred_id, referrer_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (referred_id) DO UPDATE SET referrer_id = EXCLUDED.referrer_id
            "#,
        )
        .bind(referred_id)
        .bind(referrer_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Direct referrer of a user, if any
    pub async fn referrer_of(pool: &PgPool, user_id: &str) -> Result<Option<String>> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT referrer_id FROM referrals WHERE referred_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(result.map(|(referrer,)| referrer))
    }

    /// Count of users directly referred by `user_id`
    pub async fn direct_count(pool: &PgPool, user_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM referrals WHERE referrer_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}
