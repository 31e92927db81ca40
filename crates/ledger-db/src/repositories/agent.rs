use crate::Result;
use sqlx::PgPool;

pub struct AgentRepository;

impl AgentRepository {
    pub async fn set_agent(pool: &PgPool, user_id: &str, agent: bool) -> Result<()> {
        if agent {
            sqlx::query(
                r#"
                INSERT INTO agents (user_id, tier_id, updated_at)
                VALUES ($1, NULL, NOW())
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .execute(pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM agents WHERE user_id = $1")
                .bind(user_id)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    pub async fn is_agent(pool: &PgPool, user_id: &str) -> Result<bool> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM agents WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(result.is_some())
    }

    pub async fn set_tier(pool: &PgPool, user_id: &str, tier_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (user_id, tier_id, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET tier_id = EXCLUDED.tier_id, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(tier_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT user_id FROM agents ORDER BY user_id")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|(user,)| user).collect())
    }
}
