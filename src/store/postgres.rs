use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::token::{Ability, ApiTokenRow, NewApiToken};

const TOKEN_COLUMNS: &str = "id, name, token_digest, abilities, expires_at, last_used_at, \
                             usage_count, is_active, description, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Partial update for a token record. `None` leaves the column untouched;
/// `expires_at` and `description` use double options so "clear the value"
/// is distinguishable from "leave it alone".
#[derive(Default)]
pub struct TokenUpdate {
    pub name: Option<String>,
    pub abilities: Option<Vec<Ability>>,
    pub expires_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Token Operations --

    pub async fn insert_token(&self, token: &NewApiToken) -> anyhow::Result<ApiTokenRow> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            r#"INSERT INTO api_tokens (name, token_digest, abilities, expires_at, description)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {TOKEN_COLUMNS}"#
        ))
        .bind(&token.name)
        .bind(&token.token_digest)
        .bind(Json(&token.abilities))
        .bind(token.expires_at)
        .bind(&token.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_token(&self, id: Uuid) -> anyhow::Result<Option<ApiTokenRow>> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Resolve a presented credential by its digest. Inactive records are
    /// filtered here so an unknown digest and a revoked token are
    /// indistinguishable to the caller.
    pub async fn find_token_by_digest(&self, digest: &str) -> anyhow::Result<Option<ApiTokenRow>> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE token_digest = $1 AND is_active = true"
        ))
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_tokens(&self) -> anyhow::Result<Vec<ApiTokenRow>> {
        let rows = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Record a successful verification: bump `usage_count` in-place and
    /// overwrite `last_used_at`. The increment happens at the store layer so
    /// concurrent verifications of the same token never undercount.
    pub async fn touch_token_usage(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE api_tokens SET last_used_at = NOW(), usage_count = usage_count + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_token(
        &self,
        id: Uuid,
        update: &TokenUpdate,
    ) -> anyhow::Result<Option<ApiTokenRow>> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            r#"UPDATE api_tokens
               SET name = COALESCE($1, name),
                   abilities = COALESCE($2, abilities),
                   expires_at = CASE WHEN $3 THEN $4 ELSE expires_at END,
                   description = CASE WHEN $5 THEN $6 ELSE description END,
                   is_active = COALESCE($7, is_active),
                   updated_at = NOW()
               WHERE id = $8
               RETURNING {TOKEN_COLUMNS}"#
        ))
        .bind(&update.name)
        .bind(update.abilities.as_ref().map(Json))
        .bind(update.expires_at.is_some())
        .bind(update.expires_at.flatten())
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.is_active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Idempotent: revoking an already-revoked token reports success.
    /// Returns false only when no record with that id exists.
    pub async fn revoke_token(&self, id: Uuid) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE api_tokens SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Swap in a new digest and reset usage metadata in one statement, so a
    /// racing verification sees either the old digest or the new one — never
    /// a torn record.
    pub async fn regenerate_token(&self, id: Uuid, new_digest: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE api_tokens
               SET token_digest = $1,
                   usage_count = 0,
                   last_used_at = NULL,
                   updated_at = NOW()
               WHERE id = $2"#,
        )
        .bind(new_digest)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_token(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
