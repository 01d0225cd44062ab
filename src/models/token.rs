use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use uuid::Uuid;

/// Length of the plaintext secret handed to the caller at issuance.
pub const SECRET_LENGTH: usize = 64;

/// Capability a token can grant. Closed set — anything else is rejected at
/// the input boundary, so a typo can never silently grant nothing.
///
/// `Wildcard` ("*") grants all abilities. It is representable in storage but
/// never accepted in issuance or update input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Read,
    Write,
    Delete,
    Admin,
    #[serde(rename = "*")]
    Wildcard,
}

impl Ability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::Read => "read",
            Ability::Write => "write",
            Ability::Delete => "delete",
            Ability::Admin => "admin",
            Ability::Wildcard => "*",
        }
    }
}

impl std::str::FromStr for Ability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Ability::Read),
            "write" => Ok(Ability::Write),
            "delete" => Ok(Ability::Delete),
            "admin" => Ok(Ability::Admin),
            "*" => Ok(Ability::Wildcard),
            other => Err(format!("unrecognized ability: {}", other)),
        }
    }
}

impl std::fmt::Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True iff the set contains the wildcard or the specific ability.
pub fn has_ability(abilities: &[Ability], wanted: Ability) -> bool {
    abilities
        .iter()
        .any(|a| *a == Ability::Wildcard || *a == wanted)
}

/// A persisted API token record.
///
/// `token_digest` is the SHA-256 of the plaintext secret and is never
/// serialized — no read path can leak it.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiTokenRow {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_digest: String,
    pub abilities: Json<Vec<Ability>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiTokenRow {
    /// Expiry is evaluated fresh on every call — never cached.
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at < Utc::now())
    }

    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    pub fn has_ability(&self, wanted: Ability) -> bool {
        has_ability(&self.abilities, wanted)
    }
}

/// Insert input for a new token record.
pub struct NewApiToken {
    pub name: String,
    pub token_digest: String,
    pub abilities: Vec<Ability>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Generate a fresh plaintext secret: 64 alphanumeric chars drawn from the
/// OS CSPRNG. Never persisted anywhere.
pub fn generate_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Deterministic one-way digest of a plaintext secret (lowercase hex
/// SHA-256). Identical secrets must reproduce identical digests so lookup by
/// digest works; this is the only form in which a secret touches the store.
pub fn token_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

// ── Tests ───────────────────────────────────────────────────────
