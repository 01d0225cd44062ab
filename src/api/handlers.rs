use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::auth::AuthenticatedToken;
use crate::middleware::rbac::{can_issue, Principal};
use crate::models::token::{generate_secret, token_digest, Ability, ApiTokenRow, NewApiToken};
use crate::store::postgres::TokenUpdate;
use crate::AppState;

const SAVE_TOKEN_WARNING: &str =
    "Please save this token securely. It will not be shown again.";

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    pub abilities: Option<Vec<Ability>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateTokenRequest {
    pub name: Option<String>,
    pub abilities: Option<Vec<Ability>>,
    /// Absent = untouched; explicit null = clear the expiry.
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// ── Validation ───────────────────────────────────────────────
// All checks run before any store mutation: a request either fully succeeds
// or persists nothing.

pub fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if name.chars().count() > 255 {
        return Err(AppError::Validation(
            "name must not exceed 255 characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<(), AppError> {
    if let Some(d) = description {
        if d.chars().count() > 500 {
            return Err(AppError::Validation(
                "description must not exceed 500 characters".into(),
            ));
        }
    }
    Ok(())
}

pub fn validate_expiry(expires_at: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if let Some(at) = expires_at {
        if at <= Utc::now() {
            return Err(AppError::Validation(
                "expires_at must be a date in the future".into(),
            ));
        }
    }
    Ok(())
}

/// Issuance/update input may name the four recognized abilities only — the
/// wildcard is never accepted from callers. Public tokens additionally may
/// not carry `admin`.
pub fn validate_abilities(abilities: &[Ability], allow_admin: bool) -> Result<(), AppError> {
    for ability in abilities {
        match ability {
            Ability::Wildcard => {
                return Err(AppError::Validation(
                    "the wildcard ability cannot be assigned directly".into(),
                ))
            }
            Ability::Admin if !allow_admin => {
                return Err(AppError::Validation(
                    "the admin ability is not allowed on public tokens".into(),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Omitted or empty ability lists default to read-only.
pub fn abilities_or_default(abilities: Option<Vec<Ability>>) -> Vec<Ability> {
    match abilities {
        Some(a) if !a.is_empty() => a,
        _ => vec![Ability::Read],
    }
}

// ── Issuance ─────────────────────────────────────────────────

/// Generate a secret, persist its digest, and return the record together
/// with the plaintext. The plaintext exists only in this return value.
async fn issue(
    state: &AppState,
    name: String,
    abilities: Vec<Ability>,
    expires_at: Option<DateTime<Utc>>,
    description: Option<String>,
) -> Result<(ApiTokenRow, String), AppError> {
    let secret = generate_secret();
    let row = state
        .db
        .insert_token(&NewApiToken {
            name,
            token_digest: token_digest(&secret),
            abilities,
            expires_at,
            description,
        })
        .await?;

    tracing::info!(token_id = %row.id, name = %row.name, "API token issued");
    Ok((row, secret))
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/v1/introspect — echo the verified token's metadata.
/// Exercises the verification middleware; the digest is never serialized.
pub async fn introspect(
    Extension(AuthenticatedToken(token)): Extension<AuthenticatedToken>,
) -> Json<Value> {
    Json(json!({ "token": token }))
}

/// GET /api/v1/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let tokens = state.db.list_tokens().await?;
    Ok(Json(json!({ "tokens": tokens })))
}

/// POST /api/v1/tokens
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    validate_name(&payload.name)?;
    validate_description(payload.description.as_deref())?;
    validate_expiry(payload.expires_at)?;

    let abilities = abilities_or_default(payload.abilities);
    validate_abilities(&abilities, true)?;

    if !can_issue(principal.role, &abilities) {
        return Err(AppError::Forbidden(
            "You do not have permission to create admin tokens.".into(),
        ));
    }

    let (token, plain_text_token) = issue(
        &state,
        payload.name,
        abilities,
        payload.expires_at,
        payload.description,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "API token created successfully",
            "token": token,
            "plain_text_token": plain_text_token,
            "warning": SAVE_TOKEN_WARNING,
        })),
    ))
}

/// GET /api/v1/tokens/:id
pub async fn show_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("You do not have permission to view this token.")?;

    let token = state.db.get_token(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(json!({ "token": token })))
}

/// PUT /api/v1/tokens/:id
pub async fn update_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTokenRequest>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("You do not have permission to update this token.")?;

    if let Some(name) = &payload.name {
        validate_name(name)?;
    }
    if let Some(description) = &payload.description {
        validate_description(description.as_deref())?;
    }
    if let Some(expires_at) = payload.expires_at {
        validate_expiry(expires_at)?;
    }
    if let Some(abilities) = &payload.abilities {
        validate_abilities(abilities, true)?;
        if !can_issue(principal.role, abilities) {
            return Err(AppError::Forbidden(
                "You do not have permission to assign admin abilities.".into(),
            ));
        }
    }

    let update = TokenUpdate {
        name: payload.name,
        abilities: payload.abilities,
        expires_at: payload.expires_at,
        description: payload.description,
        is_active: payload.is_active,
    };

    let token = state
        .db
        .update_token(id, &update)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(json!({
        "message": "API token updated successfully",
        "token": token,
    })))
}

/// DELETE /api/v1/tokens/:id — revoke (idempotent; the record survives).
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("You do not have permission to revoke this token.")?;

    if !state.db.revoke_token(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(token_id = %id, "API token revoked");
    Ok(Json(json!({ "message": "API token revoked successfully" })))
}

/// POST /api/v1/tokens/:id/regenerate — replace the secret atomically.
/// The old secret is invalid the moment this returns; there is no grace
/// window.
pub async fn regenerate_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("You do not have permission to regenerate this token.")?;

    let secret = generate_secret();
    if !state.db.regenerate_token(id, &token_digest(&secret)).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(token_id = %id, "API token regenerated");
    Ok(Json(json!({
        "message": "API token regenerated successfully",
        "plain_text_token": secret,
        "warning": SAVE_TOKEN_WARNING,
    })))
}

/// GET /api/v1/admin/tokens — full listing, superadmin only.
pub async fn admin_list_tokens(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("Only superadministrators can view all API tokens.")?;

    let tokens = state.db.list_tokens().await?;
    Ok(Json(json!({ "tokens": tokens })))
}

/// POST /api/v1/admin/tokens/public — a token not tied to any limiting
/// policy; abilities are restricted to read/write/delete.
pub async fn create_public_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    principal.require_superadmin("Only superadministrators can create public API tokens.")?;

    validate_name(&payload.name)?;
    validate_description(payload.description.as_deref())?;
    validate_expiry(payload.expires_at)?;

    let abilities = abilities_or_default(payload.abilities);
    validate_abilities(&abilities, false)?;

    let (token, plain_text_token) = issue(
        &state,
        payload.name,
        abilities,
        payload.expires_at,
        payload.description,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Public API token created successfully",
            "token": token,
            "plain_text_token": plain_text_token,
            "warning": SAVE_TOKEN_WARNING,
        })),
    ))
}

/// DELETE /api/v1/admin/tokens/:id — hard delete; any secret that resolved
/// to this record becomes invalid.
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    principal.require_superadmin("You do not have permission to delete this token.")?;

    if !state.db.delete_token(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(token_id = %id, "API token deleted");
    Ok(Json(json!({ "message": "API token deleted successfully" })))
}
