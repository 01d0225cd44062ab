//! API token verification middleware.
//!
//! Runs in front of every token-protected route: extracts the presented
//! credential, resolves it by digest, enforces expiry, records usage, and
//! attaches the authenticated record to the request for downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::token::{token_digest, ApiTokenRow};
use crate::AppState;

/// The verified token record, available to downstream handlers via
/// `Extension<AuthenticatedToken>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedToken(pub ApiTokenRow);

/// Pull the credential out of the request headers. `X-API-Token` wins over
/// `Authorization`; a `Bearer ` prefix is stripped from either.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .or_else(|| headers.get("authorization").and_then(|v| v.to_str().ok()))?;

    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Middleware: authenticate the request with an API token.
///
/// Failure modes are deliberately coarse: an unknown digest and a revoked
/// record both yield `InvalidCredential`, so callers cannot probe which
/// secrets exist. Expiry is reported separately — it leaks nothing about
/// other secrets.
pub async fn require_api_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secret = extract_credential(req.headers()).ok_or(AppError::MissingCredential)?;

    let digest = token_digest(&secret);
    let token = state
        .db
        .find_token_by_digest(&digest)
        .await?
        .ok_or(AppError::InvalidCredential)?;

    // The store already matched on the digest column; re-check in constant
    // time rather than trusting the store's comparison semantics.
    let matches: bool = token
        .token_digest
        .as_bytes()
        .ct_eq(digest.as_bytes())
        .into();
    if !matches {
        return Err(AppError::InvalidCredential);
    }

    // Checked fresh on every request, never pre-computed.
    if token.is_expired() {
        return Err(AppError::ExpiredCredential);
    }

    // Usage metadata is committed before the downstream handler runs. The
    // increment is atomic at the store layer, so concurrent verifications of
    // the same token cannot lose counts.
    state.db.touch_token_usage(token.id).await?;

    tracing::debug!(token_id = %token.id, name = %token.name, "API token verified");

    req.extensions_mut().insert(AuthenticatedToken(token));
    Ok(next.run(req).await)
}

// ── Tests ───────────────────────────────────────────────────────
