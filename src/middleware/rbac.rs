use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::token::Ability;
use crate::AppState;

/// Roles a management-API principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Superadmin,
    Admin,
    Editor,
}

impl Role {
    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

/// The authenticated management principal, attached to request extensions
/// by `admin_auth`.
#[derive(Debug, Clone)]
pub struct Principal {
    pub role: Role,
}

impl Principal {
    /// Superadmin gate for privileged token operations. Purely synchronous
    /// and side-effect-free.
    pub fn require_superadmin(&self, message: &str) -> Result<(), AppError> {
        if self.role.is_superadmin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(message.to_string()))
        }
    }
}

/// True iff a principal with `role` may issue or update a token carrying
/// `abilities`. Only superadmins may grant the `admin` ability.
pub fn can_issue(role: Role, abilities: &[Ability]) -> bool {
    !abilities.contains(&Ability::Admin) || role.is_superadmin()
}

/// Constant-time string equality. Length mismatch short-circuits; the
/// configured key's length is not secret.
fn ct_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Middleware for the token management API: validates `X-Admin-Key` (or
/// `Authorization: Bearer ...`) against the configured management keys and
/// attaches the matching `Principal`. Returns a bare 401 on failure — the
/// structured error bodies are reserved for the API-token surface.
pub async fn admin_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim);

    let provided = match provided {
        Some(k) => k,
        None => {
            tracing::warn!("management API: missing X-Admin-Key header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let role = match resolve_role(&state.config, provided) {
        Some(role) => role,
        None => {
            tracing::warn!("management API: invalid admin key");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(Principal { role });
    Ok(next.run(req).await)
}

fn resolve_role(config: &crate::config::Config, provided: &str) -> Option<Role> {
    if let Some(key) = &config.superadmin_key {
        if ct_eq(provided, key) {
            return Some(Role::Superadmin);
        }
    }
    if let Some(key) = &config.admin_key {
        if ct_eq(provided, key) {
            return Some(Role::Admin);
        }
    }
    if let Some(key) = &config.editor_key {
        if ct_eq(provided, key) {
            return Some(Role::Editor);
        }
    }
    None
}

// ── Tests ───────────────────────────────────────────────────────
