//! Integration tests for the token subsystem's pure logic:
//! issuance validation, credential extraction, ability semantics, role
//! gating, and the HTTP error contract.
//!
//! Store-backed behavior (digest lookup, atomic usage increment, regenerate
//! invalidating the old secret) is covered by the database-backed tests in
//! `tests/store.rs`.

use chrono::{Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use tokengate::api::handlers::{
    abilities_or_default, validate_abilities, validate_description, validate_expiry,
    validate_name,
};
use tokengate::errors::AppError;
use tokengate::middleware::rbac::{can_issue, Role};
use tokengate::models::token::{
    generate_secret, token_digest, Ability, ApiTokenRow, SECRET_LENGTH,
};

fn sample_row(abilities: Vec<Ability>) -> ApiTokenRow {
    ApiTokenRow {
        id: Uuid::new_v4(),
        name: "ci-bot".into(),
        token_digest: token_digest(&generate_secret()),
        abilities: Json(abilities),
        expires_at: None,
        last_used_at: None,
        usage_count: 0,
        is_active: true,
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

mod issuance_tests {
    use super::*;

    #[test]
    fn test_secret_is_64_alphanumeric_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_digest_matches_at_verification_time() {
        // The digest computed at issuance must equal the digest computed
        // from the same plaintext at verification time.
        let secret = generate_secret();
        let stored = token_digest(&secret);
        assert_eq!(stored, token_digest(&secret));
    }

    #[test]
    fn test_distinct_secrets_produce_distinct_digests() {
        assert_ne!(
            token_digest(&generate_secret()),
            token_digest(&generate_secret())
        );
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("ci-bot").is_ok());
        assert!(matches!(validate_name(""), Err(AppError::Validation(_))));
        assert!(matches!(validate_name("   "), Err(AppError::Validation(_))));
        assert!(validate_name(&"x".repeat(255)).is_ok());
        assert!(matches!(
            validate_name(&"x".repeat(256)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_length_limits_count_characters_not_bytes() {
        // 200 three-byte characters is 600 bytes but well under 255 chars.
        assert!(validate_name(&"日".repeat(200)).is_ok());
        assert!(matches!(
            validate_name(&"日".repeat(256)),
            Err(AppError::Validation(_))
        ));

        let multibyte = "é".repeat(500);
        assert!(validate_description(Some(multibyte.as_str())).is_ok());
        let too_long = "é".repeat(501);
        assert!(matches!(
            validate_description(Some(too_long.as_str())),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_description_validation() {
        assert!(validate_description(None).is_ok());
        let ok = "d".repeat(500);
        assert!(validate_description(Some(ok.as_str())).is_ok());
        let too_long = "d".repeat(501);
        assert!(matches!(
            validate_description(Some(too_long.as_str())),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_expiry_must_be_in_future() {
        assert!(validate_expiry(None).is_ok());
        assert!(validate_expiry(Some(Utc::now() + Duration::hours(1))).is_ok());
        assert!(matches!(
            validate_expiry(Some(Utc::now() - Duration::hours(1))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_abilities_default_to_read() {
        assert_eq!(abilities_or_default(None), vec![Ability::Read]);
        assert_eq!(abilities_or_default(Some(vec![])), vec![Ability::Read]);
        assert_eq!(
            abilities_or_default(Some(vec![Ability::Write])),
            vec![Ability::Write]
        );
    }

    #[test]
    fn test_wildcard_rejected_in_input() {
        assert!(matches!(
            validate_abilities(&[Ability::Read, Ability::Wildcard], true),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_public_tokens_cannot_carry_admin() {
        assert!(validate_abilities(&[Ability::Read, Ability::Admin], true).is_ok());
        assert!(matches!(
            validate_abilities(&[Ability::Read, Ability::Admin], false),
            Err(AppError::Validation(_))
        ));
        assert!(validate_abilities(&[Ability::Read, Ability::Write, Ability::Delete], false).is_ok());
    }
}

mod authorization_tests {
    use super::*;

    #[test]
    fn test_admin_ability_requires_superadmin() {
        let wants_admin = [Ability::Admin];
        assert!(can_issue(Role::Superadmin, &wants_admin));
        assert!(!can_issue(Role::Admin, &wants_admin));
        assert!(!can_issue(Role::Editor, &wants_admin));
    }

    #[test]
    fn test_ci_bot_scenario() {
        // Token "ci-bot" with read+write, no expiry: write is granted,
        // delete is not.
        let row = sample_row(vec![Ability::Read, Ability::Write]);
        assert!(row.is_valid());
        assert!(row.has_ability(Ability::Write));
        assert!(!row.has_ability(Ability::Delete));
    }

    #[test]
    fn test_wildcard_row_grants_all() {
        let row = sample_row(vec![Ability::Wildcard]);
        assert!(row.has_ability(Ability::Read));
        assert!(row.has_ability(Ability::Admin));
    }
}

mod record_validity_tests {
    use super::*;

    #[test]
    fn test_expired_row_is_invalid_even_when_active() {
        let mut row = sample_row(vec![Ability::Read]);
        row.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(row.is_active);
        assert!(row.is_expired());
        assert!(!row.is_valid());
    }

    #[test]
    fn test_revoked_row_is_invalid() {
        let mut row = sample_row(vec![Ability::Read]);
        row.is_active = false;
        assert!(!row.is_valid());
    }

    #[test]
    fn test_no_expiry_means_never_expires() {
        let row = sample_row(vec![Ability::Read]);
        assert!(!row.is_expired());
        assert!(row.is_valid());
    }

    #[test]
    fn test_serialized_row_never_contains_digest() {
        let row = sample_row(vec![Ability::Read, Ability::Write]);
        let digest = row.token_digest.clone();

        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("token_digest").is_none());
        assert!(!value.to_string().contains(&digest));

        // The public fields are all present.
        assert_eq!(value["name"], "ci-bot");
        assert_eq!(value["abilities"], serde_json::json!(["read", "write"]));
        assert_eq!(value["usage_count"], 0);
        assert_eq!(value["is_active"], true);
    }
}

mod error_contract_tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    async fn response_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let (status, body) = response_parts(AppError::MissingCredential).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "API token required");
    }

    #[tokio::test]
    async fn test_invalid_credential_is_401() {
        let (status, body) = response_parts(AppError::InvalidCredential).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid API token");
        assert_eq!(
            body["message"],
            "The provided API token is invalid or has been revoked"
        );
    }

    #[tokio::test]
    async fn test_expired_credential_is_401() {
        let (status, body) = response_parts(AppError::ExpiredCredential).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "API token expired");
    }

    #[tokio::test]
    async fn test_forbidden_is_403_with_operation_message() {
        let (status, body) =
            response_parts(AppError::Forbidden("You do not have permission.".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "You do not have permission.");
    }

    #[tokio::test]
    async fn test_validation_is_422() {
        let (status, body) = response_parts(AppError::Validation("name is required".into())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Validation failed");
    }

    #[tokio::test]
    async fn test_internal_errors_expose_no_detail() {
        let (status, body) =
            response_parts(AppError::Internal(anyhow::anyhow!("pool exhausted on node 7"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");
        assert!(!body.to_string().contains("node 7"));
    }
}
