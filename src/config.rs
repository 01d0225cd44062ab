use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Key granting the `editor` management role: list and create
    /// non-admin tokens only.
    pub editor_key: Option<String>,
    /// Key granting the `admin` management role.
    pub admin_key: Option<String>,
    /// Key granting the `superadmin` management role. Required for issuing
    /// admin-ability tokens and all privileged token operations.
    pub superadmin_key: Option<String>,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let editor_key = std::env::var("TOKENGATE_EDITOR_KEY").ok();
    let admin_key = std::env::var("TOKENGATE_ADMIN_KEY").ok();
    let superadmin_key = std::env::var("TOKENGATE_SUPERADMIN_KEY").ok();

    if editor_key.is_none() && admin_key.is_none() && superadmin_key.is_none() {
        let env_mode = std::env::var("TOKENGATE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "neither TOKENGATE_ADMIN_KEY nor TOKENGATE_SUPERADMIN_KEY is set. \
                 Set at least one before running in production."
            );
        }
        eprintln!(
            "⚠️  no management keys configured — the token management API will reject all requests. \
             Set TOKENGATE_ADMIN_KEY / TOKENGATE_SUPERADMIN_KEY."
        );
    }

    Ok(Config {
        port: std::env::var("TOKENGATE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/tokengate".into()),
        editor_key,
        admin_key,
        superadmin_key,
    })
}
