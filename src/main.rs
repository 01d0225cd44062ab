use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokengate::cli::{Cli, Commands, TokenCommands};
use tokengate::models::token::{generate_secret, token_digest, Ability, NewApiToken};
use tokengate::store::postgres::PgStore;
use tokengate::{api, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tokengate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            handle_token_command(&db, command).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = Arc::new(AppState { db, config: cfg });

    let app = axum::Router::new()
        // Liveness endpoint (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .nest("/api/v1", api::api_router(state.clone()))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("TokenGate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response. An auth service
/// must never have its responses cached or framed.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    // Token responses must never land in a shared cache
    headers.insert("Cache-Control", "no-store".parse().unwrap());
    // Strip Referrer to avoid leaking tokens in URLs
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());
    headers.remove("Server");

    resp
}

async fn handle_token_command(db: &PgStore, cmd: TokenCommands) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Create {
            name,
            abilities,
            expires_at,
            description,
        } => {
            let abilities = match abilities {
                Some(raw) if !raw.is_empty() => raw
                    .iter()
                    .map(|s| Ability::from_str(s).map_err(|e| anyhow::anyhow!(e)))
                    .collect::<anyhow::Result<Vec<_>>>()?,
                _ => vec![Ability::Read],
            };
            if abilities.contains(&Ability::Wildcard) {
                anyhow::bail!("the wildcard ability cannot be assigned directly");
            }

            let expires_at = expires_at
                .map(|s| {
                    chrono::DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .context("invalid expires_at (expected RFC 3339)")
                })
                .transpose()?;
            if let Some(at) = expires_at {
                if at <= chrono::Utc::now() {
                    anyhow::bail!("expires_at must be a date in the future");
                }
            }

            let secret = generate_secret();
            let token = db
                .insert_token(&NewApiToken {
                    name,
                    token_digest: token_digest(&secret),
                    abilities,
                    expires_at,
                    description,
                })
                .await?;

            println!("Token created:");
            println!("  ID:        {}", token.id);
            println!("  Name:      {}", token.name);
            println!(
                "  Abilities: {}",
                token
                    .abilities
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            );
            println!("  Secret:    {}", secret);
            println!();
            println!("Save this token securely. It will not be shown again.");
        }
        TokenCommands::List => {
            let tokens = db.list_tokens().await?;
            if tokens.is_empty() {
                println!("No tokens found.");
            } else {
                println!(
                    "{:<38} {:<24} {:<20} {:<8} {:<8}",
                    "ID", "NAME", "ABILITIES", "ACTIVE", "USES"
                );
                for t in tokens {
                    let abilities = t
                        .abilities
                        .iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(",");
                    println!(
                        "{:<38} {:<24} {:<20} {:<8} {:<8}",
                        t.id, t.name, abilities, t.is_active, t.usage_count
                    );
                }
            }
        }
        TokenCommands::Revoke { id } => {
            let id = uuid::Uuid::parse_str(&id).context("invalid token ID")?;
            if db.revoke_token(id).await? {
                println!("Token revoked.");
            } else {
                println!("Token not found.");
            }
        }
        TokenCommands::Regenerate { id } => {
            let id = uuid::Uuid::parse_str(&id).context("invalid token ID")?;
            let secret = generate_secret();
            if db.regenerate_token(id, &token_digest(&secret)).await? {
                println!("Token regenerated. New secret:");
                println!("  {}", secret);
                println!();
                println!("Save this token securely. It will not be shown again.");
                println!("The previous secret is no longer valid.");
            } else {
                println!("Token not found.");
            }
        }
        TokenCommands::Delete { id } => {
            let id = uuid::Uuid::parse_str(&id).context("invalid token ID")?;
            if db.delete_token(id).await? {
                println!("Token deleted.");
            } else {
                println!("Token not found.");
            }
        }
    }
    Ok(())
}
