use clap::{Parser, Subcommand};

/// TokenGate — API token authentication service for the CMS backend
#[derive(Parser)]
#[command(name = "tokengate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (falls back to TOKENGATE_PORT, then 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new API token (prints the plaintext secret once)
    Create {
        #[arg(long)]
        name: String,
        /// Comma-separated abilities: read, write, delete, admin
        #[arg(long, value_delimiter = ',')]
        abilities: Option<Vec<String>>,
        /// RFC 3339 expiry timestamp (e.g. 2027-01-01T00:00:00Z)
        #[arg(long)]
        expires_at: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all tokens
    List,
    /// Revoke a token (keeps the record, marks it inactive)
    Revoke {
        #[arg(long)]
        id: String,
    },
    /// Replace a token's secret (prints the new plaintext once)
    Regenerate {
        #[arg(long)]
        id: String,
    },
    /// Delete a token record permanently
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_port_is_optional() {
        // No --port: the configured TOKENGATE_PORT must win, so the flag
        // parses as absent rather than a hard default.
        let cli = Cli::try_parse_from(["tokengate", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: None })));

        let cli = Cli::try_parse_from(["tokengate", "serve", "--port", "9090"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { port: Some(9090) })
        ));
    }

    #[test]
    fn test_create_parses_comma_separated_abilities() {
        let cli = Cli::try_parse_from([
            "tokengate", "token", "create", "--name", "ci", "--abilities", "read,write",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Token {
                command: TokenCommands::Create { abilities, .. },
            }) => assert_eq!(abilities, Some(vec!["read".into(), "write".into()])),
            _ => panic!("expected token create subcommand"),
        }
    }
}
