pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "shop")]
#[command(about = "Shop CLI - operator tooling for the Shop API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "SHOP_API_SERVER",
        default_value = "http://localhost:3000",
        help = "Base URL of a running Shop API server"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Password hashing for seeding users")]
    Password {
        #[command(subcommand)]
        cmd: commands::password::PasswordCommands,
    },

    #[command(about = "Remote server checks")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &server, output_format).await,
        Commands::Password { cmd } => commands::password::handle(cmd, output_format).await,
        Commands::Server { cmd } => commands::server::handle(cmd, &server, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_command() {
        let cli = Cli::try_parse_from([
            "shop",
            "--json",
            "auth",
            "token",
            "--user",
            "8f14e45f-ceea-467f-a8f5-7b0c6f6a2b11",
            "--admin",
        ])
        .unwrap();

        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Auth {
                cmd: commands::auth::AuthCommands::Token { admin, .. },
            } => assert!(admin),
            _ => panic!("expected auth token"),
        }
    }

    #[test]
    fn rejects_malformed_user_id() {
        assert!(Cli::try_parse_from(["shop", "auth", "token", "--user", "nope"]).is_err());
    }

    #[test]
    fn server_defaults_to_localhost() {
        let cli = Cli::try_parse_from(["shop", "server", "health"]).unwrap();
        if std::env::var("SHOP_API_SERVER").is_err() {
            assert_eq!(cli.server, "http://localhost:3000");
        }
    }
}
