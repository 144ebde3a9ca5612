use anyhow::bail;
use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::JwtKeys;
use crate::cli::utils::{error_message, http_client, output_success, output_value};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the server and print the issued token")]
    Login {
        #[arg(long, help = "Account email")]
        email: String,
        #[arg(long, env = "SHOP_PASSWORD", help = "Account password")]
        password: String,
    },

    #[command(about = "Mint a token locally with the configured JWT secret")]
    Token {
        #[arg(long, help = "User id placed in the token subject")]
        user: Uuid,
        #[arg(long, help = "Mark the token as administrator")]
        admin: bool,
    },
}

pub async fn handle(cmd: AuthCommands, server: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let url = format!("{}{}/users/login", server, config::config().api.prefix);
            let response = http_client()?
                .post(&url)
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;

            if !response.status().is_success() {
                bail!("Login failed: {}", error_message(response).await);
            }

            let body: Value = response.json().await?;
            let token = body
                .get("token")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Login response did not contain a token"))?;

            match output_format {
                OutputFormat::Json => output_success(&output_format, "Logged in", Some(body.clone())),
                OutputFormat::Text => output_value(&output_format, "token", token),
            }
        }
        AuthCommands::Token { user, admin } => {
            let security = &config::config().security;
            let keys = JwtKeys::new(&security.jwt_secret, security.jwt_expiry_hours)?;
            let token = keys.issue(user, admin)?;
            output_value(&output_format, "token", &token)
        }
    }
}
