use anyhow::bail;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::{error_message, http_client, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from API /health endpoint")]
    Health,

    #[command(about = "Show server information from API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, server: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (path, label) = match cmd {
        ServerCommands::Health => ("/health", "healthy"),
        ServerCommands::Info => ("/", "reachable"),
    };

    let url = format!("{}{}", server, path);
    let response = http_client()?.get(&url).send().await?;
    if !response.status().is_success() {
        bail!("{} is not {}: {}", server, label, error_message(response).await);
    }

    let body: Value = response.json().await?;
    output_success(&output_format, &format!("{} is {}", server, label), Some(body))
}
