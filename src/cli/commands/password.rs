use clap::Subcommand;

use crate::auth;
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum PasswordCommands {
    #[command(about = "Print a bcrypt hash suitable for a stored user")]
    Hash {
        #[arg(help = "Plain-text password")]
        password: String,
        #[arg(long, help = "bcrypt cost (defaults to SECURITY_BCRYPT_COST)")]
        cost: Option<u32>,
    },

    #[command(about = "Check a password against a bcrypt hash")]
    Verify {
        #[arg(help = "Plain-text password")]
        password: String,
        #[arg(help = "bcrypt hash")]
        hash: String,
    },
}

pub async fn handle(cmd: PasswordCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PasswordCommands::Hash { password, cost } => {
            let cost = cost.unwrap_or(config::config().security.bcrypt_cost);
            let hash = auth::hash_password(password, cost).await?;
            output_value(&output_format, "hash", &hash)
        }
        PasswordCommands::Verify { password, hash } => {
            let matches = auth::verify_password(password, hash).await?;
            if !matches {
                anyhow::bail!("Password does not match");
            }
            output_value(&output_format, "result", "match")
        }
    }
}
