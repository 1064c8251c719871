use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::app;
use crate::auth::{generate_jwt, AccessLevel, Claims};
use crate::config;
use crate::scheduler::{DailySchedule, RunOutcome};

#[derive(Parser)]
#[command(name = "terrenos")]
#[command(about = "Terrenos CLI - operational commands for the audit subsystem")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the cross-tenant audit archival once")]
    Archive,

    #[command(about = "Show when the scheduled archival fires next")]
    NextRun,

    #[command(about = "Mint a signed token for local testing")]
    Token {
        #[arg(long, help = "User email (sub claim)")]
        email: String,
        #[arg(long, help = "Tenant id claim")]
        tenant: Option<i64>,
        #[arg(long, help = "User id claim")]
        user_id: Option<i64>,
        #[arg(long, value_enum, default_value = "admin")]
        access: AccessLevel,
    },
}

#[derive(Debug, Clone, Copy)]
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

    match cli.command {
        Commands::Archive => archive(output_format).await,
        Commands::NextRun => next_run(output_format),
        Commands::Token {
            email,
            tenant,
            user_id,
            access,
        } => token(email, tenant, user_id, access, output_format),
    }
}

async fn archive(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    config.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;

    let state = app::state_from_config(config).await.context("failed to open audit store")?;
    let outcome = state.scheduler.run_once().await;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => match &outcome {
            RunOutcome::Completed(summary) => {
                println!(
                    "Archived {} records ({} simple, {} critical) across {} tenants",
                    summary.total(),
                    summary.archived_simple,
                    summary.archived_critical,
                    summary.tenants_processed
                );
                for failure in &summary.failures {
                    println!("  tenant {}: {}", failure.tenant_id, failure.reason);
                }
            }
            RunOutcome::Skipped => println!("Another archival run is in progress"),
            RunOutcome::Failed(reason) => println!("Archival failed: {}", reason),
        },
    }

    if let RunOutcome::Failed(reason) = outcome {
        bail!("archival failed: {}", reason);
    }
    Ok(())
}

fn next_run(output_format: OutputFormat) -> anyhow::Result<()> {
    let audit = &config::config().audit;
    let schedule = DailySchedule::new(audit.archive_hour, audit.archive_minute)?;
    let next = schedule.next_after(&Local::now())?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "enabled": audit.archive_enabled, "next_run": next.to_rfc3339() })
        ),
        OutputFormat::Text if audit.archive_enabled => println!("Next archival: {}", next.to_rfc3339()),
        OutputFormat::Text => println!("Archival is disabled (would run at {})", next.to_rfc3339()),
    }
    Ok(())
}

fn token(
    email: String,
    tenant: Option<i64>,
    user_id: Option<i64>,
    access: AccessLevel,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if crate::is_production!() {
        bail!("refusing to mint tokens in production");
    }

    let claims = Claims::new(email, user_id, tenant, access);
    let token = generate_jwt(&claims)?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "token": token, "claims": claims })),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_command() {
        let cli = Cli::try_parse_from(["terrenos", "token", "--email", "ana@example.com", "--tenant", "42"]).unwrap();
        match cli.command {
            Commands::Token { email, tenant, access, .. } => {
                assert_eq!(email, "ana@example.com");
                assert_eq!(tenant, Some(42));
                assert_eq!(access, AccessLevel::Admin);
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["terrenos", "archive", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Archive));
    }
}
