#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod commands;
mod config;
mod logging;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{ArgAction, Parser, Subcommand};
use clinic_copay::{BilledService, CopaymentEngine};
use clinic_gateway::{BaseUrl, GatewayBuilder, RequestGateway};
use commands::Verb;
use config::DeskConfig;
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::PathBuf;

/// Clinic Desk - operator console for the clinic backend
#[derive(Parser)]
#[command(name = "clinic-desk")]
#[command(about = "Clinic Desk - operator console for the clinic backend")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL override (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print effective configuration (JSON, credential redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a copay split locally
    Copay {
        /// Service cost
        #[arg(long)]
        cost: Decimal,
        /// Patient has insurance
        #[arg(long)]
        insured: bool,
        /// Copay already paid this year
        #[arg(long, default_value_t = Decimal::ZERO)]
        accumulated: Decimal,
    },
    /// Send one request to the backend
    Request {
        #[arg(value_enum, ignore_case = true)]
        method: Verb,
        /// Path relative to the backend base URL
        path: String,
        /// JSON body
        #[arg(long, value_parser = parse_json)]
        body: Option<Value>,
    },
    /// Apply a billed service to a patient's copay ledger
    Settle {
        /// Patient id (a single path segment)
        #[arg(long, value_parser = parse_patient_id)]
        patient: String,
        #[arg(long)]
        cost: Decimal,
        #[arg(long)]
        insured: bool,
        /// Billing year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Validate configuration and exit
    Check,
}

fn parse_json(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Patient ids become one segment of the ledger path, so only unreserved
/// URI characters are accepted and the dot segments are refused.
fn parse_patient_id(raw: &str) -> Result<String, String> {
    let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
    if raw.is_empty() || raw == "." || raw == ".." || !raw.chars().all(unreserved) {
        return Err(format!(
            "'{raw}' is not a valid patient id (letters, digits, '-', '.', '_', '~')"
        ));
    }
    Ok(raw.to_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (CLINIC__*) -> 4) CLI overrides
    let mut config = DeskConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.verbose, cli.base_url.as_deref());

    logging::init(&config.logging)?;

    if cli.print_config {
        println!("{}", config.to_redacted_json()?);
        return Ok(());
    }

    let engine = CopaymentEngine::new(config.copay_policy().context("invalid copay policy")?);

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Copay {
            cost,
            insured,
            accumulated,
        } => commands::copay(&engine, cost, insured, accumulated),
        Commands::Request { method, path, body } => {
            let gateway = build_gateway(&config)?;
            commands::request(&gateway, method, &path, body).await
        }
        Commands::Settle {
            patient,
            cost,
            insured,
            year,
        } => {
            let gateway = build_gateway(&config)?;
            let service = BilledService {
                year: year.unwrap_or_else(|| chrono::Local::now().year()),
                cost,
                insured,
            };
            commands::settle(&gateway, &engine, &patient, service).await
        }
        Commands::Check => check_config(&config),
    }
}

fn build_gateway(config: &DeskConfig) -> Result<RequestGateway> {
    let session = config.session_context()?;
    if let Some(token) = session.current() {
        tracing::info!(session = %token, "signed in from configuration");
    }
    GatewayBuilder::with_config(config.gateway_config())
        .build(session)
        .context("failed to build request gateway")
}

fn check_config(config: &DeskConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let gateway = config.gateway_config();
    BaseUrl::parse(&gateway.base_url, gateway.transport).context("invalid backend.base_url")?;
    config.session_context()?;
    println!("Configuration is valid");
    println!("{}", config.to_redacted_json()?);
    Ok(())
}
