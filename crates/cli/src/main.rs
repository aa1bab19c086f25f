//! certportal - command-line client for the certificate portal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use certportal_certificates::StatusTab;
use certportal_client::{BulkAction, PortalConfig, PortalContext};
use certportal_core::CertificateId;
use certportal_observability::LogFormat;

mod commands;

/// certportal - insurance certificate portal client
#[derive(Parser, Debug)]
#[command(name = "certportal")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides CERTPORTAL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log output format (pretty, json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Session ===
    /// Sign in and store the session
    Login {
        username: String,

        /// Password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and wipe the stored session
    Logout,

    /// Show the signed-in user and their dashboard
    Whoami,

    /// Change the signed-in user's password
    Passwd {
        #[arg(long)]
        old: Option<String>,

        #[arg(long)]
        new: Option<String>,
    },

    /// Check where navigating to a path would lead
    Visit { path: String },

    // === Certificates ===
    /// List certificates on your dashboard
    #[command(alias = "ls")]
    Certificates {
        /// Status tab (all, pending, approved, rejected)
        #[arg(long, default_value = "all")]
        tab: StatusTab,

        /// Match certificate number, insured name or policy number
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one certificate read-only
    Show { id: CertificateId },

    /// Create a certificate
    New {
        /// Field value, e.g. --set insuredName="Blue Cargo"
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },

    /// Edit a certificate
    Edit {
        id: CertificateId,

        /// Field value, e.g. --set rate=2.5
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Approve certificates
    Approve {
        #[arg(required = true)]
        ids: Vec<CertificateId>,
    },

    /// Reject certificates
    Reject {
        #[arg(required = true)]
        ids: Vec<CertificateId>,
    },

    /// Delete certificates
    Delete {
        #[arg(required = true)]
        ids: Vec<CertificateId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    certportal_observability::init(cli.log_format);

    let mut config = PortalConfig::from_env().context("invalid configuration")?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
    }
    tracing::debug!(api_url = %config.api_url, data_dir = ?config.data_dir, "configuration loaded");

    let ctx = PortalContext::from_config(&config).await?;

    match cli.command {
        Commands::Login { username, password } => {
            commands::login(&ctx, &username, password).await
        }
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Whoami => commands::whoami(&ctx),
        Commands::Passwd { old, new } => commands::passwd(&ctx, old, new).await,
        Commands::Visit { path } => commands::visit(&ctx, &path),
        Commands::Certificates { tab, search } => {
            commands::certificates(&ctx, tab, search).await
        }
        Commands::Show { id } => commands::show(&ctx, id).await,
        Commands::New { fields } => commands::save(&ctx, None, &fields).await,
        Commands::Edit { id, fields } => commands::save(&ctx, Some(id), &fields).await,
        Commands::Approve { ids } => commands::bulk(&ctx, BulkAction::Approve, ids).await,
        Commands::Reject { ids } => commands::bulk(&ctx, BulkAction::Reject, ids).await,
        Commands::Delete { ids } => commands::bulk(&ctx, BulkAction::Delete, ids).await,
    }
}
