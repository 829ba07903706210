use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use symtrack_lib::api::HttpSharingClient;
use symtrack_lib::config::SharingConfig;
use symtrack_lib::filters::LogFilter;
use symtrack_lib::gateway::{HistoryRange, RetryPolicy, SharedHistoryGateway};
use symtrack_lib::links::build_doctor_request_url;
use symtrack_lib::models::{AccessToken, ShareCode};
use symtrack_lib::workflow::AccessWorkflow;

#[derive(Parser, Debug)]
#[command(name = "symtrack", version, about = "Share a symptom journal with a doctor.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask for access to a patient's history with their share code
    RequestAccess {
        /// Share code, with or without the hyphen (AB12-CD34)
        code: String,
        /// Name shown to the patient
        #[arg(long, default_value = "")]
        doctor: String,
    },
    /// Approve a pending request (patient session required)
    Grant { request_id: String },
    /// Revoke a doctor's access (patient session required)
    Revoke { doctor_id: String },
    /// Show the share code, pending requests and authorized doctors
    List,
    /// Print the doctor link for a share code
    Link {
        code: String,
        /// Web app base URL
        #[arg(long, env = "SYMTRACK_APP_URL")]
        app_url: String,
    },
    /// Fetch the shared history with an access token
    History {
        #[arg(long, env = "SYMTRACK_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        #[arg(long, value_enum, default_value_t = RangeArg::Week)]
        range: RangeArg,
        /// Only urgent entries
        #[arg(long)]
        emergency_only: bool,
        /// Case-insensitive text search over symptoms and context
        #[arg(long, default_value = "")]
        search: String,
        /// Write the filtered table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write the printable HTML report
        #[arg(long)]
        html: Option<PathBuf>,
        /// Attempts for transient failures
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RangeArg {
    Week,
    Month,
    Quarter,
}

impl From<RangeArg> for HistoryRange {
    fn from(arg: RangeArg) -> Self {
        match arg {
            RangeArg::Week => HistoryRange::Week,
            RangeArg::Month => HistoryRange::Month,
            RangeArg::Quarter => HistoryRange::Quarter,
        }
    }
}

/// Client configured from `SYMTRACK_*`, plus the configured history limit.
fn http_client() -> anyhow::Result<(HttpSharingClient, u32)> {
    let config = SharingConfig::from_env().context("Failed to load sharing configuration")?;
    let history_limit = config.history_limit;
    Ok((HttpSharingClient::new(config)?, history_limit))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    symtrack_lib::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Link { code, app_url } => {
            let code = ShareCode::parse(&code)?;
            println!("{}", build_doctor_request_url(&app_url, &code)?);
        }
        Commands::RequestAccess { code, doctor } => {
            let (client, _) = http_client()?;
            let response = AccessWorkflow::new(client).request_access(&code, &doctor).await?;
            println!("Request {} is {}", response.request_id, response.status.as_str());
        }
        Commands::Grant { request_id } => {
            let (client, _) = http_client()?;
            let workflow = AccessWorkflow::new(client);
            match workflow.grant_access(&request_id).await {
                Ok(token) => println!("{}", token.as_str()),
                Err(e) if e.is_retryable() => {
                    let outcome = workflow.reconcile_grant(&request_id).await?;
                    anyhow::bail!("grant outcome unknown ({e}); request is now {outcome:?}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Revoke { doctor_id } => {
            let (client, _) = http_client()?;
            AccessWorkflow::new(client).revoke_access(&doctor_id).await?;
            println!("Access revoked for {doctor_id}");
        }
        Commands::List => {
            let (client, _) = http_client()?;
            let overview = AccessWorkflow::new(client).list_access().await?;
            println!(
                "Share code: {}",
                overview.share_code_display().unwrap_or_else(|| "(none)".into())
            );
            println!("Pending requests: {}", overview.pending_requests.len());
            for request in &overview.pending_requests {
                println!("  {}  {}", request.request_id, request.doctor_name);
            }
            println!("Authorized doctors: {}", overview.authorized_doctors.len());
            for doctor in &overview.authorized_doctors {
                println!("  {}  {}", doctor.doctor_id, doctor.doctor_name);
            }
        }
        Commands::History {
            token,
            range,
            emergency_only,
            search,
            csv,
            html,
            attempts,
        } => {
            let (client, history_limit) = http_client()?;
            let range = HistoryRange::from(range);
            let gateway = SharedHistoryGateway::new(client).with_history_limit(history_limit);
            let policy = RetryPolicy {
                max_attempts: attempts,
                ..RetryPolicy::default()
            };
            let history = match gateway
                .fetch_with_retry(&AccessToken::new(token), range.days(), policy)
                .await
            {
                Ok(history) => history,
                Err(e) if e.is_access_expired() => {
                    anyhow::bail!("Access to this history has expired or was revoked")
                }
                Err(e) => return Err(e.into()),
            };

            let filter = LogFilter {
                emergency_only,
                search_text: search,
            };
            let rows = history.rows(&filter);
            println!(
                "{} · {} · {} of {} entries",
                history.patient_info.name,
                range.label(),
                rows.len(),
                history.logs.len()
            );
            for row in &rows {
                println!(
                    "{}  {:<8}  {:<20}  pain {}",
                    row.date_time,
                    if row.is_emergency { "URGENCY" } else { "" },
                    row.primary_label(),
                    row.pain_level.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
                );
            }

            if let Some(path) = csv {
                std::fs::write(&path, history.to_csv(&filter))
                    .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
            }
            if let Some(path) = html {
                std::fs::write(&path, history.to_pdf_html(&filter, range.label()))
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
            }
        }
    }

    Ok(())
}
