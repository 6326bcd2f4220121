//! RiskView client engine demo CLI.
//!
//! Runs the walkthrough scenarios against the in-memory service, or talks to
//! a live prediction service.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- stale-race
//!   cargo run -p demo -- history --patient P1001 --page 2 --filter week
//!   cargo run -p demo -- --config riskview.toml predict --patient P1001 --oxygen-sat 85

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use riskview_client::HttpRiskApi;
use riskview_config::AppConfig;
use riskview_contracts::{error::RiskViewResult, record::TimeFilter};
use riskview_core::{
    prediction::submit, traits::RiskApi, HistoryView, PredictionForm, QueryController, ViewDisplay,
    Vital,
};
use riskview_mock::{
    scenarios::{dashboard, pagination, preference, stale_race},
    MockRiskApi,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// RiskView: neonatal risk-prediction client engine demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "RiskView client engine demo",
    long_about = "Runs RiskView walkthroughs showing stale-response handling,\n\
                  pagination guards, preference reconciliation and single-flight refresh."
)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory service instead of the configured base URL.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every walkthrough in sequence.
    RunAll,
    /// Walkthrough 1: out-of-order responses are discarded.
    StaleRace,
    /// Walkthrough 2: page bounds and time filter.
    Pagination,
    /// Walkthrough 3: user choice versus system dark-mode signal.
    Preference,
    /// Walkthrough 4: overlapping dashboard refreshes.
    Dashboard,
    /// Fetch one page of a patient's history.
    History {
        #[arg(long)]
        patient: String,
        /// Pages past the last one land on the last page.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// all, week or month.
        #[arg(long, default_value = "all")]
        filter: TimeFilter,
    },
    /// Submit vital signs for a prediction.
    Predict {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        heart_rate: Option<f64>,
        #[arg(long)]
        oxygen_sat: Option<f64>,
        #[arg(long)]
        blood_pressure: Option<f64>,
        #[arg(long)]
        respiration_rate: Option<f64>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    match run(cli).await {
        Ok(()) => {
            println!("Done.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> RiskViewResult<()> {
    match cli.command {
        Command::RunAll => run_all().await,
        Command::StaleRace => stale_race::run_scenario().await,
        Command::Pagination => pagination::run_scenario().await,
        Command::Preference => preference::run_scenario().await,
        Command::Dashboard => dashboard::run_scenario().await,
        Command::History { patient, page, filter } => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            if cli.offline {
                show_history(Arc::new(MockRiskApi::new()), &config, patient, page, filter).await
            } else {
                let api = Arc::new(HttpRiskApi::from_config(&config)?);
                info!(base_url = %api.base_url(), "using live service");
                show_history(api, &config, patient, page, filter).await
            }
        }
        Command::Predict {
            patient,
            heart_rate,
            oxygen_sat,
            blood_pressure,
            respiration_rate,
        } => {
            let mut form = PredictionForm::new();
            form.set_patient_id(patient);
            for (vital, value) in [
                (Vital::HeartRate, heart_rate),
                (Vital::OxygenSat, oxygen_sat),
                (Vital::BloodPressure, blood_pressure),
                (Vital::RespirationRate, respiration_rate),
            ] {
                if let Some(value) = value {
                    form.set(vital, value);
                }
            }

            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            if cli.offline {
                show_prediction(&MockRiskApi::new(), &form).await
            } else {
                show_prediction(&HttpRiskApi::from_config(&config)?, &form).await
            }
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all() -> RiskViewResult<()> {
    stale_race::run_scenario().await?;
    pagination::run_scenario().await?;
    preference::run_scenario().await?;
    dashboard::run_scenario().await?;
    Ok(())
}

// ── Live commands ─────────────────────────────────────────────────────────────

async fn show_history<A: RiskApi>(
    api: Arc<A>,
    config: &AppConfig,
    patient: String,
    page: u32,
    filter: TimeFilter,
) -> RiskViewResult<()> {
    let controller = QueryController::new(api, config.query_settings());
    let mut view = HistoryView::new(controller, patient);

    view.set_time_filter(filter)?.settled().await;
    if page > 1 {
        view.jump_to_page(page)?.settled().await;
    }

    let snapshot = view.snapshot();
    println!(
        "Patient {} ({}), page {} of {}",
        snapshot.patient_id,
        snapshot.time_filter.label(),
        snapshot.page,
        snapshot.page_count.max(1)
    );
    println!();

    match &snapshot.display {
        ViewDisplay::Loading => println!("  Still loading."),
        ViewDisplay::Failed { message } => println!("  {message}"),
        ViewDisplay::Empty => println!("  No prediction history available for this patient."),
        ViewDisplay::Ready => {
            for row in &snapshot.rows {
                println!(
                    "  {}  {:<9} {:>6}  {}",
                    row.record.timestamp.format("%Y-%m-%d %H:%M"),
                    row.level.label(),
                    riskview_core::classifier::format_percent(row.record.risk_score),
                    if row.record.alert_triggered { "alert" } else { "" }
                );
            }
        }
    }
    if let (Some(error), true) = (&snapshot.error, !snapshot.rows.is_empty()) {
        println!();
        println!("  {error}");
    }
    println!();
    Ok(())
}

async fn show_prediction<A: RiskApi>(api: &A, form: &PredictionForm) -> RiskViewResult<()> {
    for vital in Vital::ALL {
        let value = form.value(vital);
        println!(
            "  {:<18} {:>6} {:<12}{}",
            vital.label(),
            value,
            vital.unit(),
            if vital.is_normal(value) { "" } else { " (outside normal range)" }
        );
    }
    println!();

    let panel = submit(api, form).await?;
    println!("  Risk:   {}", panel.headline);
    println!("  Status: {}", panel.alert_status);
    if let Some(notice) = panel.alert_notice {
        println!("  {notice}");
    }
    if let Some(explanation) = &panel.result.explanation {
        println!("  Why:    {explanation}");
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("RiskView: Neonatal Risk Monitor");
    println!("Client Engine Demo");
    println!("================================");
    println!();
    println!("Rules the engine enforces:");
    println!("  [1] Only the most recently requested page may reach the screen");
    println!("  [2] Pages past the last page are refused before any request is sent");
    println!("  [3] A failed refresh keeps the last good data and shows the error inline");
    println!("  [4] A user's light/dark choice outranks the operating system signal");
    println!("  [5] One dashboard refresh at a time; extra triggers are dropped");
    println!();
}
