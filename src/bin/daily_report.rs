//! Generates the daily damage report PDF for one date.
//!
//! Usage:
//!   daily-report [--date YYYY-MM-DD] [--output DIR] [--landscape] [--onlyChart]
//!                [--baseUrl URL --authToken TOKEN]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use daily_damage_report::report::{parse_report_date, AuthContext, Orientation, ReportError, ReportRequest};
use daily_damage_report::{AppState, ReportConfig};

#[derive(Debug, Parser)]
#[command(name = "daily-report", version, about = "Render the daily damage report to PDF")]
struct Cli {
    /// Target date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Origin used to resolve relative assets in the document.
    #[arg(long = "baseUrl")]
    base_url: Option<String>,

    /// Bearer token sent when fetching assets from --baseUrl.
    #[arg(long = "authToken")]
    auth_token: Option<String>,

    /// Only the header and the annual distribution charts.
    #[arg(long = "onlyChart")]
    only_chart: bool,

    #[arg(long)]
    landscape: bool,

    /// Output directory. Defaults to REPORT_OUTPUT_DIR or ./reports.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn build_request(cli: &Cli, config: &ReportConfig) -> Result<ReportRequest, ReportError> {
    let date = match cli.date.as_deref() {
        Some(raw) => parse_report_date(raw)?,
        None => chrono::Local::now().date_naive(),
    };
    let output_dir = cli.output.clone().unwrap_or_else(|| config.output_dir.clone());

    let mut request = ReportRequest::new(date, output_dir);
    request.orientation = if cli.landscape {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    request.only_charts = cli.only_chart;
    request.base_url = cli.base_url.clone();
    request.auth = cli.auth_token.clone().map(AuthContext::bearer);
    Ok(request)
}

async fn generate(cli: Cli) -> anyhow::Result<()> {
    let config = ReportConfig::from_env().context("reading configuration")?;
    let request = build_request(&cli, &config)?;
    let state = AppState::new_with_config(config)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("setting up the database pool")?;

    let report = state.pipeline.generate_daily_report_pdf(&request).await?;
    println!(
        "Report written to {} ({} bytes, {} ms)",
        report.file_path.display(),
        report.byte_size,
        report.duration_ms
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match generate(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(hint) = e.downcast_ref::<ReportError>().and_then(ReportError::remediation_hint) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
