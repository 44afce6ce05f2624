//! Runtime configuration read from the environment (and `.env`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub database_url: Option<String>,
    pub output_dir: PathBuf,
    pub chromium_path: PathBuf,
    pub reduction_target_pct: f64,
    pub top_operators: usize,
    pub min_pdf_bytes: u64,
    pub content_wait: Duration,
    pub render_timeout: Duration,
    pub pipeline_timeout: Duration,
    pub render_attempts: u32,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            output_dir: PathBuf::from("./reports"),
            chromium_path: PathBuf::from("chromium"),
            reduction_target_pct: 5.0,
            top_operators: 10,
            min_pdf_bytes: 51_200,
            content_wait: Duration::from_secs(10),
            render_timeout: Duration::from_secs(60),
            pipeline_timeout: Duration::from_secs(180),
            render_attempts: 2,
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let reduction_target_pct: f64 = parse(&get, "REPORT_REDUCTION_TARGET_PCT", defaults.reduction_target_pct)?;
        if !(0.0..=100.0).contains(&reduction_target_pct) {
            return Err(ConfigError::Invalid {
                key: "REPORT_REDUCTION_TARGET_PCT",
                value: reduction_target_pct.to_string(),
                reason: "must be between 0 and 100".to_string(),
            });
        }

        let render_attempts: u32 = parse(&get, "REPORT_RENDER_ATTEMPTS", defaults.render_attempts)?;
        if render_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "REPORT_RENDER_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            output_dir: get("REPORT_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            chromium_path: get("CHROMIUM_PATH").map(PathBuf::from).unwrap_or(defaults.chromium_path),
            reduction_target_pct,
            top_operators: parse(&get, "REPORT_TOP_OPERATORS", defaults.top_operators)?,
            min_pdf_bytes: parse(&get, "REPORT_MIN_PDF_BYTES", defaults.min_pdf_bytes)?,
            content_wait: secs(&get, "REPORT_CONTENT_WAIT_SECS", defaults.content_wait)?,
            render_timeout: secs(&get, "REPORT_RENDER_TIMEOUT_SECS", defaults.render_timeout)?,
            pipeline_timeout: secs(&get, "REPORT_PIPELINE_TIMEOUT_SECS", defaults.pipeline_timeout)?,
            render_attempts,
            server_host: get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse(&get, "SERVER_PORT", defaults.server_port)?,
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn secs<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse(get, key, default.as_secs()).map(Duration::from_secs)
}
