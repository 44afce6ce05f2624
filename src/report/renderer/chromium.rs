//! Headless Chromium backend.
//!
//! Each render writes the prepared document into a private temp directory and
//! runs two short-lived browser processes against it: a DOM probe that waits for
//! the content anchor, then the PDF print. Children are spawned with
//! `kill_on_drop`, so a timeout or early return tears the browser down.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{assets, DocumentRenderer, RenderError, RenderOptions};
use crate::report::composer::{CONTENT_ANCHOR_ID, READY_ATTRIBUTE};

const STDERR_TAIL: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    /// The anchor is there but the readiness flag never flipped.
    AnchorOnly,
    Missing,
    TimedOut,
}

#[derive(Clone)]
pub struct ChromiumRenderer {
    program: PathBuf,
    content_wait: Duration,
    render_timeout: Duration,
    http: reqwest::Client,
}

impl ChromiumRenderer {
    pub fn new(program: impl Into<PathBuf>, content_wait: Duration, render_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            content_wait,
            render_timeout,
            http: reqwest::Client::new(),
        }
    }

    fn command(&self, profile_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--headless=new",
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            "--hide-scrollbars",
            "--no-first-run",
            "--no-default-browser-check",
        ])
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .stdin(Stdio::null())
        .kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, source: std::io::Error) -> RenderError {
        RenderError::Launch {
            program: self.program.display().to_string(),
            source,
        }
    }

    /// Best effort: only a launch failure is reported, everything else is logged.
    async fn probe_content(&self, url: &str, profile_dir: &Path) -> Result<ProbeOutcome, RenderError> {
        let mut cmd = self.command(profile_dir);
        cmd.arg("--dump-dom")
            .arg(format!("--virtual-time-budget={}", self.content_wait.as_millis()))
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| self.launch_error(e))?;
        let outcome = match tokio::time::timeout(self.content_wait, child.wait_with_output()).await {
            Ok(Ok(output)) => classify_dom(&String::from_utf8_lossy(&output.stdout)),
            Ok(Err(e)) => {
                log::warn!("Content probe failed to collect output: {}", e);
                ProbeOutcome::Missing
            }
            Err(_) => ProbeOutcome::TimedOut,
        };

        match outcome {
            ProbeOutcome::Ready => log::debug!("Content anchor present and report ready"),
            ProbeOutcome::AnchorOnly => {
                log::warn!("Readiness flag not set before the probe ended, printing anyway")
            }
            ProbeOutcome::Missing => {
                log::warn!("Content anchor #{} not found, printing anyway", CONTENT_ANCHOR_ID)
            }
            ProbeOutcome::TimedOut => log::warn!(
                "Content wait timed out after {}s, printing anyway",
                self.content_wait.as_secs()
            ),
        }
        Ok(outcome)
    }

    async fn print_to_pdf(&self, url: &str, profile_dir: &Path, pdf_path: &Path) -> Result<(), RenderError> {
        let mut cmd = self.command(profile_dir);
        cmd.arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(format!("--virtual-time-budget={}", self.content_wait.as_millis()))
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| self.launch_error(e))?;
        let output = tokio::time::timeout(self.render_timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout {
                stage: "PDF export",
                after: self.render_timeout,
            })??;

        if !output.status.success() {
            return Err(RenderError::BrowserExit {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRenderer for ChromiumRenderer {
    async fn render_to_pdf(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let document = assets::prepare_document(&self.http, html, options).await?;

        let workdir = tempfile::tempdir()?;
        let html_path = workdir.path().join("report.html");
        let pdf_path = workdir.path().join("report.pdf");
        let profile_dir = workdir.path().join("profile");
        tokio::fs::write(&html_path, document.as_bytes()).await?;

        let url = format!("file://{}", html_path.display());
        self.probe_content(&url, &profile_dir).await?;
        self.print_to_pdf(&url, &profile_dir, &pdf_path).await?;

        match tokio::fs::read(&pdf_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::BrowserExit {
                code: Some(0),
                stderr: "browser exited without writing a PDF".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads the probe's serialized DOM for the anchor and the readiness attribute.
pub fn classify_dom(dom: &str) -> ProbeOutcome {
    let anchor = format!(r#"id="{CONTENT_ANCHOR_ID}""#);
    let ready = format!(r#"{READY_ATTRIBUTE}="true""#);
    match (dom.contains(&anchor), dom.contains(&ready)) {
        (true, true) => ProbeOutcome::Ready,
        (true, false) => ProbeOutcome::AnchorOnly,
        _ => ProbeOutcome::Missing,
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}
