//! HTML to PDF rendering.
//!
//! `DocumentRenderer` is the backend seam: it turns a composed document into PDF
//! bytes and knows nothing about files. `PdfRenderer` wraps a backend with the
//! attempt loop, atomic persistence and size validation.

pub mod assets;
pub mod chromium;

pub use chromium::ChromiumRenderer;

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::models::{AuthContext, Orientation, RenderedReport};
use super::ReportError;
use crate::metrics;

/// Smallest PDF accepted as a real render. Anything below is a blank or broken page.
pub const DEFAULT_MIN_PDF_BYTES: u64 = 50 * 1024;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} timed out after {}s", after.as_secs())]
    Timeout {
        stage: &'static str,
        after: Duration,
    },
    #[error("browser exited with status {code:?}: {stderr}")]
    BrowserExit { code: Option<i32>, stderr: String },
    #[error("rendered PDF is {size} bytes, below the {min} byte minimum")]
    Undersized { size: u64, min: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset {url} rejected credentials with HTTP {status}")]
    AssetAuth { url: String, status: u16 },
    #[error("asset error: {0}")]
    Asset(String),
    #[error("write abandoned before {} was replaced", .0.display())]
    Cancelled(PathBuf),
}

impl RenderError {
    /// Timeouts and undersized output are worth another attempt; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Undersized { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
}

impl PageFormat {
    pub fn css_size(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::Letter => "letter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top: 12.0,
            right: 10.0,
            bottom: 12.0,
            left: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub page_format: PageFormat,
    pub margins_mm: PageMargins,
    pub orientation: Orientation,
    pub base_url: Option<String>,
    pub auth: Option<AuthContext>,
}

impl RenderOptions {
    /// CSS `@page` rule carrying size, orientation and margins.
    pub fn page_rule(&self) -> String {
        let m = &self.margins_mm;
        format!(
            "@page {{ size: {} {}; margin: {}mm {}mm {}mm {}mm; }}",
            self.page_format.css_size(),
            self.orientation.css_keyword(),
            m.top,
            m.right,
            m.bottom,
            m.left
        )
    }
}

#[async_trait]
pub trait DocumentRenderer {
    async fn render_to_pdf(&self, html: &str, options: &RenderOptions)
        -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RenderPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub min_bytes: u64,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(500),
            min_bytes: DEFAULT_MIN_PDF_BYTES,
        }
    }
}

#[derive(Clone)]
pub struct PdfRenderer {
    backend: Arc<dyn DocumentRenderer + Send + Sync>,
    policy: RenderPolicy,
}

impl PdfRenderer {
    pub fn new(backend: Arc<dyn DocumentRenderer + Send + Sync>, policy: RenderPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &RenderPolicy {
        &self.policy
    }

    /// Renders `html` and stores it at `output_path`, retrying transient failures.
    pub async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        output_path: &Path,
    ) -> Result<RenderedReport, ReportError> {
        let started = Instant::now();
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            log::info!(
                "Render attempt {}/{} for {}",
                attempt,
                attempts,
                output_path.display()
            );

            match self.attempt(html, options, output_path).await {
                Ok(byte_size) => {
                    metrics::record_render_attempt("ok");
                    log::info!(
                        "Render attempt {} produced {} bytes, validation passed",
                        attempt,
                        byte_size
                    );
                    return Ok(RenderedReport {
                        file_path: output_path.to_path_buf(),
                        byte_size,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(err) if err.is_retryable() => {
                    metrics::record_render_attempt("retryable");
                    log::warn!("Render attempt {} failed: {}", attempt, err);
                    if attempt >= attempts {
                        return Err(ReportError::RenderFailedAfterRetries {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                }
                Err(err) => {
                    metrics::record_render_attempt("fatal");
                    log::error!("Render attempt {} failed: {}", attempt, err);
                    return Err(ReportError::Render(err));
                }
            }
        }
    }

    async fn attempt(
        &self,
        html: &str,
        options: &RenderOptions,
        output_path: &Path,
    ) -> Result<u64, RenderError> {
        let bytes = self.backend.render_to_pdf(html, options).await?;
        let path = output_path.to_path_buf();
        let min_bytes = self.policy.min_bytes;
        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancelled.clone());

        tokio::task::spawn_blocking(move || persist_pdf(&path, &bytes, min_bytes, &cancelled))
            .await
            .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))?
    }
}

/// Raises the flag when the awaiting render future goes away, e.g. on a
/// pipeline timeout, so the blocking write does not rename afterwards.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Writes next to `path` and renames into place once the size checks out.
///
/// The size is read back from disk, not taken from the buffer. An undersized
/// temp file is dropped, so a previous good report at `path` survives. When
/// `cancelled` is set before the rename, the temp file is discarded too.
pub fn persist_pdf(
    path: &Path,
    bytes: &[u8],
    min_bytes: u64,
    cancelled: &AtomicBool,
) -> Result<u64, RenderError> {
    let dir: PathBuf = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    let size = tmp.as_file().metadata()?.len();
    if size < min_bytes {
        return Err(RenderError::Undersized {
            size,
            min: min_bytes,
        });
    }

    if cancelled.load(Ordering::SeqCst) {
        return Err(RenderError::Cancelled(path.to_path_buf()));
    }
    tmp.persist(path).map_err(|e| RenderError::Io(e.error))?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Pops one scripted outcome per call; repeats the last one when exhausted.
    struct ScriptedRenderer {
        outcomes: parking_lot::Mutex<Vec<Result<usize, &'static str>>>,
        calls: AtomicU32,
    }

    impl ScriptedRenderer {
        fn new(outcomes: Vec<Result<usize, &'static str>>) -> Self {
            Self {
                outcomes: parking_lot::Mutex::new(outcomes),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentRenderer for ScriptedRenderer {
        async fn render_to_pdf(
            &self,
            _html: &str,
            _options: &RenderOptions,
        ) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut outcomes = self.outcomes.lock();
                if outcomes.len() > 1 {
                    outcomes.remove(0)
                } else {
                    outcomes[0]
                }
            };
            match next {
                Ok(len) => Ok(vec![b'%'; len]),
                Err("timeout") => Err(RenderError::Timeout {
                    stage: "print",
                    after: Duration::from_secs(1),
                }),
                Err(other) => Err(RenderError::BrowserExit {
                    code: Some(1),
                    stderr: other.to_string(),
                }),
            }
        }
    }

    fn policy(attempts: u32) -> RenderPolicy {
        RenderPolicy {
            attempts,
            backoff: Duration::from_millis(1),
            min_bytes: 1024,
        }
    }

    #[test]
    fn test_page_rule() {
        let options = RenderOptions {
            orientation: Orientation::Landscape,
            ..Default::default()
        };
        assert_eq!(
            options.page_rule(),
            "@page { size: A4 landscape; margin: 12mm 10mm 12mm 10mm; }"
        );
    }

    #[tokio::test]
    async fn test_success_persists_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pdf");
        let renderer = PdfRenderer::new(Arc::new(ScriptedRenderer::new(vec![Ok(4096)])), policy(2));

        let report = renderer
            .render("<html></html>", &RenderOptions::default(), &path)
            .await
            .unwrap();

        assert_eq!(report.byte_size, 4096);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_undersized_then_ok_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let backend = Arc::new(ScriptedRenderer::new(vec![Ok(10), Ok(2048)]));
        let renderer = PdfRenderer::new(backend.clone(), policy(2));

        let report = renderer
            .render("", &RenderOptions::default(), &path)
            .await
            .unwrap();

        assert_eq!(report.byte_size, 2048);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fold_into_single_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let backend = Arc::new(ScriptedRenderer::new(vec![Err("timeout")]));
        let renderer = PdfRenderer::new(backend.clone(), policy(3));

        let err = renderer
            .render("", &RenderOptions::default(), &path)
            .await
            .unwrap_err();

        match err {
            ReportError::RenderFailedAfterRetries { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, RenderError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let backend = Arc::new(ScriptedRenderer::new(vec![Err("crash")]));
        let renderer = PdfRenderer::new(backend.clone(), policy(3));

        let err = renderer
            .render("", &RenderOptions::default(), &path)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Render(RenderError::BrowserExit { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_undersized_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let live = AtomicBool::new(false);
        persist_pdf(&path, &[1u8; 200], 100, &live).unwrap();

        let err = persist_pdf(&path, &[1u8; 10], 100, &live).unwrap_err();
        assert!(matches!(err, RenderError::Undersized { size: 10, min: 100 }));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 200);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_abandoned_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let cancelled = AtomicBool::new(true);

        let err = persist_pdf(&path, &[1u8; 200], 100, &cancelled).unwrap_err();
        assert!(matches!(err, RenderError::Cancelled(_)));
        assert!(!err.is_retryable());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dropped_render_raises_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        drop(CancelOnDrop(flag.clone()));
        assert!(flag.load(Ordering::SeqCst));
    }
}
