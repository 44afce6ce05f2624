use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;

use super::models::{Orientation, ReportRequest};
use super::pipeline::parse_report_date;
use super::ReportError;
use crate::{metrics, AppState, ErrorResponse};

lazy_static! {
    static ref REPORT_FILE_NAME: Regex =
        Regex::new(r"^reporte_danos_\d{4}-\d{2}-\d{2}\.pdf$").expect("valid file name pattern");
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DailyReportRequest {
    /// Target date, `YYYY-MM-DD`.
    #[schema(example = "2025-03-05")]
    pub fecha: Option<String>,
    /// Output format. Only `pdf` is supported.
    #[schema(example = "pdf")]
    pub formato: Option<String>,
    /// `vertical` (default) or `horizontal`.
    #[schema(example = "vertical")]
    pub orientacion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportResponse {
    pub success: bool,
    pub file_name: String,
    pub file_path: String,
    /// Bytes.
    pub size: u64,
    /// Milliseconds.
    pub duration: u64,
    pub fecha: String,
}

/// Validates the body into a pipeline request without touching the disk.
pub fn build_request(body: &DailyReportRequest, output_dir: &Path) -> Result<ReportRequest, ReportError> {
    let raw_date = body
        .fecha
        .as_deref()
        .ok_or_else(|| ReportError::InvalidInput("field 'fecha' is required".to_string()))?;
    let date = parse_report_date(raw_date)?;

    if let Some(format) = body.formato.as_deref() {
        if !format.trim().eq_ignore_ascii_case("pdf") {
            return Err(ReportError::InvalidInput(format!(
                "format '{format}' is not supported, use 'pdf'"
            )));
        }
    }

    let orientation = match body.orientacion.as_deref() {
        None => Orientation::Portrait,
        Some(label) => Orientation::from_label(label).ok_or_else(|| {
            ReportError::InvalidInput(format!(
                "orientation '{label}' must be 'vertical' or 'horizontal'"
            ))
        })?,
    };

    let mut request = ReportRequest::new(date, output_dir);
    request.orientation = orientation;
    Ok(request)
}

fn report_error_response(err: &ReportError) -> HttpResponse {
    let mut message = err.to_string();
    if let Some(hint) = err.remediation_hint() {
        message = format!("{message}. {hint}");
    }
    if err.is_client_error() {
        HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message))
    } else {
        HttpResponse::InternalServerError().json(ErrorResponse::new("ReportGenerationFailed", &message))
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Reports",
    post,
    path = "/reportes/diario",
    request_body = DailyReportRequest,
    responses(
        (status = 200, description = "Report generated", body = DailyReportResponse),
        (status = 400, description = "Invalid date, format or orientation", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn generate_daily_report(
    body: web::Json<DailyReportRequest>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let request = match build_request(&body, &data.config.output_dir) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected daily report request: {}", e);
            return report_error_response(&e);
        }
    };

    info!("Daily report requested over HTTP for {}", request.date);
    match data.pipeline.generate_daily_report_pdf(&request).await {
        Ok(report) => HttpResponse::Ok().json(DailyReportResponse {
            success: true,
            file_name: report.file_name(),
            file_path: report.file_path.display().to_string(),
            size: report.byte_size,
            duration: report.duration_ms,
            fecha: request.date.format("%Y-%m-%d").to_string(),
        }),
        Err(e) => report_error_response(&e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Reports",
    get,
    path = "/reportes/{file_name}",
    responses(
        (status = 200, description = "The PDF as application/pdf"),
        (status = 400, description = "Not a report file name", body = ErrorResponse),
        (status = 404, description = "Report not generated yet", body = ErrorResponse)
    ),
    params(
        ("file_name" = String, Path, description = "reporte_danos_<YYYY-MM-DD>.pdf")
    )
)]
pub async fn download_report(
    req: HttpRequest,
    file_name: web::Path<String>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let file_name = file_name.into_inner();
    if !REPORT_FILE_NAME.is_match(&file_name) {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
            "'{file_name}' is not a report file name"
        )));
    }

    let path = data.config.output_dir.join(&file_name);
    match NamedFile::open_async(&path).await {
        Ok(file) => file
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(file_name)],
            })
            .into_response(&req),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HttpResponse::NotFound()
            .json(ErrorResponse::not_found(&format!("Report '{file_name}' not found"))),
        Err(e) => {
            error!("Could not open report {}: {}", path.display(), e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error("Could not read report"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Reports",
    responses(
        (status = 200, description = "Prometheus text exposition format")
    )
)]
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::render_text() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error("Failed to encode metrics"))
        }
    }
}

/// Routes mounted under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/reportes/diario").route(web::post().to(generate_daily_report)))
        .service(web::resource("/reportes/{file_name}").route(web::get().to(download_report)));
}
