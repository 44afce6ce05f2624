use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{error::InternalError, http::header, web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod db;
pub mod metrics;
pub mod report;

pub use crate::config::ReportConfig;
pub use crate::db::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            success: false,
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::report::handlers::generate_daily_report,
        crate::report::handlers::download_report,
        crate::report::handlers::metrics_endpoint
    ),
    components(schemas(
        report::handlers::DailyReportRequest,
        report::handlers::DailyReportResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Reports", description = "Daily damage report generation.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost")
    )
)]
pub struct ApiDoc;

/// Malformed JSON bodies get the same error shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse::bad_request(&err.to_string()));
        InternalError::from_response(err, response).into()
    })
}

/// Routes shared by the server and the HTTP tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::scope("/api").configure(report::handlers::config))
        .service(web::resource("/metrics").route(web::get().to(report::handlers::metrics_endpoint)));
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ReportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::new_with_config(config.clone()) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to set up the database pool. Please check DATABASE_URL in .env. Error: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Starting server at http://{}:{} (reports in {})",
        config.server_host,
        config.server_port,
        config.output_dir.display()
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure_app)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
