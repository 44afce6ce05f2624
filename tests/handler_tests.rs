mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use common::{pipeline, sample_source, FakeRenderer};
use daily_damage_report::report::handlers::DailyReportResponse;
use daily_damage_report::{configure_app, AppState, ReportConfig};

fn state(output_dir: &std::path::Path) -> web::Data<AppState> {
    let config = ReportConfig {
        output_dir: output_dir.to_path_buf(),
        ..ReportConfig::default()
    };
    let pipeline = pipeline(Arc::new(sample_source()), Arc::new(FakeRenderer::new()));
    web::Data::new(AppState::new_with_pipeline(Arc::new(pipeline), config))
}

#[actix_web::test]
async fn test_generate_then_download() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(App::new().app_data(state(dir.path())).configure(configure_app)).await;

    let req = test::TestRequest::post()
        .uri("/api/reportes/diario")
        .set_json(json!({ "fecha": "2025-03-10", "formato": "pdf", "orientacion": "horizontal" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: DailyReportResponse = test::read_body_json(resp).await;
    assert!(body.success);
    assert_eq!(body.file_name, "reporte_danos_2025-03-10.pdf");
    assert_eq!(body.fecha, "2025-03-10");
    assert!(body.size > 0);

    let req = test::TestRequest::get()
        .uri("/api/reportes/reporte_danos_2025-03-10.pdf")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let pdf = test::read_body(resp).await;
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(pdf.len() as u64, body.size);
}

#[actix_web::test]
async fn test_invalid_inputs_get_structured_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(App::new().app_data(state(dir.path())).configure(configure_app)).await;

    let bodies = [
        json!({ "fecha": "10/03/2025" }),
        json!({ "formato": "pdf" }),
        json!({ "fecha": "2025-03-10", "formato": "docx" }),
        json!({ "fecha": "2025-03-10", "orientacion": "diagonal" }),
    ];
    for payload in bodies {
        let req = test::TestRequest::post()
            .uri("/api/reportes/diario")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{payload}");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().unwrap().contains("invalid input"));
        assert_eq!(body["error"], json!("BadRequest"));
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[actix_web::test]
async fn test_malformed_json_uses_error_shape() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(App::new().app_data(state(dir.path())).configure(configure_app)).await;

    let req = test::TestRequest::post()
        .uri("/api/reportes/diario")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn test_download_rejects_foreign_names_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "secret").unwrap();
    let app = test::init_service(App::new().app_data(state(dir.path())).configure(configure_app)).await;

    let req = test::TestRequest::get().uri("/api/reportes/notes.txt").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/reportes/reporte_danos_1999-01-01.pdf")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_metrics_endpoint_exposes_report_counters() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(App::new().app_data(state(dir.path())).configure(configure_app)).await;

    let req = test::TestRequest::post()
        .uri("/api/reportes/diario")
        .set_json(json!({ "fecha": "2025-03-11" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(text.contains("report_generations_total"));
    assert!(text.contains("report_render_attempts_total"));
}
