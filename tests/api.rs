// End-to-end tests for the upload API (feature "server")

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;

use finhealth::api::{build_router, AppState};
use finhealth::{setup_database, verify_count, StatementAnalyzer};

const BOUNDARY: &str = "finhealth-test-boundary";
const EXAMPLE_CSV: &str = "Type,Category,Amount\nRevenue,Sales,1000\nExpense,Rent,400\n";

fn test_app() -> (Router, AppState) {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    let state = AppState::new(conn, StatementAnalyzer::default());
    (build_router(state.clone(), 1024 * 1024), state)
}

fn multipart_body(filename: Option<&str>, content: &[u8], industry: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(filename) = filename {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(industry) = industry {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"industry\"\r\n\r\n{}\r\n",
                BOUNDARY, industry
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn example_xlsx() -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Type").unwrap();
    sheet.write_string(0, 1, "Category").unwrap();
    sheet.write_string(0, 2, "Amount").unwrap();
    sheet.write_string(1, 0, "Revenue").unwrap();
    sheet.write_string(1, 1, "Sales").unwrap();
    sheet.write_number(1, 2, 2000).unwrap();
    sheet.write_string(2, 0, "Expense").unwrap();
    sheet.write_string(2, 1, "Fuel").unwrap();
    sheet.write_number(2, 2, 1900).unwrap();
    workbook.save_to_buffer().unwrap()
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn stored_count(state: &AppState) -> i64 {
    let conn = state.db.lock().unwrap();
    verify_count(&conn).unwrap()
}

#[tokio::test]
async fn test_upload_csv_retail_example() {
    let (app, state) = test_app();
    let body = multipart_body(Some("statement.csv"), EXAMPLE_CSV.as_bytes(), None);

    let (status, json) = send(app, upload_request("/upload?industry=Retail", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revenue"], 1000.0);
    assert_eq!(json["expense"], 400.0);
    assert_eq!(json["profit"], 600.0);
    assert_eq!(json["margin"], 60.0);
    assert_eq!(json["tax_estimate"], 108.0);
    assert_eq!(json["forecast"], 1120.0);
    assert_eq!(json["health"], "Excellent");
    assert_eq!(json["credit_rating"], "High");
    assert_eq!(json["industry"], "Retail");
    assert!(json["security"].is_string());
    assert!(json["advice"]["en"].as_str().unwrap().contains("Retail"));
    assert!(json["assessment_id"].is_string());

    assert_eq!(stored_count(&state), 1);
}

#[tokio::test]
async fn test_industry_defaults_to_general() {
    let (app, _state) = test_app();
    let body = multipart_body(Some("statement.csv"), EXAMPLE_CSV.as_bytes(), None);

    let (status, json) = send(app, upload_request("/upload", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["industry"], "General");
    assert_eq!(json["target_margin"], 20.0);
}

#[tokio::test]
async fn test_industry_form_field_overrides_query() {
    let (app, _state) = test_app();
    let body = multipart_body(Some("statement.csv"), EXAMPLE_CSV.as_bytes(), Some("Services"));

    let (status, json) = send(app, upload_request("/upload?industry=Retail", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["industry"], "Services");
    assert_eq!(json["target_margin"], 40.0);
}

#[tokio::test]
async fn test_unsupported_format_is_error_payload() {
    let (app, state) = test_app();
    let body = multipart_body(Some("notes.txt"), EXAMPLE_CSV.as_bytes(), None);

    let (status, json) = send(app, upload_request("/upload", body)).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["kind"], "unsupported_format");
    assert_eq!(json["error"], "Unsupported file format: notes.txt");
    assert_eq!(stored_count(&state), 0);
}

#[tokio::test]
async fn test_parse_failure_is_error_payload() {
    let (app, state) = test_app();
    let body = multipart_body(Some("statement.csv"), b"foo,bar\n1,2\n", None);

    let (status, json) = send(app, upload_request("/upload", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "parse_error");
    assert!(json["error"].as_str().unwrap().starts_with("Analysis failed:"));
    assert_eq!(stored_count(&state), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_spreadsheet_and_csv_uploads() {
    let (app, state) = test_app();
    let xlsx = multipart_body(Some("books.xlsx"), &example_xlsx(), Some("Logistics"));
    let csv = multipart_body(Some("statement.csv"), EXAMPLE_CSV.as_bytes(), Some("Retail"));

    let ((xlsx_status, xlsx_json), (csv_status, csv_json)) = tokio::join!(
        send(app.clone(), upload_request("/upload", xlsx)),
        send(app, upload_request("/upload", csv)),
    );

    assert_eq!(xlsx_status, StatusCode::OK);
    assert_eq!(xlsx_json["revenue"], 2000.0);
    assert_eq!(xlsx_json["profit"], 100.0);
    assert_eq!(xlsx_json["margin"], 5.0);
    assert_eq!(xlsx_json["health"], "At Risk");
    assert_eq!(xlsx_json["credit_rating"], "High");

    assert_eq!(csv_status, StatusCode::OK);
    assert_eq!(csv_json["health"], "Excellent");

    assert_eq!(stored_count(&state), 2);
}

#[tokio::test]
async fn test_missing_file_part() {
    let (app, _state) = test_app();
    let body = multipart_body(None, b"", Some("Retail"));

    let (status, json) = send(app, upload_request("/upload", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "bad_request");
}

#[tokio::test]
async fn test_history_and_stats() {
    let (app, _state) = test_app();

    for industry in ["Retail", "Retail", "Logistics"] {
        let body = multipart_body(Some("statement.csv"), EXAMPLE_CSV.as_bytes(), Some(industry));
        let (status, _) = send(app.clone(), upload_request("/upload", body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::get("/api/assessments?industry=retail")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"][0]["credit_score"], "High");

    let request = Request::get("/api/stats").body(Body::empty()).unwrap();
    let (status, json) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["industry"], "Retail");
    assert_eq!(json["data"][0]["assessment_count"], 2);

    let request = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, json) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], "OK");
}
