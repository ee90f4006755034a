//! fin-extract - Financial fact extraction HTTP server
//!
//! Port: 9001 (PORT)
//! Config: FIN_EXTRACT_CONFIG (JSON file, optional)
//! Timeout: FIN_EXTRACT_TIMEOUT_MS per request

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use fin_extract::{to_csv_string, to_csv_string_with_labels, Engine, EngineConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_PORT: &str = "9001";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Request bodies up to 16 MiB; the engine truncates text further.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

struct AppState {
    engine: Arc<Engine>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ExtractRequest {
    text: String,
}

#[derive(Deserialize)]
struct BatchRequest {
    documents: Vec<String>,
    /// Optional per-document labels (file names) for the CSV `document` column.
    #[serde(default)]
    names: Option<Vec<String>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct StatsResponse<'a> {
    status: &'static str,
    threads: usize,
    version: &'static str,
    analyzer: &'a str,
    recognizer: Option<&'a str>,
    terms: Vec<&'a str>,
    max_input_length: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, error: impl ToString) -> HttpResponse {
    builder.json(ErrorResponse {
        error: error.to_string(),
    })
}

/// Run `job` on the blocking pool, bounded by the configured timeout.
async fn run_blocking<T, F>(state: &AppState, job: F) -> Result<T, HttpResponse>
where
    F: FnOnce(&Engine) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    match tokio::time::timeout(state.timeout, web::block(move || job(&engine))).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(error_response(HttpResponse::InternalServerError(), err)),
        Err(_) => {
            warn!(timeout_ms = state.timeout.as_millis() as u64, "extraction timed out");
            Err(error_response(HttpResponse::GatewayTimeout(), "extraction timed out"))
        }
    }
}

// Health check
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: "fin-extract",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Stats
async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let engine = &state.engine;
    HttpResponse::Ok().json(StatsResponse {
        status: "ready",
        threads: rayon::current_num_threads(),
        version: env!("CARGO_PKG_VERSION"),
        analyzer: engine.analyzer_name(),
        recognizer: engine.recognizer_name(),
        terms: engine.vocabulary().iter().collect(),
        max_input_length: engine.config().max_input_length,
    })
}

// Single document -> FinalRecord
async fn extract(state: web::Data<AppState>, req: web::Json<ExtractRequest>) -> HttpResponse {
    let text = req.into_inner().text;
    match run_blocking(&state, move |engine| engine.extract_detailed(&text)).await {
        Ok(extraction) => {
            if let Some(reason) = &extraction.degraded {
                warn!(%reason, "domain recognizer failed, used generic entities");
            }
            HttpResponse::Ok().json(extraction.record)
        }
        Err(response) => response,
    }
}

// Single document -> FinalRecord + provenance
async fn extract_detailed(state: web::Data<AppState>, req: web::Json<ExtractRequest>) -> HttpResponse {
    let text = req.into_inner().text;
    match run_blocking(&state, move |engine| engine.extract_detailed(&text)).await {
        Ok(extraction) => {
            if let Some(reason) = &extraction.degraded {
                warn!(%reason, "domain recognizer failed, used generic entities");
            }
            HttpResponse::Ok().json(extraction)
        }
        Err(response) => response,
    }
}

// Raw body; non-UTF-8 yields the empty record
async fn extract_text(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    match run_blocking(&state, move |engine| engine.extract_bytes(&body)).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(response) => response,
    }
}

// Batch extraction
async fn batch(state: web::Data<AppState>, req: web::Json<BatchRequest>) -> HttpResponse {
    let documents = req.into_inner().documents;
    info!(documents = documents.len(), "batch extraction");
    match run_blocking(&state, move |engine| engine.extract_batch(&documents)).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(response) => response,
    }
}

// Batch extraction as CSV
async fn batch_csv(state: web::Data<AppState>, req: web::Json<BatchRequest>) -> HttpResponse {
    let BatchRequest { documents, names } = req.into_inner();
    if let Some(names) = &names {
        if names.len() != documents.len() {
            return error_response(
                HttpResponse::BadRequest(),
                format!("{} names for {} documents", names.len(), documents.len()),
            );
        }
    }
    info!(documents = documents.len(), named = names.is_some(), "batch extraction (csv)");
    let job = move |engine: &Engine| {
        let records = engine.extract_batch(&documents);
        match names {
            Some(names) => to_csv_string_with_labels(engine.vocabulary(), &records, &names),
            None => to_csv_string(engine.vocabulary(), &records),
        }
    };
    match run_blocking(&state, job).await {
        Ok(Ok(csv)) => HttpResponse::Ok().content_type("text/csv; charset=utf-8").body(csv),
        Ok(Err(err)) => error_response(HttpResponse::InternalServerError(), err),
        Err(response) => response,
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(BODY_LIMIT))
        .app_data(web::PayloadConfig::new(BODY_LIMIT))
        .route("/health", web::get().to(health))
        .route("/stats", web::get().to(stats))
        .route("/extract", web::post().to(extract))
        .route("/extract/detailed", web::post().to(extract_detailed))
        .route("/extract/text", web::post().to(extract_text))
        .route("/batch", web::post().to(batch))
        .route("/batch/csv", web::post().to(batch_csv));
}

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("FIN_EXTRACT_CONFIG") {
        Ok(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("loading engine config from {}", path)),
        Err(_) => Ok(EngineConfig::default()),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fin_extract=info,actix_web=info".into()),
        )
        .init();

    let config = load_config()?;
    let engine = Engine::new(config).context("compiling extraction engine")?;

    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let addr = format!("127.0.0.1:{}", port);
    let timeout_ms = std::env::var("FIN_EXTRACT_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS);

    println!(r#"
╔═══════════════════════════════════════════════════════════╗
║       fin-extract - Financial Fact Extraction             ║
║       term → value association, parallel batches         ║
╠═══════════════════════════════════════════════════════════╣
║  Endpoints:                                               ║
║    POST /extract           - FinalRecord for one document ║
║    POST /extract/detailed  - FinalRecord + provenance     ║
║    POST /extract/text      - Raw text body                ║
║    POST /batch             - Many documents (JSON)        ║
║    POST /batch/csv         - Many documents (CSV report)  ║
║    GET  /health            - Health check                 ║
║    GET  /stats             - Engine statistics            ║
╚═══════════════════════════════════════════════════════════╝
    "#);

    info!(
        %addr,
        terms = engine.vocabulary().len(),
        recognizer = engine.recognizer_name().unwrap_or("none"),
        threads = rayon::current_num_threads(),
        timeout_ms,
        "starting server"
    );

    let state = web::Data::new(AppState {
        engine: Arc::new(engine),
        timeout: Duration::from_millis(timeout_ms),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes)
    })
    .bind(&addr)
    .with_context(|| format!("binding {}", addr))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use serde_json::{json, Value};

    fn state() -> web::Data<AppState> {
        let config = EngineConfig::default().with_terms(["revenue", "net income", "dividend"]);
        web::Data::new(AppState {
            engine: Arc::new(Engine::new(config).unwrap()),
            timeout: Duration::from_secs(5),
        })
    }

    const SCENARIO: &str =
        "ABC Corp reported $9,845 crore in revenue for FY 2023, with a net income of $1,941 crore.";

    #[actix_rt::test]
    async fn test_health() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_rt::test]
    async fn test_stats_lists_terms() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::get().uri("/stats").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["terms"], json!(["revenue", "net income", "dividend"]));
        assert_eq!(body["analyzer"], "rule-based");
        assert_eq!(body["recognizer"], Value::Null);
    }

    #[actix_rt::test]
    async fn test_extract() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/extract")
            .set_json(json!({ "text": SCENARIO }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!({
                "company_name": "ABC Corp",
                "financial_details": {
                    "revenue": "$9,845 crore",
                    "net income": "$1,941 crore",
                    "dividend": "Not Found"
                }
            })
        );
    }

    #[actix_rt::test]
    async fn test_extract_detailed() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/extract/detailed")
            .set_json(json!({ "text": SCENARIO }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["truncated"], false);
        assert_eq!(body["provenance"][0]["term"], "revenue");
        assert_eq!(body["provenance"][0]["stage"], "sentence");
        assert_eq!(body["record"]["company_name"], "ABC Corp");
    }

    #[actix_rt::test]
    async fn test_extract_text_rejects_invalid_utf8() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/extract/text")
            .set_payload(vec![0xffu8, 0xfe, b'$', b'1'])
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["company_name"], "Unknown Company");
        assert_eq!(body["financial_details"]["revenue"], "Not Found");
    }

    #[actix_rt::test]
    async fn test_batch() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/batch")
            .set_json(json!({ "documents": [SCENARIO, "Dividend: not disclosed."] }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["financial_details"]["revenue"], "$9,845 crore");
        assert_eq!(body[1]["financial_details"]["dividend"], "Not Available");
    }

    #[actix_rt::test]
    async fn test_batch_csv() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/batch/csv")
            .set_json(json!({ "documents": [SCENARIO] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let content_type = resp
            .headers()
            .get(actix_web::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/csv"));
        let body = test::read_body(resp).await;
        let csv = std::str::from_utf8(&body).unwrap();
        assert!(csv.starts_with("document,company_name,revenue,net income,dividend\n"));
        assert!(csv.contains(r#"1,ABC Corp,"$9,845 crore","$1,941 crore",Not Found"#));
    }

    #[actix_rt::test]
    async fn test_batch_csv_with_names() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/batch/csv")
            .set_json(json!({
                "documents": [SCENARIO, "Dividend: not disclosed."],
                "names": ["abc_fy2023.txt", "board.txt"]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        let csv = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], r#"abc_fy2023.txt,ABC Corp,"$9,845 crore","$1,941 crore",Not Found"#);
        assert!(lines[2].starts_with("board.txt,"));

        let req = test::TestRequest::post()
            .uri("/batch/csv")
            .set_json(json!({ "documents": [SCENARIO], "names": ["a.txt", "b.txt"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_malformed_json_is_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
        let req = test::TestRequest::post()
            .uri("/extract")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"txt\": 1}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
