//! HTTP API server.
//!
//! Minimal HTTP handling over raw tokio sockets: two POST endpoints plus a
//! health check, JSON in and out, permissive CORS for the local frontend.

use hoopquery::analyzer;
use hoopquery::config::Config;
use hoopquery::dashboard::DashboardService;
use hoopquery::db;
use hoopquery::llm::LlmClient;
use hoopquery::pipeline::Pipeline;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

struct AppState {
    pool: sqlx::PgPool,
    config: Config,
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;
    let state = Arc::new(AppState { pool, config });

    let listener = TcpListener::bind("0.0.0.0:8000").await?;
    info!("HoopQuery API listening on http://localhost:8000");

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from {}", addr);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_connection(stream, state).await;
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    use tokio::time::{timeout, Duration};

    // Read the request with a timeout so a stalled client cannot pin a task.
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 8192];

    let read_result = timeout(Duration::from_secs(10), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    if let Ok(s) = std::str::from_utf8(&buffer) {
                        if let Some(headers_end) = s.find("\r\n\r\n") {
                            match extract_content_length(s) {
                                Some(content_length) => {
                                    if buffer.len() >= headers_end + 4 + content_length {
                                        break;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                    if buffer.len() > 1_000_000 {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    if read_result.is_err() {
        warn!("Request read timeout");
        return;
    }
    if buffer.is_empty() {
        return;
    }

    let request = match String::from_utf8(buffer) {
        Ok(request) => request,
        Err(e) => {
            error!("Request is not valid UTF-8: {}", e);
            return;
        }
    };

    let response = handle_request(&request, &state).await;
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

async fn handle_request(request: &str, state: &AppState) -> String {
    let request_line = match request.lines().next() {
        Some(line) => line,
        None => return create_response(400, "Bad Request", "{}"),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let path = parts[1].trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    info!("{} {}", method, path);

    match (method, path) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"hoopquery-api"}"#)
        }
        ("POST", "/api/dashboards") => match parse_body(request) {
            Ok(query) => dashboard_endpoint(state, &query.question).await,
            Err(e) => client_error(&e),
        },
        ("POST", "/api/analysis") => match parse_body(request) {
            Ok(query) => analysis_endpoint(state, &query.question).await,
            Err(e) => client_error(&e),
        },
        _ => create_response(404, "Not Found", r#"{"error":"not found"}"#),
    }
}

fn parse_body(request: &str) -> Result<QueryRequest, String> {
    let body = request
        .split("\r\n\r\n")
        .nth(1)
        .ok_or_else(|| "missing request body".to_string())?;
    serde_json::from_str(body).map_err(|e| format!("invalid request body: {}", e))
}

async fn dashboard_endpoint(state: &AppState, question: &str) -> String {
    let service = DashboardService::new(state.pool.clone(), &state.config);
    match service.interpret_question(question).await {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(json) => create_response(200, "OK", &json),
            Err(e) => server_error(&e.to_string()),
        },
        Err(e) => {
            error!("Dashboard request failed: {}", e);
            client_error(&e.to_string())
        }
    }
}

async fn analysis_endpoint(state: &AppState, question: &str) -> String {
    let pipeline = Pipeline::new(state.pool.clone(), &state.config);
    let result = match pipeline.run(question).await {
        Ok(result) => result,
        Err(e) => {
            error!("Query pipeline failed: {}", e);
            return client_error(&e.to_string());
        }
    };

    let llm = LlmClient::new(
        state.config.openai_api_key.clone(),
        state.config.openai_model.clone(),
        state.config.openai_base_url.clone(),
    );
    match analyzer::analyze(&llm, &result).await {
        Ok(analysis) => {
            let body = serde_json::json!({
                "success": true,
                "analysis": analysis,
                "question": question,
            });
            create_response(200, "OK", &body.to_string())
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            client_error(&e.to_string())
        }
    }
}

fn client_error(message: &str) -> String {
    let body = serde_json::json!({"success": false, "error": message});
    create_response(400, "Bad Request", &body.to_string())
}

fn server_error(message: &str) -> String {
    let body = serde_json::json!({"success": false, "error": message});
    create_response(500, "Internal Server Error", &body.to_string())
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
