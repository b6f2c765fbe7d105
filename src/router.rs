/// HTTP surface of the sign-up service.
///
/// - `POST /api/submit` runs one submission through the pipeline
/// - `GET /health` checks the primary store is reachable
///
/// Handlers build a framework `Response`, which converts into an axum response.
use crate::orm::Db;
use crate::pipeline::{Outcome, Pipeline, UNEXPECTED_MESSAGE};
use crate::settings::Settings;
use axum::Router as AxumRouter;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

pub const SUBMIT_PATH: &str = "/api/submit";
pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub pipeline: Pipeline,
    pub settings: Arc<Settings>,
}

/// Represents the outcome of an HTTP handler: status, body and headers.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Construct a new HTTP 404 "not found" response.
    pub fn not_found() -> Self {
        Response {
            status_code: 404,
            body: "404 Not Found".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Construct a new HTTP JSON response.
    /// Accepts any serde-serializable payload, status, and custom headers.
    pub fn json<T: Serialize>(
        data: T,
        status_code: u16,
        mut headers: HashMap<String, String>,
    ) -> Self {
        headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        match serde_json::to_string(&data) {
            Ok(body) => Response {
                status_code,
                body,
                headers,
            },
            Err(_) => Response {
                status_code: 500,
                body: "{\"error\": \"Serialization failed\"}".to_string(),
                headers,
            },
        }
    }

    /// JSON `{ "error": message }` with the given status.
    pub fn error(message: &str, status_code: u16) -> Self {
        Response::json(json!({ "error": message }), status_code, HashMap::new())
    }

    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success(id) => Response::json(
                json!({ "success": true, "id": id }),
                outcome.status_code(),
                HashMap::new(),
            ),
            _ => Response::error(
                outcome.error_message().unwrap_or(UNEXPECTED_MESSAGE),
                outcome.status_code(),
            ),
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Maps status codes to HTTP status text for responses.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// `POST /api/submit`. The body is decoded here so a malformed payload maps
/// to the generic failure instead of an extractor rejection.
pub async fn submit_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let form = match serde_json::from_slice(&body) {
        Ok(form) => form,
        Err(e) => {
            log::error!("Unreadable submission body: {}", e);
            return Response::error(UNEXPECTED_MESSAGE, 500);
        }
    };
    let outcome = state.pipeline.submit(form).await;
    let response = Response::from_outcome(&outcome);
    log_response(&Method::POST, SUBMIT_PATH, &response);
    response
}

/// `GET /health`.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let response = match state.db.fetch_all::<(i64,)>("SELECT 1").await {
        Ok(_) => Response::json(json!({ "status": "ok" }), 200, HashMap::new()),
        Err(e) => {
            log::error!("Health check failed: {}", e);
            Response::json(json!({ "status": "unavailable" }), 503, HashMap::new())
        }
    };
    log_response(&Method::GET, HEALTH_PATH, &response);
    response
}

/// Any route other than the two above.
pub async fn not_found_handler(method: Method, uri: Uri) -> Response {
    let response = Response::not_found();
    log_response(&method, uri.path(), &response);
    response
}

fn log_response(method: &Method, path: &str, response: &Response) {
    log::debug!(
        "{} {} -> {} {}",
        method,
        path,
        response.status_code,
        status_text(response.status_code)
    );
}

pub fn build_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route(SUBMIT_PATH, post(submit_handler))
        .route(HEALTH_PATH, get(health_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn run(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = state.settings.bind_address();
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("HTTP server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
