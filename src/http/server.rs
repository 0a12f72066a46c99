//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: one catch-all route into the director
//! - Wire up middleware (request ID, tracing, timeout)
//! - Convert axum requests into `HttpRequest` and canonical responses back
//! - Run dispatches on the blocking pool
//! - Apply reloaded configs to the director
//! - Graceful shutdown on Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use percent_encoding::percent_decode_str;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::schema::{DispatchConfig, ServerConfig};
use crate::dispatch::context::Session;
use crate::dispatch::director::{Director, Dispatched};
use crate::error::DispatchError;
use crate::http::request::{HttpRequest, Vars};

pub const X_REQUEST_ID: &str = "x-request-id";

/// UUID v4 request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    director: Arc<Director>,
    max_body_bytes: usize,
}

/// HTTP front end for a [`Director`].
pub struct DispatchServer {
    router: Router,
    director: Arc<Director>,
}

impl DispatchServer {
    pub fn new(director: Arc<Director>, config: &ServerConfig) -> Self {
        let state = AppState {
            director: Arc::clone(&director),
            max_body_bytes: config.max_body_bytes,
        };
        Self {
            router: Self::build_router(config, state),
            director,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn director(&self) -> &Arc<Director> {
        &self.director
    }

    /// Apply every config received on `updates` until the sender is dropped.
    pub fn spawn_reloader(&self, mut updates: mpsc::UnboundedReceiver<DispatchConfig>) -> JoinHandle<()> {
        let director = Arc::clone(&self.director);
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                if let Err(e) = director.reload(&config) {
                    tracing::error!(error = %e, "Rejected reloaded config, keeping current rules");
                }
            }
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let request = match to_http_request(&parts, body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let director = Arc::clone(&state.director);
    let result = tokio::task::spawn_blocking(move || {
        director.dispatch(request, Session::new(), None)
    })
    .await
    .map_err(|e| DispatchError::Task(e.to_string()))
    .and_then(|dispatched| dispatched);

    match result {
        Ok(Dispatched {
            response: Some(response),
            ..
        }) => response.into_response(),
        Ok(Dispatched { response: None, .. }) => {
            tracing::debug!(request_id = %request_id, "Output suppressed by post-request filter");
            (StatusCode::INTERNAL_SERVER_ERROR, Body::empty()).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Dispatch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Convert transport parts into a dispatchable request.
pub fn to_http_request(parts: &Parts, body: Bytes) -> Result<HttpRequest, DispatchError> {
    let path = decode_path(parts.uri.path())?;
    let mut builder = HttpRequest::builder(parts.method.clone(), &path).headers(parts.headers.clone());
    if let Some(query) = parts.uri.query() {
        builder = builder.get_vars(parse_vars(query.as_bytes()));
    }
    if is_form(&parts.headers) {
        builder = builder.post_vars(parse_vars(&body));
    }
    builder.body(body).build()
}

/// Percent-decode each path segment; `/` stays the separator.
fn decode_path(raw: &str) -> Result<String, DispatchError> {
    raw.split('/')
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8()
                .map_err(|_| DispatchError::MalformedPath(raw.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|segments| segments.join("/"))
}

fn parse_vars(input: &[u8]) -> Vars {
    form_urlencoded::parse(input).into_owned().collect()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
