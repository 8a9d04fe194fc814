//! REST API for ChartInk webhooks
//!
//! Receives screener alerts and exposes health and recent-alert endpoints

use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use crate::context::AppContext;
use crate::processor::{sample_payload, ProcessOutcome};

/// API server for the webhook endpoints
pub struct WebhookApiServer {
    context: AppContext,
}

impl WebhookApiServer {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<SocketAddr>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.context.config.socket_addr();
        let (bound, server) =
            warp::serve(routes(self.context)).try_bind_with_graceful_shutdown(addr, shutdown)?;

        info!("Webhook API listening on http://{}", bound);
        server.await;
        info!("Webhook API on {} stopped", bound);
        Ok(bound)
    }
}

/// All routes, with rejections rendered as JSON
pub fn routes(
    context: AppContext,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_body = context.config.max_body_bytes;

    // ChartInk webhook endpoint
    let webhook = warp::path!("webhook" / "chartink")
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(max_body))
        .and(warp::body::bytes())
        .and(with_context(context.clone()))
        .and_then(receive_webhook);

    // Health check endpoint
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(health_check);

    // Built-in sample for manual testing
    let test = warp::path!("test")
        .and(warp::post())
        .and(with_context(context.clone()))
        .and_then(run_sample);

    // Most recent alerts, newest first
    let recent = warp::path!("alerts" / "recent")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_context(context))
        .and_then(recent_alerts);

    webhook
        .or(health)
        .or(test)
        .or(recent)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

// Helper function to inject the application context
fn with_context(
    context: AppContext,
) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}

fn json_reply(body: &Value, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), status)
}

/// Accepts `application/json` and `application/*+json`
fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Status code for a processed webhook
fn outcome_status(outcome: &ProcessOutcome) -> StatusCode {
    match outcome {
        ProcessOutcome::Stored(_) => StatusCode::OK,
        ProcessOutcome::Failed(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
        ProcessOutcome::Failed(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Receive a ChartInk webhook
async fn receive_webhook(
    content_type: Option<String>,
    body: Bytes,
    context: AppContext,
) -> Result<impl Reply, Rejection> {
    if !is_json_content_type(content_type.as_deref()) {
        warn!("Rejected webhook with content type {:?}", content_type);
        return Ok(json_reply(
            &json!({ "error": "Content-Type must be application/json" }),
            StatusCode::BAD_REQUEST,
        ));
    }

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        Ok(_) => {
            return Ok(json_reply(
                &json!({ "error": "Empty payload" }),
                StatusCode::BAD_REQUEST,
            ))
        }
        Err(e) => {
            warn!("Rejected webhook with invalid JSON: {}", e);
            return Ok(json_reply(
                &json!({ "error": format!("Invalid JSON payload: {}", e) }),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    info!(
        "Received webhook: {}",
        serde_json::to_string(&payload).unwrap_or_default()
    );

    let outcome = ProcessOutcome::from(context.processor.process(&payload).await);
    Ok(json_reply(&outcome.to_json(), outcome_status(&outcome)))
}

/// Check that the store is reachable
async fn health_check(context: AppContext) -> Result<impl Reply, Rejection> {
    let timestamp = chrono::Utc::now();

    match context.reader.ping().await {
        Ok(()) => Ok(json_reply(
            &json!({
                "status": "healthy",
                "timestamp": timestamp,
                "database": "connected",
            }),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("Health check failed: {}", e);
            Ok(json_reply(
                &json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": e.to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

/// Push the built-in sample payload through the full pipeline
async fn run_sample(context: AppContext) -> Result<impl Reply, Rejection> {
    let outcome = ProcessOutcome::from(context.processor.process(&sample_payload()).await);
    Ok(json_reply(&outcome.to_json(), StatusCode::OK))
}

/// Get recent alerts
async fn recent_alerts(
    query: HashMap<String, String>,
    context: AppContext,
) -> Result<impl Reply, Rejection> {
    let limit = context
        .config
        .recent_limit(query.get("limit").map(String::as_str));

    match context.reader.recent(limit).await {
        Ok(alerts) => Ok(json_reply(
            &json!({
                "success": true,
                "count": alerts.len(),
                "alerts": alerts,
            }),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("Error fetching recent alerts: {}", e);
            Ok(json_reply(
                &json!({ "error": e.to_string() }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

/// Handle API errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Endpoint not found";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed";
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large";
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        code = StatusCode::LENGTH_REQUIRED;
        message = "Content-Length header is required";
    } else {
        error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error";
    }

    Ok(json_reply(
        &json!({
            "error": message,
            "code": code.as_u16()
        }),
        code,
    ))
}
