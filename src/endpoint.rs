/// HTTP endpoint for triggering updates and reading stored observations
///
/// Endpoints:
/// - POST /api/update        - Start a background update (202, or 409 if one is running)
/// - GET  /api/update_status - Current update status
/// - GET  /api/data          - Observations, optional `station` and `parameter` filters
/// - GET  /api/recent        - Last 7 days for the configured parameters
/// - GET  /api/summary       - Row count and date span
/// - GET  /health            - Service health check
///
/// Requests are answered on a small thread pool so that status polls and
/// reads never wait on one another.

use crate::lifecycle::{TriggerOutcome, UpdateController};
use crate::model::TIMESTAMP_FORMAT;
use crate::store::ObservationStore;
use chrono::{Duration, Utc};
use log::{error, info};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use threadpool::ThreadPool;
use tiny_http::Method;

/// Length of the window served by `/api/recent`.
pub const RECENT_WINDOW_DAYS: i64 = 7;

const AVAILABLE_ENDPOINTS: [&str; 6] = [
    "POST /api/update",
    "GET /api/update_status",
    "GET /api/data?station=&parameter=",
    "GET /api/recent",
    "GET /api/summary",
    "GET /health",
];

/// Everything a request handler needs.
pub struct EndpointContext {
    pub store: Arc<dyn ObservationStore>,
    pub controller: Arc<UpdateController>,
    /// Parameter codes shown by `/api/recent`.
    pub recent_parameters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Splits a request URL into its path and decoded query parameters.
pub fn parse_query(url: &str) -> (&str, HashMap<String, String>) {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect();

    (path, params)
}

/// Non-empty query value, if present.
fn filter_value<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Computes the status code and JSON body for a request.
pub fn route(ctx: &EndpointContext, method: &Method, url: &str) -> (u16, Value) {
    let (path, params) = parse_query(url);

    match (method, path) {
        (Method::Post, "/api/update") => handle_update(ctx),
        (Method::Get, "/api/update_status") => (200, json!(ctx.controller.status().report())),
        (Method::Get, "/api/data") => handle_data(
            ctx,
            filter_value(&params, "station"),
            filter_value(&params, "parameter"),
        ),
        (Method::Get, "/api/recent") => handle_recent(ctx),
        (Method::Get, "/api/summary") => handle_summary(ctx),
        (Method::Get, "/health") => handle_health(),
        (_, "/api/update" | "/api/update_status" | "/api/data" | "/api/recent" | "/api/summary" | "/health") => (
            405,
            json!({ "error": "Method not allowed", "path": path }),
        ),
        _ => (
            404,
            json!({
                "error": "Not found",
                "available_endpoints": AVAILABLE_ENDPOINTS,
            }),
        ),
    }
}

fn store_error(e: impl std::fmt::Display) -> (u16, Value) {
    error!("Store query failed: {}", e);
    (500, json!({ "error": format!("Store query failed: {}", e) }))
}

/// Handle POST /api/update
fn handle_update(ctx: &EndpointContext) -> (u16, Value) {
    match ctx.controller.trigger() {
        TriggerOutcome::Accepted => (
            202,
            json!({ "status": "updating", "message": "Update started." }),
        ),
        TriggerOutcome::AlreadyUpdating => (
            409,
            json!({ "status": "updating", "message": "Update already in progress." }),
        ),
        TriggerOutcome::WorkerUnavailable => (503, json!(ctx.controller.status().report())),
    }
}

/// Handle GET /api/data
fn handle_data(ctx: &EndpointContext, station: Option<&str>, parameter: Option<&str>) -> (u16, Value) {
    match ctx.store.query(station, parameter) {
        Ok(rows) => (200, json!(rows)),
        Err(e) => store_error(e),
    }
}

/// Handle GET /api/recent
fn handle_recent(ctx: &EndpointContext) -> (u16, Value) {
    let since = (Utc::now() - Duration::days(RECENT_WINDOW_DAYS))
        .format(TIMESTAMP_FORMAT)
        .to_string();

    match ctx.store.range_query(&since, &ctx.recent_parameters) {
        Ok(rows) => (200, json!({ "since": since, "observations": rows })),
        Err(e) => store_error(e),
    }
}

/// Handle GET /api/summary
fn handle_summary(ctx: &EndpointContext) -> (u16, Value) {
    match ctx.store.summary() {
        Ok(summary) => (200, json!(summary)),
        Err(e) => store_error(e),
    }
}

/// Handle GET /health
fn handle_health() -> (u16, Value) {
    (
        200,
        json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| "{}".to_string());

    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Start HTTP endpoint server on the specified port. Blocks for the life
/// of the server.
pub fn start_endpoint_server(port: u16, workers: usize, ctx: EndpointContext) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    info!("HTTP endpoint listening on http://0.0.0.0:{}", port);

    let ctx = Arc::new(ctx);
    let pool = ThreadPool::with_name("http-worker".to_string(), workers.max(1));

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.execute(move || {
            let (status, body) = route(&ctx, request.method(), request.url());
            if let Err(e) = request.respond(create_response(status, &body)) {
                error!("Failed to send response: {}", e);
            }
        });
    }

    pool.join();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
