//! Request instrumentation middleware

use std::time::{Duration, Instant};

use axum::{
    body::HttpBody,
    extract::{MatchedPath, Request},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::telemetry::{
    HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION, HTTP_REQUEST_DURATION_HIGHR, HTTP_REQUEST_SIZE,
    HTTP_RESPONSE_SIZE,
};

/// One finished request, as seen by the instrumentation
struct Observation {
    handler: String,
    method: String,
    status: u16,
    elapsed: Duration,
    request_bytes: u64,
    response_bytes: u64,
}

/// Count requests and record latency and sizes per route template
pub async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let handler = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "none".to_owned());
    let request_bytes = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let response = next.run(req).await;

    record(Observation {
        handler,
        method,
        status: response.status().as_u16(),
        elapsed: start.elapsed(),
        request_bytes,
        response_bytes: response.body().size_hint().exact().unwrap_or(0),
    });

    response
}

fn record(obs: Observation) {
    let status = status_group(obs.status);
    let seconds = obs.elapsed.as_secs_f64();

    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "handler" => obs.handler.clone(),
        "method" => obs.method.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION,
        "handler" => obs.handler.clone(),
        "method" => obs.method
    )
    .record(seconds);
    metrics::histogram!(HTTP_REQUEST_DURATION_HIGHR).record(seconds);
    metrics::histogram!(HTTP_REQUEST_SIZE, "handler" => obs.handler.clone())
        .record(obs.request_bytes as f64);
    metrics::histogram!(HTTP_RESPONSE_SIZE, "handler" => obs.handler)
        .record(obs.response_bytes as f64);
}

fn status_group(code: u16) -> String {
    format!("{}xx", code / 100)
}
