//! HTTP server and request dispatcher

use crate::AppState;
use anyhow::Result;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::header;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};
use turnstile_common::Outcome;

/// Header carrying the caller's identity on the write path
const CLIENT_ID_HEADER: &str = "Client-ID";

/// Fixed body sent with every admission rejection
const REJECTION_BODY: &str = "Rate limit exceeded";

/// Run the HTTP server.
///
/// Reports the bound address on `ready` once the listener is up, then serves
/// until `shutdown` flips. In-flight connections finish on their own tasks.
pub async fn run_server(
    state: Arc<AppState>,
    ready: oneshot::Sender<SocketAddr>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.bind_address, state.config.server.port
    )
    .parse()?;

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("HTTP server listening on http://{}", local_addr);
    let _ = ready.send(local_addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = accepted?;
                let io = TokioIo::new(stream);
                let state = state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { handle_request(state, req, remote_addr).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Connection error: {:?}", err);
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("Accept loop stopping");
                return Ok(());
            }
        }
    }
}

/// Handle incoming HTTP request
async fn handle_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    if state.config.server.access_log {
        info!(
            "{} {} {} - {}",
            remote_addr.ip(),
            method,
            uri.path(),
            uri.query().unwrap_or("")
        );
    }

    let response = match method {
        Method::POST => handle_write(&state, &req).await,
        Method::GET => handle_read(&state, uri.query()).await,
        _ => text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    };

    Ok(response)
}

/// Write path: admission gate, then resolve-record-release-respond.
///
/// A rejected request touches no state and gets the fixed 429 body.
async fn handle_write(
    state: &AppState,
    req: &Request<Incoming>,
) -> Response<BoxBody<Bytes, Infallible>> {
    let client_id = req
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let Some(permit) = state.gate.try_admit() else {
        debug!("Admission rejected for client '{}'", client_id);
        return text_response(StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY);
    };

    let outcome = state.resolver.resolve();
    state.stats.record(client_id, outcome).await;
    drop(permit);

    text_response(status_for(outcome), outcome.reason())
}

/// Read path: bypasses the gate and resolver, serves snapshots.
///
/// An absent or empty `client_id` parameter means the all-clients view; an
/// unknown identity is 404 with no body.
async fn handle_read(state: &AppState, query: Option<&str>) -> Response<BoxBody<Bytes, Infallible>> {
    let client_id = query
        .and_then(|q| query_param(q, "client_id"))
        .unwrap_or("");

    if client_id.is_empty() {
        let snapshot = state.stats.snapshot_all().await;
        return json_response(&snapshot);
    }

    match state.stats.snapshot_one(client_id).await {
        Ok(counters) => json_response(&counters),
        Err(_) => {
            debug!("Read for unknown client '{}'", client_id);
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(full_body(Vec::new()))
                .unwrap()
        }
    }
}

/// Wire status for an outcome
fn status_for(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Ok => StatusCode::OK,
        Outcome::Accepted => StatusCode::ACCEPTED,
        Outcome::BadRequest => StatusCode::BAD_REQUEST,
        Outcome::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Extract a raw query parameter value
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let mut kv = pair.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some(k), Some(v)) if k == key => Some(v),
            _ => None,
        }
    })
}

/// Create a full body response
fn full_body(data: Vec<u8>) -> BoxBody<Bytes, Infallible> {
    Full::new(Bytes::from(data))
        .map_err(|_| unreachable!())
        .boxed()
}

/// Create a plain text response
fn text_response(status: StatusCode, message: &str) -> Response<BoxBody<Bytes, Infallible>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full_body(message.as_bytes().to_vec()))
        .unwrap()
}

/// Create a JSON response
fn json_response<T: serde::Serialize>(value: &T) -> Response<BoxBody<Bytes, Infallible>> {
    match serde_json::to_string(value) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(full_body(body.into_bytes()))
            .unwrap(),
        Err(e) => {
            error!("Failed to encode statistics: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
