//! Dashboard HTTP Server
//!
//! Routing is a pure function of the loaded state and the request line;
//! the accept loop only adapts hyper requests to it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::grouping::GroupedView;
use super::html;
use super::state::DashboardState;
use crate::error::{Error, Result};

type Body = Full<Bytes>;

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, JSON, body),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR, TEXT, "internal error")
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    json(status, &serde_json::json!({ "error": message }))
}

/// Value of `key` in a query string, percent-decoded
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if name != key {
            return None;
        }
        let value = value.replace('+', " ");
        Some(
            urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value),
        )
    })
}

/// Route label used for request metrics
fn route_label(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/osds-by-server" => "/osds-by-server",
        "/api/servers" => "/api/servers",
        "/api/osds-by-server" => "/api/osds-by-server",
        "/healthz" => "/healthz",
        "/metrics" => "/metrics",
        p if p.starts_with("/api/server/") => "/api/server/{name}",
        _ => "other",
    }
}

/// Answer one request from the loaded reports
pub fn route(state: &DashboardState, method: &Method, path: &str, query: Option<&str>) -> Response<Body> {
    state.metrics().record_request(route_label(path));

    if method != Method::GET && method != Method::HEAD {
        return respond(StatusCode::METHOD_NOT_ALLOWED, TEXT, "method not allowed");
    }

    match path {
        "/" => respond(StatusCode::OK, HTML, html::render_overview(&state.reports())),
        "/osds-by-server" => {
            let filter = query_param(query, "filter");
            let view = GroupedView::build(&state.reports(), filter.as_deref());
            respond(StatusCode::OK, HTML, html::render_grouped(&view))
        }
        "/api/servers" => json(StatusCode::OK, state.reports().as_slice()),
        "/api/osds-by-server" => {
            let filter = query_param(query, "filter");
            json(
                StatusCode::OK,
                &GroupedView::build(&state.reports(), filter.as_deref()),
            )
        }
        "/healthz" => respond(StatusCode::OK, TEXT, "ok"),
        "/metrics" => metrics(state),
        p => match p.strip_prefix("/api/server/") {
            Some(raw) => {
                let name = urlencoding::decode(raw)
                    .map(|n| n.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                match state.find(&name) {
                    Some(report) => json(StatusCode::OK, &report),
                    None => json_error(StatusCode::NOT_FOUND, "Server not found"),
                }
            }
            None => respond(StatusCode::NOT_FOUND, TEXT, "not found"),
        },
    }
}

fn metrics(state: &DashboardState) -> Response<Body> {
    match state.metrics().encode() {
        Ok((content_type, buffer)) => {
            let mut response = respond(StatusCode::OK, TEXT, buffer);
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR, TEXT, "metrics unavailable")
        }
    }
}

async fn handle(
    state: Arc<DashboardState>,
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), uri = %req.uri(), "Dashboard request");
    Ok(route(&state, req.method(), req.uri().path(), req.uri().query()))
}

/// Resolve the dashboard bind address
pub async fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Server(format!("Invalid dashboard address {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| Error::Server(format!("No address found for {}", host)))
}

/// Reread the output directory every `every` until aborted
pub fn spawn_reloader(state: Arc<DashboardState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick is immediate and the state is fresh
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.reload().await;
        }
    })
}

/// Serve the dashboard until the listener fails
pub async fn serve(state: Arc<DashboardState>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind dashboard on {}: {}", addr, e)))?;

    info!("Dashboard listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Server(format!("Dashboard accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(state.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Dashboard connection error: {}", e);
            }
        });
    }
}
