//! Scripted HTTP server for exercising retry, backup and fallback paths.
//!
//! A path made only of step words (`/error-error-success`) replays one step
//! per request to that path: `error` answers 500, `success` answers 200
//! `cool`, `timeout` stalls before answering. Once the script runs out the
//! path answers 404. Any other path echoes the request back as JSON, which is
//! what REST-path tests assert against. `/backup` always answers
//! `backup-url-response`, and `/__hits` reports how often each path was hit.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const BACKUP_BODY: &str = "backup-url-response";
pub const SUCCESS_BODY: &str = "cool";
pub const TIMEOUT_BODY: &str = "cool of timeout";

/// How long a `timeout` step stalls before answering.
pub const STALL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Error,
    Success,
    Timeout,
}

impl Step {
    fn parse(word: &str) -> Option<Step> {
        match word {
            "error" => Some(Step::Error),
            "success" => Some(Step::Success),
            "timeout" => Some(Step::Timeout),
            _ => None,
        }
    }
}

/// Parse `/error-error-success` into its steps. `None` for non-script paths.
pub fn parse_script(path: &str) -> Option<Vec<Step>> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('-').map(Step::parse).collect()
}

/// Request as seen by the echo route.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

pub type Hits = Arc<RwLock<HashMap<String, usize>>>;

pub fn app() -> Router {
    let hits: Hits = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/backup", any(backup))
        .route("/__hits", get(list_hits))
        .fallback(scripted)
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn backup() -> &'static str {
    BACKUP_BODY
}

async fn list_hits(State(hits): State<Hits>) -> Json<HashMap<String, usize>> {
    Json(hits.read().await.clone())
}

async fn scripted(State(hits): State<Hits>, method: Method, uri: Uri, body: String) -> Response {
    let path = uri.path().to_string();
    let index = {
        let mut hits = hits.write().await;
        let count = hits.entry(path.clone()).or_insert(0);
        let index = *count;
        *count += 1;
        index
    };
    debug!(%method, %path, index, "scripted request");

    let Some(steps) = parse_script(&path) else {
        let echo = Echo {
            method: method.to_string(),
            path,
            query: uri.query().map(str::to_string),
            body,
        };
        return Json(echo).into_response();
    };

    match steps.get(index) {
        Some(Step::Error) => (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response(),
        Some(Step::Success) => SUCCESS_BODY.into_response(),
        Some(Step::Timeout) => {
            tokio::time::sleep(STALL).await;
            TIMEOUT_BODY.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
