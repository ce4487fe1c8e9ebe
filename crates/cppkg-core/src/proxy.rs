//! Local stand-in for the remote package registry.
//!
//! For the one synthesized package the proxy answers the recipe-revision
//! routes itself; every other request is forwarded to the real registry and
//! the answer relayed unchanged, so the build tool resolves unrelated
//! dependencies exactly as before.
//!
//! ```text
//! GET /v2/conans/<name>/<version>/_/_/latest
//! GET /v2/conans/<name>/<version>/_/_/revisions/<rev>/files
//! GET /v2/conans/<name>/<version>/_/_/revisions/<rev>/files/<file>
//! *   anything else -> upstream
//! ```
//!
//! Forwarded exchanges are appended to the traffic log as they stream
//! through: the request head and body, the response head, then each body
//! chunk tagged with the exchange number.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Body;
use axum::extract::{Path as UrlPath, Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::InstallError;
use crate::export::{REVISION_FILES, SynthesizedManifest};

/// Traffic log written next to the build.
pub const PROXY_LOG: &str = "proxy.log";

const LATEST_CACHE_CONTROL: &str = "public,max-age=300";
const FILE_CACHE_CONTROL: &str = "public,max-age=3600";

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_relayed(name: &HeaderName) -> bool {
    !HOP_BY_HOP.contains(&name.as_str())
        && *name != header::HOST
        && *name != header::CONTENT_LENGTH
}

/// The package whose registry routes are answered locally.
#[derive(Debug, Clone)]
pub struct EmulatedPackage {
    /// Reference name.
    pub name: String,
    /// Synthesized version.
    pub version: String,
    /// Revision payload.
    pub manifest: SynthesizedManifest,
}

impl EmulatedPackage {
    fn base_path(&self) -> String {
        format!("/v2/conans/{}/{}/_/_", self.name, self.version)
    }
}

struct ProxyState {
    emulated: Option<EmulatedPackage>,
    upstream: String,
    client: reqwest::Client,
    log: Option<Mutex<tokio::fs::File>>,
    exchanges: AtomicU64,
}

impl ProxyState {
    fn new(
        emulated: Option<EmulatedPackage>,
        upstream: &str,
        client: reqwest::Client,
        log: Option<tokio::fs::File>,
    ) -> Self {
        Self {
            emulated,
            upstream: upstream.trim_end_matches('/').to_string(),
            client,
            log: log.map(Mutex::new),
            exchanges: AtomicU64::new(0),
        }
    }

    fn emulated(&self) -> Option<&EmulatedPackage> {
        self.emulated.as_ref()
    }

    fn next_exchange(&self) -> u64 {
        self.exchanges.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn record(&self, entry: &[u8]) {
        let Some(log) = &self.log else {
            return;
        };
        let mut file = log.lock().await;
        let written = async {
            file.write_all(entry).await?;
            file.flush().await
        };
        if let Err(e) = written.await {
            warn!("failed to write proxy log: {e}");
        }
    }
}

/// Log entry for a message head: the first line, the headers, a blank line.
fn head_entry(first_line: &str, headers: &HeaderMap) -> Vec<u8> {
    let mut entry = Vec::with_capacity(first_line.len() + 64 * headers.len() + 2);
    entry.extend_from_slice(first_line.as_bytes());
    entry.push(b'\n');
    for (name, value) in headers {
        entry.extend_from_slice(name.as_str().as_bytes());
        entry.extend_from_slice(b": ");
        entry.extend_from_slice(value.as_bytes());
        entry.push(b'\n');
    }
    entry.push(b'\n');
    entry
}

/// Log entry for one body chunk of exchange `id`.
fn chunk_entry(id: u64, chunk: &[u8]) -> Vec<u8> {
    let marker = format!("--- #{id} {} bytes\n", chunk.len());
    let mut entry = Vec::with_capacity(marker.len() + chunk.len() + 1);
    entry.extend_from_slice(marker.as_bytes());
    entry.extend_from_slice(chunk);
    entry.push(b'\n');
    entry
}

fn router(state: Arc<ProxyState>) -> Router {
    let mut app = Router::new();
    if let Some(pkg) = state.emulated() {
        let base = pkg.base_path();
        let files = format!("{base}/revisions/{}/files", pkg.manifest.revision());
        app = app
            .route(&format!("{base}/latest"), get(latest).fallback(forward))
            .route(&files, get(file_list).fallback(forward))
            .route(
                &format!("{files}/:file"),
                get(revision_file).fallback(forward),
            );
    }
    app.fallback(forward).with_state(state)
}

async fn latest(State(state): State<Arc<ProxyState>>) -> Response {
    let Some(pkg) = state.emulated() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body = json!({
        "revision": pkg.manifest.revision().as_str(),
        "time": pkg.manifest.time_rfc3339(),
    });
    debug!(package = %pkg.name, version = %pkg.version, "served latest revision");
    (
        [(header::CACHE_CONTROL, LATEST_CACHE_CONTROL)],
        axum::Json(body),
    )
        .into_response()
}

async fn file_list(State(state): State<Arc<ProxyState>>) -> Response {
    if state.emulated().is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let files: serde_json::Map<String, serde_json::Value> = REVISION_FILES
        .iter()
        .map(|f| ((*f).to_string(), json!({})))
        .collect();
    axum::Json(json!({ "files": files })).into_response()
}

async fn revision_file(
    State(state): State<Arc<ProxyState>>,
    UrlPath(file): UrlPath<String>,
) -> Response {
    let Some(served) = state.emulated().and_then(|pkg| pkg.manifest.file(&file)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    debug!(%file, "served revision file");
    (
        [
            (header::CONTENT_TYPE, served.content_type.to_string()),
            (header::CACHE_CONTROL, FILE_CACHE_CONTROL.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        served.body,
    )
        .into_response()
}

async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map_or("/", axum::http::uri::PathAndQuery::as_str);
    let url = format!("{}{path}", state.upstream);
    let id = state.next_exchange();

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let request_line = format!(">>> #{id} {} {url}", parts.method);
    let mut request_entry = head_entry(&request_line, &parts.headers);
    if !body.is_empty() {
        request_entry.extend_from_slice(&body);
        request_entry.push(b'\n');
    }
    state.record(&request_entry).await;

    let mut upstream = state.client.request(parts.method.clone(), &url);
    for (name, value) in &parts.headers {
        if is_relayed(name) {
            upstream = upstream.header(name, value);
        }
    }

    let response = match upstream.body(body).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(%url, "upstream request failed: {e}");
            state
                .record(format!("!!! #{id} upstream request failed: {e}\n\n").as_bytes())
                .await;
            return (StatusCode::BAD_GATEWAY, format!("upstream request failed: {e}"))
                .into_response();
        }
    };

    let status = response.status();
    let headers = relayed_headers(response.headers());
    state
        .record(&head_entry(&format!("<<< #{id} {status}"), response.headers()))
        .await;

    let tee = Arc::clone(&state);
    let stream = response.bytes_stream().then(move |chunk| {
        let state = Arc::clone(&tee);
        async move {
            if state.log.is_some() {
                let entry = match &chunk {
                    Ok(bytes) => chunk_entry(id, bytes),
                    Err(e) => format!("!!! #{id} body failed: {e}\n").into_bytes(),
                };
                state.record(&entry).await;
            }
            chunk
        }
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn relayed_headers(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_relayed(name) {
            relayed.append(name.clone(), value.clone());
        }
    }
    relayed
}

/// A running proxy bound to a loopback port.
#[derive(Debug)]
pub struct RegistryProxy {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RegistryProxy {
    /// Start serving on `127.0.0.1:0`.
    ///
    /// Requests outside the emulated routes go to `upstream`. When `log_path`
    /// is set, every forwarded exchange is appended to it.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Proxy`] if the listener, the log file or the
    /// HTTP client cannot be set up.
    pub async fn start(
        emulated: Option<EmulatedPackage>,
        upstream: &str,
        log_path: Option<&Path>,
    ) -> Result<Self, InstallError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| InstallError::Proxy(format!("failed to build HTTP client: {e}")))?;

        let log = match log_path {
            Some(path) => Some(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| {
                        InstallError::Proxy(format!("cannot open {}: {e}", path.display()))
                    })?,
            ),
            None => None,
        };

        let state = Arc::new(ProxyState::new(emulated, upstream, client, log));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| InstallError::Proxy(format!("failed to bind: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| InstallError::Proxy(e.to_string()))?;

        let (tx, rx) = oneshot::channel::<()>();
        let app = router(state);
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                warn!("registry proxy stopped: {e}");
            }
        });

        debug!(%addr, upstream, "registry proxy listening");
        Ok(Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:40123`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RegistryProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
