//! HTTP surface: the JSON action API, the OAuth redirect target and the
//! bundled UI page.
//!
//! Each connection is served on its own local task, without keep-alive, so
//! an idle socket cannot hold up other clients. Actions that write state run
//! one at a time behind [`WriteGate`].

pub mod api;
pub mod oauth_callback;
pub mod ui;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, header};
use hyper_util::rt::{TokioIo, TokioTimer};
use reqwest::Client;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::LocalSet;

use crate::core::archiver::Archiver;
use crate::core::backup::BackupOptions;
use crate::core::scheduler::{BackupJob, Scheduler};
use crate::error::Result;
use crate::storage::{ResolvedConfig, StoreHandle};

/// Request bodies larger than this are rejected.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Connections that send no complete request head within this are closed.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Serializes requests that mutate the store or the crontab.
pub type WriteGate = Mutex<()>;

/// Everything a request handler needs.
pub struct App<S, A> {
    pub store: StoreHandle,
    pub http: Client,
    pub options: BackupOptions,
    /// Base URL the browser reaches us on, without trailing slash.
    pub public_url: String,
    pub job: BackupJob,
    pub scheduler: S,
    pub archiver: A,
}

impl<S: Scheduler, A: Archiver> App<S, A> {
    #[must_use]
    pub fn from_config(
        store: StoreHandle,
        http: Client,
        config: &ResolvedConfig,
        scheduler: S,
        archiver: A,
    ) -> Self {
        Self {
            store,
            http,
            options: BackupOptions::from_config(config),
            public_url: config.public_url.clone(),
            job: BackupJob::from_config(config),
            scheduler,
            archiver,
        }
    }

    /// Route one request. Everything except the page and read-only actions
    /// waits for `gate`.
    pub async fn handle(&self, req: Request<Incoming>, gate: &WriteGate) -> Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();
        tracing::debug!(%method, %path, "Request");

        match path.as_str() {
            "/" | "/index.html" => ui::page(),
            "/oauth2callback" => {
                let _writer = gate.lock().await;
                let location = oauth_callback::handle(self, &query).await;
                redirect(&location)
            }
            "/api" => {
                let body = match read_body(req).await {
                    Ok(body) => body,
                    Err(status) => {
                        return json_response(
                            status,
                            &serde_json::json!({"error": "Request body too large"}),
                        );
                    }
                };
                let action = query_param(&query, "action");
                let read_only = action
                    .as_deref()
                    .is_some_and(|a| api::READ_ONLY_ACTIONS.contains(&a));
                let _writer = if read_only { None } else { Some(gate.lock().await) };
                let (status, value) = api::dispatch(self, &method, action.as_deref(), &body).await;
                json_response(status, &value)
            }
            _ => json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "Not found"})),
        }
    }
}

/// Accept connections on `addr` until the process is stopped.
///
/// # Errors
///
/// Returns error if the address cannot be bound.
pub async fn serve<S, A>(app: App<S, A>, addr: SocketAddr) -> Result<()>
where
    S: Scheduler + 'static,
    A: Archiver + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, public_url = %app.public_url, "Listening");
    serve_listener(Arc::new(app), listener).await
}

/// Serve on an already-bound listener.
///
/// Connection tasks are local to this future, so it must be awaited rather
/// than spawned onto another worker.
pub async fn serve_listener<S, A>(app: Arc<App<S, A>>, listener: TcpListener) -> Result<()>
where
    S: Scheduler + 'static,
    A: Archiver + 'static,
{
    LocalSet::new().run_until(accept_loop(app, listener)).await
}

async fn accept_loop<S, A>(app: Arc<App<S, A>>, listener: TcpListener) -> Result<()>
where
    S: Scheduler + 'static,
    A: Archiver + 'static,
{
    let gate = Arc::new(WriteGate::new(()));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                continue;
            }
        };
        tracing::trace!(%peer, "Connection accepted");

        let app = Arc::clone(&app);
        let gate = Arc::clone(&gate);
        tokio::task::spawn_local(async move {
            let service = service_fn(move |req| {
                let app = Arc::clone(&app);
                let gate = Arc::clone(&gate);
                async move { Ok::<_, Infallible>(app.handle(req, &gate).await) }
            });
            let result = http1::Builder::new()
                .timer(TokioTimer::new())
                .header_read_timeout(HEADER_READ_TIMEOUT)
                .keep_alive(false)
                .serve_connection(TokioIo::new(stream), service)
                .await;

            if let Err(e) = result {
                tracing::debug!(error = %e, %peer, "Error serving connection");
            }
        });
    }
}

async fn read_body(req: Request<Incoming>) -> std::result::Result<Bytes, StatusCode> {
    let too_large = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > MAX_BODY_BYTES);
    if too_large {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    match req.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.len() > MAX_BODY_BYTES {
                Err(StatusCode::PAYLOAD_TOO_LARGE)
            } else {
                Ok(bytes)
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read request body");
            Ok(Bytes::new())
        }
    }
}

/// First value of `name` in a raw query string, percent-decoded.
#[must_use]
pub fn query_param(query: &str, name: &str) -> Option<String> {
    reqwest::Url::parse(&format!("http://localhost/?{query}"))
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub(crate) fn json_response<T: serde::Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

fn redirect(location: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::FOUND;
    match header::HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Redirect target is not a valid header value");
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}
