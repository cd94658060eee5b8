//! Recording proxy gateway
//!
//! A standalone HTTP listener that forwards every inbound request to the
//! configured upstream. The listener runs as its own task; callers hold a
//! [`GatewayHandle`] to wait for the bind, observe the listener state and
//! shut it down.

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use url::Url;

use super::rewrite::{forwardable_request_headers, forwardable_response_headers, resolve_upstream};
use crate::config::ProxyConfig;
use crate::http::{HttpClient, TransportPolicy};

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to bind gateway listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Gateway listener failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Gateway task ended unexpectedly: {0}")]
    Task(String),
}

/// Listener lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Listening(SocketAddr),
}

struct ProxyState {
    upstream: Url,
    client: HttpClient,
}

/// The recording proxy gateway
pub struct Gateway {
    config: Arc<ProxyConfig>,
    state: Arc<ProxyState>,
}

impl Gateway {
    pub fn new(config: Arc<ProxyConfig>, policy: TransportPolicy) -> Result<Self> {
        let client = HttpClient::for_gateway(policy, config.timeout_secs)?;
        let state = Arc::new(ProxyState {
            upstream: config.upstream.clone(),
            client,
        });
        Ok(Self { config, state })
    }

    /// Every method and path is forwarded
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(forward)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve on a separate task
    pub fn spawn(self) -> GatewayHandle {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (state_tx, state_rx) = watch::channel(ListenerState::Stopped);

        let task = tokio::spawn(async move {
            let addr = self.config.listen_addr;
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(source) => {
                    error!("Failed to bind gateway on {}: {}", addr, source);
                    return Err(GatewayError::Bind { addr, source });
                }
            };
            let local_addr = listener.local_addr().map_err(GatewayError::Serve)?;

            let mode = if self.config.bypass_external_controller {
                "bypass"
            } else {
                "behind external controller"
            };
            info!(
                "Gateway listening on {} ({}), forwarding to {}",
                local_addr, mode, self.config.upstream
            );
            let _ = state_tx.send(ListenerState::Listening(local_addr));
            let _ = ready_tx.send(local_addr);

            let result = axum::serve(listener, self.router())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(GatewayError::Serve);

            let _ = state_tx.send(ListenerState::Stopped);
            match &result {
                Ok(()) => info!("Gateway on {} stopped", local_addr),
                Err(e) => error!("{}", e),
            }
            result
        });

        GatewayHandle {
            ready: Some(ready_rx),
            shutdown: Some(shutdown_tx),
            state: state_rx,
            task: Some(task),
        }
    }
}

/// Control side of a spawned gateway
pub struct GatewayHandle {
    ready: Option<oneshot::Receiver<SocketAddr>>,
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<ListenerState>,
    task: Option<JoinHandle<Result<(), GatewayError>>>,
}

impl GatewayHandle {
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Resolve once the listener is bound; a bind failure surfaces here
    pub async fn wait_ready(&mut self) -> Result<SocketAddr, GatewayError> {
        if let ListenerState::Listening(addr) = self.state() {
            return Ok(addr);
        }
        let ready = match self.ready.take() {
            Some(ready) => ready,
            None => return Err(self.take_task_error().await),
        };
        match ready.await {
            Ok(addr) => Ok(addr),
            Err(_) => Err(self.take_task_error().await),
        }
    }

    /// Resolve when the listener leaves the listening state
    pub async fn stopped(&mut self) {
        let _ = self
            .state
            .wait_for(|state| *state == ListenerState::Stopped)
            .await;
    }

    /// Stop accepting connections and report how the listener ended
    pub async fn shutdown(mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(GatewayError::Task(e.to_string())),
            },
            None => Ok(()),
        }
    }

    async fn take_task_error(&mut self) -> GatewayError {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => GatewayError::Task("listener stopped before binding".to_string()),
                Err(e) => GatewayError::Task(e.to_string()),
            },
            None => GatewayError::Task("listener already stopped".to_string()),
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = resolve_upstream(&state.upstream, path_and_query);

    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read inbound body for {}: {}", target, e);
            return (StatusCode::BAD_REQUEST, format!("failed to read request body: {e}"))
                .into_response();
        }
    };

    let had_length = parts.headers.contains_key(header::CONTENT_LENGTH);
    let carries_body = !matches!(parts.method, Method::GET | Method::HEAD);

    let mut outbound = reqwest::Request::new(parts.method, target.clone());
    *outbound.headers_mut() = forwardable_request_headers(&parts.headers);
    if had_length || carries_body || !body.is_empty() {
        outbound
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        *outbound.body_mut() = Some(reqwest::Body::from(body));
    }

    let response = match state.client.execute(outbound).await {
        Ok(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = forwardable_response_headers(&upstream.headers);
            response
        }
        Err(e) => {
            warn!("Forwarding to {} failed: {}", target, e);
            (StatusCode::BAD_GATEWAY, format!("gateway error: {e}")).into_response()
        }
    };
    info!("Returned: {}", target);
    response
}
