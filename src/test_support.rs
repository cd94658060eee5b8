//! Local upstream fixtures for exercising the gateway and runner in-process.
//!
//! The fixture shares every request it receives over a channel so assertions
//! stay in the test body rather than on the server task.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use std::io;
use std::net::{SocketAddr, TcpListener as StdListener};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// A request as observed by the upstream fixture
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: Instant,
}

pub struct Upstream {
    pub addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
    task: JoinHandle<()>,
}

impl Upstream {
    /// `http://<addr>/<base_path>`
    pub fn base_url(&self, base_path: &str) -> Url {
        Url::parse(&format!("http://{}/{}", self.addr, base_path)).unwrap()
    }

    pub async fn next_request(&mut self) -> RecordedRequest {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.requests.recv())
            .await
            .expect("upstream saw no request")
            .expect("upstream channel closed")
    }

    pub fn drain(&mut self) -> Vec<RecordedRequest> {
        let mut out = Vec::new();
        while let Ok(req) = self.requests.try_recv() {
            out.push(req);
        }
        out
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a fixture that answers by path suffix:
/// `310806` → 200 `{"id":310806}`, `999999` → 404 `"not found"`,
/// `redirect` → 302, `echo` → 200 with the request body, anything else → 200 `{}`.
pub async fn spawn_upstream() -> Upstream {
    let (tx, requests) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = Router::new().fallback(record).with_state(tx);
    let task = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Upstream {
        addr,
        requests,
        task,
    }
}

async fn record(
    State(tx): State<mpsc::UnboundedSender<RecordedRequest>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap();
    let path = parts.uri.path().to_string();

    let _ = tx.send(RecordedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body: body.clone(),
        received_at: Instant::now(),
    });

    if path.ends_with("310806") {
        json(StatusCode::OK, r#"{"id":310806}"#)
    } else if path.ends_with("999999") {
        json(StatusCode::NOT_FOUND, r#""not found""#)
    } else if path.ends_with("redirect") {
        (
            StatusCode::FOUND,
            [(header::LOCATION, "https://elsewhere.example/")],
        )
            .into_response()
    } else if path.ends_with("echo") {
        (
            StatusCode::OK,
            [("x-upstream", "fixture")],
            Body::from(body),
        )
            .into_response()
    } else {
        json(StatusCode::OK, "{}")
    }
}

fn json(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// An address nothing is listening on
pub fn unused_local_addr() -> SocketAddr {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Send `raw` as-is and return the whole response; the request should ask for `Connection: close`
pub async fn send_raw(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(std::time::Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("gateway did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// A dump destination that always fails
pub struct BrokenWriter;

impl io::Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
