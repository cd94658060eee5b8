//! Outbound transport policy
//!
//! Every request leaving the process, whether issued by the test runner or
//! forwarded by the gateway, passes through [`TransportPolicy::prepare`]
//! before dispatch and [`TransportPolicy::inspect`] after the response is
//! read back.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use super::client::HttpResponse;

/// Headers added by intermediate proxies that would reveal a proxied call
pub const FORWARDING_HEADERS: &[&str] = &["x-forwarded-for", "forwarded", "x-real-ip"];

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 \
    (KHTML, like Gecko) twitch-desktop-electron-platform/1.0.0 Chrome/78.0.3904.130 \
    Electron/7.3.3 Safari/537.36 desklight/8.57.0";

/// Transport policy errors
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Failed to write diagnostic dump: {0}")]
    Dump(#[from] io::Error),
}

/// Fixed set of headers carried by every outbound request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: HeaderMap,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers of the desktop client whose traffic is being reproduced
    pub fn desktop_client() -> Self {
        let pairs = [
            ("accept-language", "en-US"),
            ("connection", "keep-alive"),
            ("origin", "https://www.twitch.tv"),
            ("referer", "https://www.twitch.tv"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "cross-site"),
            ("user-agent", DESKTOP_USER_AGENT),
        ];

        let mut set = Self::new();
        for (name, value) in pairs {
            set.headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        set
    }

    /// Build from name/value pairs, validating each entry
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.insert(name, value)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<(), PolicyError> {
        let name = name.as_ref();
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| PolicyError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value.as_ref()).map_err(|e| PolicyError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Overlay the set onto `headers`, replacing any value of the same name
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    /// Plain string pairs, sorted by name
    pub fn to_pairs(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

/// Remove headers injected by a previous proxy hop
pub fn strip_forwarding_headers(headers: &mut HeaderMap) {
    for name in FORWARDING_HEADERS {
        headers.remove(*name);
    }
}

/// Destination for wire-level request/response dumps
#[derive(Clone)]
pub struct DumpSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DumpSink {
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    fn write(&self, dump: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "dump sink lock poisoned"))?;
        writer.write_all(dump.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl Default for DumpSink {
    fn default() -> Self {
        Self::stderr()
    }
}

/// Header overlay plus optional wire capture, applied around each dispatch
#[derive(Clone)]
pub struct TransportPolicy {
    headers: Arc<HeaderSet>,
    debug: bool,
    dump_bodies: bool,
    sink: DumpSink,
}

impl TransportPolicy {
    pub fn new(headers: HeaderSet) -> Self {
        Self {
            headers: Arc::new(headers),
            debug: false,
            dump_bodies: false,
            sink: DumpSink::default(),
        }
    }

    /// Dump requests (headers only) and responses (with body) to the sink
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Include request bodies in request dumps
    pub fn with_dump_bodies(mut self, dump_bodies: bool) -> Self {
        self.dump_bodies = dump_bodies;
        self
    }

    pub fn with_sink(mut self, sink: DumpSink) -> Self {
        self.sink = sink;
        self
    }

    /// Enforce the header discipline on an outbound request
    pub fn prepare(&self, request: &mut reqwest::Request) -> Result<(), PolicyError> {
        info!("Requesting: {}", request.url());

        self.headers.apply(request.headers_mut());
        strip_forwarding_headers(request.headers_mut());

        if self.debug {
            self.sink.write(&dump_request(request, self.dump_bodies))?;
        }
        Ok(())
    }

    /// Capture the response once it has been fully read
    pub fn inspect(&self, response: &HttpResponse) -> Result<(), PolicyError> {
        if self.debug {
            self.sink.write(&dump_response(response))?;
        }
        Ok(())
    }
}

/// Render a request the way it goes out on the wire
pub fn dump_request(request: &reqwest::Request, include_body: bool) -> String {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut out = String::new();
    let _ = write!(out, "{} {} HTTP/1.1\r\n", request.method(), target);
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => {
                let _ = write!(out, "Host: {host}:{port}\r\n");
            }
            None => {
                let _ = write!(out, "Host: {host}\r\n");
            }
        }
    }
    write_headers(&mut out, request.headers());
    out.push_str("\r\n");

    if include_body {
        if let Some(bytes) = request.body().and_then(|b| b.as_bytes()) {
            out.push_str(&String::from_utf8_lossy(bytes));
        }
    }
    out
}

/// Render a response with status line, headers and body
pub fn dump_response(response: &HttpResponse) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "HTTP/1.1 {} {}\r\n",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, &response.headers);
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(&response.body));
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = write!(
            out,
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        );
    }
}
