//! Target and header rewriting for forwarded requests

use axum::http::{header, HeaderMap, HeaderName};
use url::Url;

/// Connection-scoped headers never forwarded across a hop
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Join the upstream base with an inbound `path?query`
///
/// The inbound path is appended to the base path and the query is kept
/// verbatim, so `/addon/timestamp` against `https://api.example.com/v2/`
/// becomes `https://api.example.com/v2/addon/timestamp`. Dot segments are
/// dropped from the inbound path so it can never climb out of the base.
pub fn resolve_upstream(base: &Url, path_and_query: &str) -> Url {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let inbound: Vec<&str> = path
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !is_dot_segment(segment))
        .collect();

    let mut target = base.clone();
    target.set_path(&format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        inbound.join("/")
    ));
    target.set_query(query);
    target.set_fragment(None);
    target
}

/// `.` and `..`, including their percent-encoded spellings
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive" || name.as_str() == "proxy-connection"
}

/// Headers listed in `Connection` are connection-scoped too
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Inbound headers to send upstream; the client sets `Host` and length itself
pub fn forwardable_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}

/// Upstream response headers to return to the caller
pub fn forwardable_response_headers(headers: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn base() -> Url {
        Url::parse("https://api.example.com/v2/").unwrap()
    }

    #[test]
    fn test_resolve_appends_to_base_path() {
        assert_eq!(
            resolve_upstream(&base(), "/addon/timestamp").as_str(),
            "https://api.example.com/v2/addon/timestamp"
        );
    }

    #[test]
    fn test_resolve_preserves_query() {
        let target = resolve_upstream(&base(), "/game?supportsAddons");
        assert_eq!(target.path(), "/v2/game");
        assert_eq!(target.query(), Some("supportsAddons"));

        let target = resolve_upstream(&base(), "/minecraft/modloader?version=1.12.2&x=%20y");
        assert_eq!(target.query(), Some("version=1.12.2&x=%20y"));
    }

    #[test]
    fn test_resolve_base_without_trailing_slash() {
        let base = Url::parse("https://api.example.com/v2").unwrap();
        assert_eq!(
            resolve_upstream(&base, "/addon/1").as_str(),
            "https://api.example.com/v2/addon/1"
        );
    }

    #[test]
    fn test_resolve_root_and_bare_host() {
        assert_eq!(
            resolve_upstream(&base(), "/").as_str(),
            "https://api.example.com/v2/"
        );
        let bare = Url::parse("http://127.0.0.1:9000").unwrap();
        assert_eq!(
            resolve_upstream(&bare, "/addon?x=1").as_str(),
            "http://127.0.0.1:9000/addon?x=1"
        );
    }

    #[test]
    fn test_resolve_stays_under_base_path() {
        let base = Url::parse("https://api.example.com/api/v2/").unwrap();

        let target = resolve_upstream(&base, "/../../secret");
        assert_eq!(target.path(), "/api/v2/secret");

        let target = resolve_upstream(&base, "/addon/./310806/..?x=1");
        assert_eq!(target.path(), "/api/v2/addon/310806");
        assert_eq!(target.query(), Some("x=1"));

        let target = resolve_upstream(&base, "/%2e%2e/%2E./.%2e/secret");
        assert_eq!(target.path(), "/api/v2/secret");
    }

    #[test]
    fn test_resolve_keeps_trailing_slash() {
        assert_eq!(resolve_upstream(&base(), "/addon/").path(), "/v2/addon/");
    }

    #[test]
    fn test_resolve_does_not_mutate_base() {
        let base = base();
        let _ = resolve_upstream(&base, "/category");
        assert_eq!(base.as_str(), "https://api.example.com/v2/");
    }

    #[test]
    fn test_request_headers_drop_hop_by_hop_and_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8888"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-trace"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));

        let out = forwardable_request_headers(&headers);

        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get("x-trace").is_none());
        assert!(out.get(header::TRANSFER_ENCODING).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out[header::CONTENT_TYPE], "application/json");
        assert_eq!(out.get_all("x-multi").iter().count(), 2);
    }

    #[test]
    fn test_response_headers_keep_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("13"));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));

        let out = forwardable_response_headers(&headers);
        assert_eq!(out[header::CONTENT_LENGTH], "13");
        assert_eq!(out[header::CONTENT_ENCODING], "gzip");
        assert!(out.get("keep-alive").is_none());
    }
}
