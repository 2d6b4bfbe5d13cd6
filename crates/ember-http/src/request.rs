//! Request-line grammar: `method SP uri [ "?" query ] [ "#" fragment ] SP
//! version CRLF`, per construct's `parser::request_line` (`method`,
//! `path`, `query`, `fragment`, `version` fused into `line::request`).

use crate::error::{bad_request, HttpResult};
use crate::headers::{find_crlf, parse_headers, HeaderMap};
use crate::version::Version;

#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
    pub version: Version,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub line: RequestLine,
    pub headers: HeaderMap,
    /// Byte offset into the input where the body begins.
    pub body_offset: usize,
}

/// Parse a request line plus header block. The body itself is left for the
/// caller to read according to `headers::determine_framing`.
pub fn parse_request(input: &[u8]) -> HttpResult<Request> {
    let line_end = find_crlf(input).ok_or_else(|| bad_request("request line", input))?;
    let line = parse_request_line(&input[..line_end])?;

    let after_line = line_end + 2;
    let (headers, header_bytes) = parse_headers(&input[after_line..])?;

    Ok(Request { line, headers, body_offset: after_line + header_bytes })
}

fn parse_request_line(line: &[u8]) -> HttpResult<RequestLine> {
    let text = std::str::from_utf8(line).map_err(|_| bad_request("request line", line))?;
    let mut parts = text.splitn(3, ' ');
    let method = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| bad_request("method", line))?;
    let uri = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| bad_request("uri", line))?;
    let version_token = parts.next().ok_or_else(|| bad_request("version", line))?;

    let (path_and_query, fragment) = match uri.split_once('#') {
        Some((pq, frag)) => (pq, Some(frag.to_string())),
        None => (uri, None),
    };
    let (target, query) = match path_and_query.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (path_and_query.to_string(), None),
    };

    let version = Version::parse(version_token)?;

    Ok(RequestLine { method: method.to_string(), target, query, fragment, version })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_federation_transaction_request() {
        let raw = b"PUT /_matrix/federation/v1/send/123?foo=bar HTTP/1.1\r\nHost: example.org\r\nContent-Length: 2\r\n\r\n{}";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.line.method, "PUT");
        assert_eq!(req.line.target, "/_matrix/federation/v1/send/123");
        assert_eq!(req.line.query.as_deref(), Some("foo=bar"));
        assert_eq!(req.line.version, Version::Http11);
        assert_eq!(req.headers.get("host"), Some("example.org"));
        assert_eq!(&raw[req.body_offset..], b"{}");
    }

    #[test]
    fn rejects_unsupported_version() {
        let raw = b"GET / HTTP/2\r\n\r\n";
        assert!(parse_request(raw).is_err());
    }

    #[test]
    fn missing_version_token_is_bad_request() {
        let raw = b"GET /\r\n\r\n";
        assert!(parse_request(raw).is_err());
    }
}
