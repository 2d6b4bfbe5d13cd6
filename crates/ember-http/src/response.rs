//! Status-line grammar: `version SP status SP reason CRLF`, per
//! construct's `parser::response_line` (`version`, `status`, `reason`
//! fused into `line::response`). Used on the client side parsing a peer's
//! federation response, and when re-framing our own responses through the
//! grammar (the "outbound response parse" path spec.md §4.7 names).

use crate::error::{bad_request, internal, HttpResult};
use crate::headers::{find_crlf, parse_headers, HeaderMap};
use crate::version::Version;

#[derive(Debug, Clone)]
pub struct StatusLine {
    pub version: Version,
    pub status: u16,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub line: StatusLine,
    pub headers: HeaderMap,
    pub body_offset: usize,
}

/// Parse a peer's response, treating grammar failures as
/// `INTERNAL_SERVER_ERROR` (spec.md §4.7: "outbound response parse"
/// failures are our own fault for trusting a malformed peer, not the
/// caller's).
pub fn parse_response(input: &[u8]) -> HttpResult<Response> {
    let line_end = find_crlf(input).ok_or_else(|| internal("status line", input))?;
    let line = parse_status_line(&input[..line_end])?;

    let after_line = line_end + 2;
    let (headers, header_bytes) =
        parse_headers(&input[after_line..]).map_err(|_| internal("headers", &input[after_line..]))?;

    Ok(Response { line, headers, body_offset: after_line + header_bytes })
}

fn parse_status_line(line: &[u8]) -> HttpResult<StatusLine> {
    let text = std::str::from_utf8(line).map_err(|_| internal("status line", line))?;
    let mut parts = text.splitn(3, ' ');
    let version_token = parts.next().ok_or_else(|| internal("version", line))?;
    let status_token = parts.next().ok_or_else(|| internal("status", line))?;
    let reason = parts.next().unwrap_or("").to_string();

    let version = Version::parse(version_token).map_err(|_| internal("version", line))?;
    if status_token.len() != 3 || !status_token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad_request("status", line));
    }
    let status: u16 = status_token.parse().map_err(|_| internal("status", line))?;

    Ok(StatusLine { version, status, reason })
}

/// Serialize a status line + headers, ready for the caller to append the
/// framed body.
pub fn write_response_head(status: u16, reason: &str, headers: &HeaderMap) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("HTTP/1.1 {status} {reason}\r\n").as_bytes());
    headers.write_to(&mut out);
    out.extend_from_slice(b"\r\n");
    out
}
