//! Header parsing and the case-insensitive header map.
//!
//! Grammar (construct's `ircd/http.cc` `parser::header`/`parser::headers`):
//! `header = head_key *ws ":" *ws head_val`, `headers = header % (*ws CRLF)`,
//! the whole block terminated by a bare CRLF. `head_key` excludes
//! whitespace and `:`; `head_val` is any non-control-character run, with
//! inbound parsing also tolerating a trailing CRLF attached to the line it
//! was split from.

use crate::error::{bad_request, HttpError, HttpResult};

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    /// Preserves insertion order and duplicate header lines (a request may
    /// legally repeat a header name); lookups normalise case.
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as CRLF-terminated `key: value` lines, no trailing blank
    /// line (the caller appends the header-block terminator itself).
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (k, v) in &self.entries {
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(CRLF);
        }
    }
}

/// Parse the full header block starting at `input`, stopping at the blank
/// line that terminates it. Returns the map and the number of bytes
/// consumed, including the terminating CRLF CRLF.
pub fn parse_headers(input: &[u8]) -> HttpResult<(HeaderMap, usize)> {
    let mut map = HeaderMap::new();
    let mut offset = 0usize;

    loop {
        let rest = &input[offset..];
        if rest.starts_with(CRLF) {
            offset += CRLF.len();
            return Ok((map, offset));
        }

        let line_end = find_crlf(rest).ok_or_else(|| bad_request("header", rest))?;
        let line = &rest[..line_end];
        let (name, value) = parse_header_line(line)?;
        map.insert(name, value);
        offset += line_end + CRLF.len();
    }
}

fn parse_header_line(line: &[u8]) -> HttpResult<(String, String)> {
    let colon = line.iter().position(|&b| b == b':').ok_or_else(|| bad_request("header", line))?;
    let key = &line[..colon];
    if key.is_empty() || key.iter().any(|&b| b.is_ascii_whitespace()) {
        return Err(bad_request("head key", line));
    }
    let value = trim_ws(&line[colon + 1..]);
    let key = std::str::from_utf8(key).map_err(|_| bad_request("head key", line))?;
    let value = std::str::from_utf8(value).map_err(|_| bad_request("head value", line))?;
    Ok((key.to_string(), value.to_string()))
}

fn trim_ws(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ' && b != b'\t').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ' && b != b'\t').map(|i| i + 1).unwrap_or(start);
    &bytes[start..end]
}

pub(crate) fn find_crlf(input: &[u8]) -> Option<usize> {
    input.windows(2).position(|w| w == CRLF)
}

/// How the body of this message is framed, per the `Content-Length` /
/// `Transfer-Encoding: chunked` mutual-exclusion invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    ContentLength(usize),
    Chunked,
    /// No `Content-Length` and no chunked encoding: the body runs to
    /// connection close. Only legal on a response (construct's
    /// `write_transfer_encoding_chunked` check implies the same rule);
    /// `determine_framing` is the sole place that distinguishes request
    /// vs response callers.
    CloseDelimited,
}

/// Resolve framing from a parsed header block. `allow_close_delimited`
/// should be `true` only for responses — a request with neither header
/// present is a `BAD_REQUEST` per spec.md §4.7.
pub fn determine_framing(headers: &HeaderMap, allow_close_delimited: bool) -> HttpResult<BodyFraming> {
    let has_length = headers.contains("content-length");
    let is_chunked = headers
        .get("transfer-encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    match (has_length, is_chunked) {
        (true, true) => Err(HttpError::BadRequest {
            rule: "content-length/transfer-encoding",
            context: "Content-Length and Transfer-Encoding: chunked are mutually exclusive".into(),
        }),
        (true, false) => {
            let raw = headers.get("content-length").unwrap();
            let len: usize = raw
                .parse()
                .map_err(|_| bad_request("content length", raw.as_bytes()))?;
            Ok(BodyFraming::ContentLength(len))
        }
        (false, true) => Ok(BodyFraming::Chunked),
        (false, false) if allow_close_delimited => Ok(BodyFraming::CloseDelimited),
        (false, false) => Err(HttpError::BadRequest {
            rule: "content-length/transfer-encoding",
            context: "request has neither Content-Length nor Transfer-Encoding: chunked".into(),
        }),
    }
}
