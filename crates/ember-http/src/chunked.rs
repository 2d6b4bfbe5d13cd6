//! Chunked-transfer codec: `chunk = hex-size [";" extensions] CRLF body
//! CRLF`, terminated by a zero-size chunk, per construct's
//! `parser::chunk_size`/`parse_chunk_head` and `writechunk` (which formats
//! the size as `%08x` — this encoder matches that width for wire
//! familiarity, though any hex width decodes fine).

use crate::error::{bad_request, HttpResult};
use crate::headers::find_crlf;

const CRLF: &[u8] = b"\r\n";

/// Encode `body` as a single chunk followed by the terminating zero-size
/// chunk (a minimal encoder — callers needing multiple chunks call this
/// per-chunk and append the terminator once after the last one via
/// [`write_terminator`]).
pub fn write_chunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(CRLF);
    out
}

pub fn write_terminator() -> Vec<u8> {
    b"0\r\n\r\n".to_vec()
}

/// One decoded chunk's size and the number of input bytes its head+body+
/// trailing CRLF consumed.
struct DecodedChunk {
    size: usize,
    consumed: usize,
}

fn decode_one_chunk(input: &[u8]) -> HttpResult<DecodedChunk> {
    let head_end = find_crlf(input).ok_or_else(|| bad_request("chunk size", input))?;
    let head = &input[..head_end];
    // Extensions (`;key=value`) are accepted and ignored, per the grammar.
    let size_token = head.split(|&b| b == b';').next().unwrap_or(head);
    let size_str = std::str::from_utf8(size_token).map_err(|_| bad_request("chunk size", head))?;
    let size = usize::from_str_radix(size_str.trim(), 16).map_err(|_| bad_request("chunk size", head))?;

    let body_start = head_end + CRLF.len();
    if input.len() < body_start + size + CRLF.len() {
        return Err(bad_request("chunk body", input));
    }
    if &input[body_start + size..body_start + size + CRLF.len()] != CRLF {
        return Err(bad_request("chunk body", input));
    }

    Ok(DecodedChunk { size, consumed: body_start + size + CRLF.len() })
}

/// Decode a full chunked body starting at `input`, stopping at the
/// zero-size terminator chunk. Returns the reassembled body and the
/// number of input bytes consumed (including the terminator).
pub fn decode_chunked(input: &[u8]) -> HttpResult<(Vec<u8>, usize)> {
    let mut body = Vec::new();
    let mut offset = 0usize;

    loop {
        let chunk = decode_one_chunk(&input[offset..])?;
        if chunk.size == 0 {
            offset += chunk.consumed;
            return Ok((body, offset));
        }
        let body_start = offset + find_crlf(&input[offset..]).unwrap() + CRLF.len();
        body.extend_from_slice(&input[body_start..body_start + chunk.size]);
        offset += chunk.consumed;
    }
}
