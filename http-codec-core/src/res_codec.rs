use bytes::{BufMut, Bytes, BytesMut};

use publish_proxy_common::tools::convert_to_u64;
use publish_proxy_common::{HeaderMap, ResPkt};

use crate::error::DecodeError;
use crate::head::{find_head_end, parse_version, split_head};
use crate::MAX_HEAD_SIZE;

/// Parses a complete upstream response, keeping the raw bytes for relaying.
pub fn parse_response(raw: Bytes) -> Result<ResPkt, DecodeError> {
    let head_len = match find_head_end(&raw) {
        Some(end) if end <= MAX_HEAD_SIZE => end,
        Some(_) => return Err(DecodeError::HeadTooLarge(MAX_HEAD_SIZE)),
        None => {
            if raw.len() > MAX_HEAD_SIZE {
                return Err(DecodeError::HeadTooLarge(MAX_HEAD_SIZE));
            }
            return Err(DecodeError::NotEnoughData);
        }
    };
    let (status_line, headers) = split_head(&raw[..head_len - 4])?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().ok_or(DecodeError::InvalidStatusLine)?;
    let version = parse_version(version)?;
    let status = parts.next()
        .filter(|it| it.len() == 3)
        .and_then(|it| convert_to_u64(it.as_bytes()))
        .ok_or(DecodeError::InvalidStatusLine)?;

    Ok(ResPkt {
        status: status as u16,
        version,
        headers,
        head_len,
        raw_bytes: raw,
    })
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Builds a response generated by the proxy itself.
pub fn build_response(status: u16, body: &[u8], keep_alive: bool) -> ResPkt {
    let mut headers = HeaderMap::new();
    headers.append("Content-Type", "text/plain");
    headers.append("Content-Length", &body.len().to_string());
    if !keep_alive {
        headers.append("Connection", "close");
    }

    let mut buf = BytesMut::with_capacity(128 + body.len());
    buf.put_slice(format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status)).as_bytes());
    for (name, value) in headers.iter() {
        buf.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    buf.put_slice(b"\r\n");
    let head_len = buf.len();
    buf.put_slice(body);

    ResPkt {
        status,
        version: 1,
        headers,
        head_len,
        raw_bytes: buf.freeze(),
    }
}

pub fn encode_response(status: u16, body: &[u8], keep_alive: bool) -> Bytes {
    build_response(status, body, keep_alive).raw_bytes
}
