use bytes::{Buf, Bytes, BytesMut};
use log::debug;
use tokio_util::codec::Decoder;

use publish_proxy_common::tools::{convert_to_u64, epoch_millis};
use publish_proxy_common::{HeaderMap, ReqPkt};

use crate::error::DecodeError;
use crate::head::{find_head_end, parse_version, split_head};
use crate::{MAX_BODY_SIZE, MAX_HEAD_SIZE};

struct PendingHead {
    method: String,
    path: String,
    query: Option<String>,
    version: u8,
    headers: HeaderMap,
    head_len: usize,
    body_len: usize,
}

enum State {
    Head,
    Body(PendingHead),
}

/// Body length from `Content-Length`, 0 when absent.
///
/// Repeated headers must agree, a malformed value is rejected rather than read as 0.
fn body_len(headers: &HeaderMap) -> Result<usize, DecodeError> {
    let mut len: Option<u64> = None;
    for value in headers.get_all("content-length") {
        let parsed = convert_to_u64(value.trim().as_bytes()).ok_or(DecodeError::InvalidHeader)?;
        match len {
            Some(prev) if prev != parsed => return Err(DecodeError::InvalidHeader),
            _ => len = Some(parsed),
        }
    }
    match len {
        None => Ok(0),
        Some(len) if len > MAX_BODY_SIZE as u64 => Err(DecodeError::BodyTooLarge(MAX_BODY_SIZE)),
        Some(len) => Ok(len as usize),
    }
}

/// Decodes HTTP/1.x requests whose body is delimited by `Content-Length`.
pub struct ReqDecoder {
    state: State,
    pending_start: u64,
    req_start: u64,
}

impl ReqDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Head,
            pending_start: 0,
            req_start: 0,
        }
    }

    /// Epoch millis at which the first byte of the latest request was seen.
    pub fn req_start(&self) -> u64 {
        self.req_start
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<PendingHead>, DecodeError> {
        let head_end = match find_head_end(src) {
            Some(end) => end,
            None => {
                if src.len() > MAX_HEAD_SIZE {
                    return Err(DecodeError::HeadTooLarge(MAX_HEAD_SIZE));
                }
                return Ok(None);
            }
        };
        if head_end > MAX_HEAD_SIZE {
            return Err(DecodeError::HeadTooLarge(MAX_HEAD_SIZE));
        }

        let head = src.split_to(head_end);
        let (request_line, headers) = split_head(&head[..head_end - 4])?;

        let mut parts = request_line.split(' ');
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v), None) if !m.is_empty() && !t.is_empty() => (m, t, v),
            _ => return Err(DecodeError::InvalidRequestLine)
        };
        let version = parse_version(version)?;
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        if headers.is_chunked() {
            return Err(DecodeError::UnsupportedTransferEncoding);
        }
        let body_len = body_len(&headers)?;

        Ok(Some(PendingHead {
            method: method.to_string(),
            path,
            query,
            version,
            headers,
            head_len: head_end,
            body_len,
        }))
    }
}

impl Default for ReqDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ReqDecoder {
    type Item = ReqPkt;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let pending_body = match &self.state {
                State::Head => None,
                State::Body(head) => Some(head.body_len),
            };
            match pending_body {
                None => {
                    // tolerate stray CRLF between pipelined requests
                    while src.starts_with(b"\r\n") {
                        src.advance(2);
                    }
                    if src.is_empty() {
                        return Ok(None);
                    }
                    if self.pending_start == 0 {
                        self.pending_start = epoch_millis();
                    }
                    match self.decode_head(src)? {
                        None => return Ok(None),
                        Some(head) => {
                            debug!("request head decoded: {} {}, body_len: {}", head.method, head.path, head.body_len);
                            self.state = State::Body(head);
                        }
                    }
                }
                Some(body_len) => {
                    if src.len() < body_len {
                        src.reserve(body_len - src.len());
                        return Ok(None);
                    }
                    let body: Bytes = src.split_to(body_len).freeze();
                    let head = match std::mem::replace(&mut self.state, State::Head) {
                        State::Body(head) => head,
                        State::Head => return Err(DecodeError::NotEnoughData),
                    };
                    self.req_start = std::mem::take(&mut self.pending_start);
                    let bytes_total = head.head_len + body.len();
                    let pkt = ReqPkt {
                        method: head.method,
                        path: head.path,
                        query: head.query,
                        version: head.version,
                        headers: head.headers,
                        body,
                        bytes_total,
                    };
                    return Ok(Some(pkt));
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(pkt) => Ok(Some(pkt)),
            None => {
                if buf.is_empty() && matches!(self.state, State::Head) {
                    Ok(None)
                } else {
                    Err(DecodeError::NotEnoughData)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_decoder() {
        let raw = "POST /token?client_id=abc HTTP/1.1\r\nHost: localhost\r\nX-External-Traffic: true\r\nContent-Length: 5\r\n\r\nhello";
        let mut decoder = ReqDecoder::new();
        let mut buf = BytesMut::from(raw);
        let pkt = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(pkt.method, "POST");
        assert_eq!(pkt.path, "/token");
        assert_eq!(pkt.query.as_deref(), Some("client_id=abc"));
        assert_eq!(pkt.version, 1);
        assert_eq!(pkt.headers.get("x-external-traffic"), Some("true"));
        assert_eq!(&pkt.body[..], b"hello");
        assert_eq!(pkt.bytes_total, raw.len());
        assert!(decoder.req_start() > 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_reads() {
        let raw = "GET /authorize HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3\r\n\r\nabc";
        for i in 1..raw.len() {
            let mut decoder = ReqDecoder::new();
            let mut buf = BytesMut::from(&raw[..i]);
            assert!(decoder.decode(&mut buf).unwrap().is_none(), "split at {}", i);
            buf.extend_from_slice(raw[i..].as_bytes());
            let pkt = decoder.decode(&mut buf).unwrap().unwrap();
            assert_eq!(pkt.path, "/authorize");
            assert_eq!(&pkt.body[..], b"abc");
        }
    }

    #[test]
    fn test_pipelined_requests() {
        let mut buf = BytesMut::from("GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.0\r\nConnection: keep-alive\r\n\r\n");
        let mut decoder = ReqDecoder::new();
        let first = decoder.decode(&mut buf).unwrap().unwrap();
        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.path, "/a");
        assert_eq!(second.path, "/b");
        assert_eq!(second.version, 0);
        assert!(second.keep_alive());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_invalid_requests() {
        let cases = vec![
            "GET /a\r\n\r\n",
            "GET /a HTTP/2.0\r\n\r\n",
            "GET /a HTTP/1.1\r\nbroken header\r\n\r\n",
            "POST /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n",
        ];
        for case in cases {
            let mut decoder = ReqDecoder::new();
            let mut buf = BytesMut::from(case);
            assert!(decoder.decode(&mut buf).is_err(), "{}", case);
        }
    }

    #[test]
    fn test_body_too_large() {
        let cases = vec![
            format!("POST /a HTTP/1.1\r\nContent-Length: {}\r\n\r\nab", MAX_BODY_SIZE + 1),
            "POST /a HTTP/1.1\r\nContent-Length: 100000000000000\r\n\r\nab".to_string(),
            "POST /a HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nab".to_string(),
        ];
        for case in cases {
            let mut decoder = ReqDecoder::new();
            let mut buf = BytesMut::from(case.as_str());
            assert!(matches!(decoder.decode(&mut buf), Err(DecodeError::BodyTooLarge(MAX_BODY_SIZE))), "{}", case);
        }
    }

    #[test]
    fn test_ambiguous_content_length() {
        let cases = vec![
            "POST /a HTTP/1.1\r\nContent-Length: 0\r\nContent-Length: 5\r\n\r\nhello",
            "POST /a HTTP/1.1\r\nContent-Length: 5x\r\n\r\nhello",
            "POST /a HTTP/1.1\r\nContent-Length: -1\r\n\r\nhello",
            "POST /a HTTP/1.1\r\nContent-Length:\r\n\r\nhello",
        ];
        for case in cases {
            let mut decoder = ReqDecoder::new();
            let mut buf = BytesMut::from(case);
            assert!(matches!(decoder.decode(&mut buf), Err(DecodeError::InvalidHeader)), "{}", case);
        }

        let mut decoder = ReqDecoder::new();
        let mut buf = BytesMut::from("POST /a HTTP/1.1\r\nContent-Length: 5\r\ncontent-length: 5\r\n\r\nhello");
        let pkt = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&pkt.body[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_head_too_large() {
        let mut raw = String::from("GET /a HTTP/1.1\r\nX-Big: ");
        raw.push_str(&"a".repeat(MAX_HEAD_SIZE + 1));
        let mut decoder = ReqDecoder::new();
        let mut buf = BytesMut::from(raw.as_str());
        assert!(matches!(decoder.decode(&mut buf), Err(DecodeError::HeadTooLarge(_))));
    }

    #[test]
    fn test_truncated_at_eof() {
        let mut decoder = ReqDecoder::new();
        let mut buf = BytesMut::from("POST /a HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");
        assert!(decoder.decode_eof(&mut buf).is_err());

        let mut decoder = ReqDecoder::new();
        let mut buf = BytesMut::new();
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }
}
