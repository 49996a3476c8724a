use bytes::{BufMut, BytesMut};

use publish_proxy_common::ReqPkt;

const HOP_BY_HOP: [&str; 6] = ["connection", "keep-alive", "proxy-connection", "te", "trailer", "upgrade"];
const CONTENT_LENGTH: &str = "content-length";

/// Serializes a downstream request for a single-use upstream connection.
///
/// Hop-by-hop headers are dropped and `Connection: close` is forced, so the upstream
/// response is always terminated by the upstream closing the socket at the latest.
/// `Content-Length` is written once, from the decoded body.
pub fn encode_upstream_request(req: &ReqPkt) -> BytesMut {
    let mut buf = BytesMut::with_capacity(req.bytes_total + 32);
    buf.put_slice(req.method.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(req.path.as_bytes());
    if let Some(query) = &req.query {
        buf.put_u8(b'?');
        buf.put_slice(query.as_bytes());
    }
    buf.put_slice(if req.version == 0 { b" HTTP/1.0\r\n" } else { b" HTTP/1.1\r\n" });

    for (name, value) in req.headers.iter() {
        if name.eq_ignore_ascii_case(CONTENT_LENGTH) || HOP_BY_HOP.iter().any(|it| name.eq_ignore_ascii_case(it)) {
            continue;
        }
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    if !req.body.is_empty() || req.headers.get(CONTENT_LENGTH).is_some() {
        buf.put_slice(format!("Content-Length: {}\r\n", req.body.len()).as_bytes());
    }
    buf.put_slice(b"Connection: close\r\n\r\n");
    buf.put_slice(&req.body);
    buf
}
