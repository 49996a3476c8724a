use std::fmt::{Debug, Formatter};

use bytes::Bytes;

pub use crate::headers::HeaderMap;

pub mod headers;
pub mod tools;

/// A fully read downstream HTTP/1.x request.
pub struct ReqPkt {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// minor version, `HTTP/1.0` => 0, `HTTP/1.1` => 1
    pub version: u8,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub bytes_total: usize,
}

impl ReqPkt {
    /// Whether the client expects the connection to stay open after the response.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_connection_close() {
            return false;
        }
        if self.version == 0 {
            return self.headers.get_all("connection")
                .any(|it| it.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("keep-alive")));
        }
        true
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref().and_then(|q| tools::query_param(q, name))
    }
}

impl Debug for ReqPkt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqPkt")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// An upstream response read to the end, kept as raw bytes for relaying.
pub struct ResPkt {
    pub status: u16,
    pub version: u8,
    pub headers: HeaderMap,
    pub head_len: usize,
    pub raw_bytes: Bytes,
}

impl ResPkt {
    pub fn body_len(&self) -> usize {
        self.raw_bytes.len().saturating_sub(self.head_len)
    }

    /// True when the body length is known without closing the connection.
    pub fn is_self_delimited(&self) -> bool {
        self.headers.content_length().is_some() || self.headers.is_chunked()
            || self.status == 204 || self.status == 304 || (100..200).contains(&self.status)
    }
}

impl Debug for ResPkt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResPkt")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body_len())
            .finish()
    }
}
