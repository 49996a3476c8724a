pub mod error;
mod head;
pub mod req_decoder;
pub mod req_encoder;
pub mod res_codec;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

/// Upper bound for a request or response head.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Upper bound for a request body announced by `Content-Length`.
pub const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;
