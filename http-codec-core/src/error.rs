use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid request line")]
    InvalidRequestLine,
    #[error("invalid status line")]
    InvalidStatusLine,
    #[error("invalid header line")]
    InvalidHeader,
    #[error("message head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("unsupported http version")]
    UnsupportedVersion,
    #[error("chunked request bodies are not supported")]
    UnsupportedTransferEncoding,
    #[error("incomplete message")]
    NotEnoughData,
    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),
}
