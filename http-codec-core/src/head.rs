use publish_proxy_common::HeaderMap;

use crate::error::DecodeError;
use crate::{CR, LF};

/// Position right after the blank line terminating a message head.
pub(crate) fn find_head_end(src: &[u8]) -> Option<usize> {
    src.windows(4)
        .position(|w| w == [CR, LF, CR, LF])
        .map(|pos| pos + 4)
}

/// `HTTP/1.0` => 0, `HTTP/1.1` => 1.
pub(crate) fn parse_version(s: &str) -> Result<u8, DecodeError> {
    match s {
        "HTTP/1.1" => Ok(1),
        "HTTP/1.0" => Ok(0),
        _ => Err(DecodeError::UnsupportedVersion)
    }
}

/// Splits a head into its start line and parsed header fields.
pub(crate) fn split_head(head: &[u8]) -> Result<(&str, HeaderMap), DecodeError> {
    let head = std::str::from_utf8(head).map_err(|_| DecodeError::InvalidHeader)?;
    let mut lines = head.split("\r\n");
    let start_line = lines.next().ok_or(DecodeError::InvalidHeader)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        // obsolete line folding is rejected
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(DecodeError::InvalidHeader);
        }
        let (name, value) = line.split_once(':').ok_or(DecodeError::InvalidHeader)?;
        if name.is_empty() || name.ends_with(' ') {
            return Err(DecodeError::InvalidHeader);
        }
        headers.append(name, value.trim());
    }
    Ok((start_line, headers))
}
