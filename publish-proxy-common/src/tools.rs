use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, 0 if the system clock is before it.
#[inline]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|it| it.as_millis() as u64)
        .unwrap_or(0)
}

#[inline]
pub fn is_digit(b: u8) -> bool {
    b >= b'0' && b <= b'9'
}

pub fn convert_to_u64(vec: &[u8]) -> Option<u64> {
    if vec.is_empty() {
        return None;
    }
    let mut result = 0u64;
    for &byte in vec {
        if is_digit(byte) {
            result = result.checked_mul(10)?.checked_add((byte - b'0') as u64)?;
        } else {
            return None;
        }
    }
    Some(result)
}

/// Value of the first `name` parameter in a raw query string, not percent-decoded.
pub fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&')
        .filter_map(|pair| {
            let mut it = pair.splitn(2, '=');
            match (it.next(), it.next()) {
                (Some(k), v) if k == name => Some(v.unwrap_or("")),
                _ => None
            }
        })
        .next()
}
