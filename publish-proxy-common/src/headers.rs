use std::fmt::{Debug, Formatter};

/// Ordered header list with case-insensitive name lookup.
///
/// Duplicated names are kept in arrival order, [HeaderMap::get] returns the first one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap { entries: Vec::new() }
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Replaces every occurrence of `name` with a single entry.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.append(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item=&'a str> + 'a {
        self.entries.iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parsed `Content-Length`, `None` when absent or malformed.
    pub fn content_length(&self) -> Option<usize> {
        self.get("content-length").and_then(|it| it.trim().parse::<usize>().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.get_all("transfer-encoding")
            .any(|it| it.split(',').any(|enc| enc.trim().eq_ignore_ascii_case("chunked")))
    }

    /// True when a `Connection` header lists the `close` token.
    pub fn has_connection_close(&self) -> bool {
        self.get_all("connection")
            .any(|it| it.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("close")))
    }
}

impl Debug for HeaderMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item=(&'a str, &'a str)>>(iter: T) -> Self {
        let mut headers = HeaderMap::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}
