//! Ordered, case-preserving header block.
//!
//! SPDY name/value blocks and the HTTP messages rebuilt from them both need
//! to keep header names exactly as received and keep repeated headers in
//! arrival order. [`Headers`] stores entries in a flat vector and performs
//! case-insensitive lookups, which keeps the common small blocks cheap.

use std::fmt;

/// An ordered multimap of header names to values.
///
/// # Examples
///
/// ```
/// use spillframe::headers::Headers;
///
/// let mut headers = Headers::new();
/// headers.add("Accept", "text/html");
/// headers.add("accept", "application/json");
/// assert_eq!(headers.get("ACCEPT"), Some("text/html"));
/// assert_eq!(headers.get_all("accept").count(), 2);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header block.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a header, keeping any existing values for the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single `value`.
    ///
    /// The new entry takes the position of the first removed entry so that
    /// rewriting a header does not reorder the block.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => {
                let mut cursor = 0usize;
                self.entries.retain(|(n, _)| {
                    let keep = cursor <= index || !n.eq_ignore_ascii_case(&name);
                    cursor += 1;
                    keep
                });
                self.entries[index] = (name, value);
            }
            None => self.entries.push((name, value)),
        }
    }

    /// First value stored for `name`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether at least one value exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.position(name).is_some() }

    /// Remove every value of `name`. Returns `true` if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Remove every value of `name`, returning the first one.
    pub fn take(&mut self, name: &str) -> Option<String> {
        let first = self.position(name).map(|index| self.entries[index].1.clone());
        self.remove(name);
        first
    }

    /// Append every entry of `other` after the existing entries.
    pub fn extend_from(&mut self, other: &Headers) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Iterate over `(name, value)` pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of entries, counting repeated names separately.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the block has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
