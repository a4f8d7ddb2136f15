//! The ordered key/value mapping carried inside an OpenToken, and its
//! line-delimited textual wire form.

use crate::error::OpenTokenError;

/// An ordered mapping from string key to string value.
///
/// Order is observable and part of the on-wire form: it is preserved on both
/// [`Payload::to_line_form`] and [`Payload::from_line_form`]. Duplicate keys
/// are not expected; if present, the last occurrence's value wins, but it is
/// written in place at the *first* occurrence's position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<(String, String)>);

impl Payload {
    /// Builds a payload from an ordered sequence of pairs, collapsing
    /// duplicate keys so the last occurrence's value wins, written in place
    /// at the first occurrence's position, mirroring `OrderedDict(pairs)`.
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut ordered = Vec::new();
        for (key, value) in pairs {
            if let Some(slot) = ordered.iter_mut().find(|(k, _): &&mut (String, String)| *k == key) {
                *slot = (key, value);
            } else {
                ordered.push((key, value));
            }
        }
        Self(ordered)
    }

    /// Parses a payload from a JSON string that decodes to an object; pair
    /// order from the JSON text is preserved (requires `serde_json`'s
    /// `preserve_order` feature, enabled by this crate).
    ///
    /// # Errors
    /// Returns [`OpenTokenError::BadArgument`] if `json` does not decode to a
    /// JSON object of string values.
    pub fn from_json(json: &str) -> Result<Self, OpenTokenError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| OpenTokenError::BadArgument(format!("Payload must be valid JSON: {e}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(OpenTokenError::BadArgument(
                "Payload must be of type OrderedDict.".to_owned(),
            ));
        };
        let mut pairs = Vec::with_capacity(map.len());
        for (key, value) in map {
            let serde_json::Value::String(value) = value else {
                return Err(OpenTokenError::BadArgument(format!(
                    "Payload value for '{key}' must be a string."
                )));
            };
            pairs.push((key, value));
        }
        Ok(Self::new(pairs))
    }

    /// Looks up a key, returning the most recently inserted value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Appends a pair, replacing any existing occurrence of `key` in place.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Iterates the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload carries no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes to the `key1=value1\nkey2=value2\n…` textual form (no
    /// trailing newline), UTF-8 encoded as bytes ready for HMAC/compression.
    #[must_use]
    pub(crate) fn to_line_form(&self) -> Vec<u8> {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    /// Parses the line-delimited textual form back into an ordered payload.
    /// Empty lines are dropped; each line splits on the *first* `=` only, so
    /// values may themselves contain `=` (keys should not, per the format's
    /// lack of an escaping rule — see design notes).
    pub(crate) fn from_line_form(cleartext: &[u8]) -> Result<Self, OpenTokenError> {
        let text = core::str::from_utf8(cleartext)
            .map_err(|e| OpenTokenError::Malformed(format!("Cleartext is not valid UTF-8: {e}")))?;
        let mut pairs = Vec::new();
        for line in text.split('\n') {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                OpenTokenError::Malformed(format!("Malformed payload line: {line:?}"))
            })?;
            pairs.push((key.to_owned(), value.to_owned()));
        }
        Ok(Self::new(pairs))
    }
}

impl IntoIterator for Payload {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, String)> for Payload {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::new(iter)
    }
}
