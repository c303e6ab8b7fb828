//! Token codec for the CLI wire format.
//!
//! Every field on a CLI line is percent-escaped. A field may carry a
//! `key:value` pair, in which case the separator travels in its escaped form
//! (`%3A`). The separator must be located on the raw text: once decoded, a
//! value may contain any number of colons of its own (URLs, MAC addresses).

use std::collections::HashMap;

/// The escaped `:` that separates a key from its value.
pub const KV_SEPARATOR: &str = "%3A";

/// Percent-decode a raw token. Invalid sequences fall back to the raw text.
pub fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Percent-encode text for use in an outgoing command.
pub fn encode(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}

/// Split a line into its raw fields on single spaces.
pub fn split_line(line: &str) -> Vec<&str> {
    line.split(' ').collect()
}

/// Decode one raw token into a key and optional value.
///
/// Returns `None` for an empty token. The escaped `%3A` separator wins. A
/// token without one splits on its first unescaped colon: parameters this
/// client sends unescaped (`subscribe:1`, `tags:..`) come back verbatim in the
/// echo.
pub fn decode_token(raw: &str) -> Option<(String, Option<String>)> {
    if raw.is_empty() {
        return None;
    }

    if let Some(pos) = raw.find(KV_SEPARATOR) {
        return Some((
            decode(&raw[..pos]),
            Some(decode(&raw[pos + KV_SEPARATOR.len()..])),
        ));
    }

    match raw.split_once(':') {
        Some((key, value)) => Some((decode(key), Some(decode(value)))),
        None => Some((decode(raw), None)),
    }
}

/// Encode a key and value into one raw token.
pub fn encode_token(key: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{}{}{}", encode(key), KV_SEPARATOR, encode(value)),
        None => encode(key),
    }
}

/// Decoded tokens of one line.
///
/// Keeps first-appearance order; a repeated key keeps its position and takes
/// the last value written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMap {
    entries: Vec<(String, Option<String>)>,
    index: HashMap<String, usize>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: Option<String>) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Value for `key`, if the key is present and carries a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .and_then(|&pos| self.entries[pos].1.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Integer value for `key`, or 0 when absent or unparseable.
    ///
    /// Decimal values (`time:12.75`) are truncated.
    pub fn get_int_or_zero(&self, key: &str) -> i32 {
        self.get(key).map(parse_decimal_int_or_zero).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a sequence of raw tokens into a [`TokenMap`].
pub fn decode_tokens<'a, I>(tokens: I) -> TokenMap
where
    I: IntoIterator<Item = &'a str>,
{
    let mut map = TokenMap::new();
    for raw in tokens {
        if let Some((key, value)) = decode_token(raw) {
            map.insert(key, value);
        }
    }
    map
}

/// Parse an integer the way the server formats numbers, treating garbage as 0.
pub fn parse_decimal_int_or_zero(s: &str) -> i32 {
    let s = s.trim();
    if let Ok(n) = s.parse::<i32>() {
        return n;
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i32,
        _ => 0,
    }
}
