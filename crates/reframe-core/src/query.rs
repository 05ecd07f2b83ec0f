//! Canonical query-string handling
//!
//! Turns arbitrary query strings into an order-independent canonical form.
//! Two parameter sets that are key- and value-equal always produce
//! byte-identical canonical strings and safe-encoded strings, no matter how
//! the original request ordered or percent-encoded them. Cache-key stability
//! depends on this.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Byte set escaped by JavaScript's `encodeURIComponent`: everything outside
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`. Stored keys produced by earlier
/// deployments used this exact alphabet, so the proxy must keep it.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Canonical parameter mapping. Keys are unique and iterate in byte order;
/// values are stored percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(BTreeMap<String, String>);

impl ParamMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParamMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Normalizes raw query strings into [`ParamMap`]s and back.
pub struct QueryNormalizer;

impl QueryNormalizer {
    /// Parse a raw query string into its canonical parameter mapping.
    ///
    /// Pairs are split on `&`, then on the first `=`; a pair without `=`
    /// maps to the empty value. Values are percent-decoded; keys are kept
    /// verbatim. Duplicate keys keep the last occurrence. A missing or empty
    /// query string yields an empty map.
    pub fn normalize(raw: Option<&str>) -> ParamMap {
        let mut map = BTreeMap::new();
        let Some(raw) = raw else {
            return ParamMap(map);
        };
        if raw.is_empty() {
            return ParamMap(map);
        }

        for pair in raw.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, value),
                None => (pair, ""),
            };
            map.insert(key.to_string(), Self::percent_decode(value));
        }

        ParamMap(map)
    }

    /// Serialize a parameter mapping back to `key=value&...` form, in map
    /// order, with values percent-encoded.
    pub fn serialize(params: &ParamMap) -> String {
        params
            .iter()
            .map(|(key, value)| format!("{}={}", key, Self::percent_encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Encode a string for use as a storage-key segment: percent-decode,
    /// replace the reserved characters `=`, `,`, `&` and `|` with `-`, then
    /// percent-encode the result. Idempotent for strings without reserved
    /// characters.
    pub fn safe_encode(s: &str) -> String {
        let decoded = percent_decode_str(s).decode_utf8_lossy();
        let replaced: String = decoded
            .chars()
            .map(|c| match c {
                '=' | ',' | '&' | '|' => '-',
                other => other,
            })
            .collect();
        Self::percent_encode(&replaced)
    }

    fn percent_decode(s: &str) -> String {
        percent_decode_str(s).decode_utf8_lossy().into_owned()
    }

    fn percent_encode(s: &str) -> String {
        utf8_percent_encode(s, URI_COMPONENT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_keys() {
        let params = QueryNormalizer::normalize(Some("w=300&crop=1&h=200"));
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["crop", "h", "w"]);
    }

    #[test]
    fn test_normalize_is_order_independent() {
        let a = QueryNormalizer::normalize(Some("h=200&w=300"));
        let b = QueryNormalizer::normalize(Some("w=300&h=200"));
        assert_eq!(a, b);
        assert_eq!(QueryNormalizer::serialize(&a), QueryNormalizer::serialize(&b));
    }

    #[test]
    fn test_normalize_is_encoding_independent() {
        // "50,50" spelled plainly and with an escaped comma are the same value
        let a = QueryNormalizer::normalize(Some("crop=50,50,25,25"));
        let b = QueryNormalizer::normalize(Some("crop=50%2C50%2C25%2C25"));
        assert_eq!(a, b);
        assert_eq!(
            QueryNormalizer::safe_encode(&QueryNormalizer::serialize(&a)),
            QueryNormalizer::safe_encode(&QueryNormalizer::serialize(&b)),
        );
    }

    #[test]
    fn test_normalize_last_duplicate_wins() {
        let params = QueryNormalizer::normalize(Some("w=100&w=300"));
        assert_eq!(params.get("w"), Some("300"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_normalize_missing_value() {
        let params = QueryNormalizer::normalize(Some("webp&w=300"));
        assert_eq!(params.get("webp"), Some(""));
        assert_eq!(params.get("w"), Some("300"));
    }

    #[test]
    fn test_normalize_splits_on_first_equals() {
        let params = QueryNormalizer::normalize(Some("background=a=b"));
        assert_eq!(params.get("background"), Some("a=b"));
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(QueryNormalizer::normalize(None).is_empty());
        assert!(QueryNormalizer::normalize(Some("")).is_empty());
    }

    #[test]
    fn test_normalize_twice_is_idempotent() {
        let once = QueryNormalizer::normalize(Some("b=2&a=%20x"));
        let serialized = QueryNormalizer::serialize(&once);
        let twice = QueryNormalizer::normalize(Some(&serialized));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serialize_encodes_values() {
        let params = QueryNormalizer::normalize(Some("background=light%20gray"));
        assert_eq!(QueryNormalizer::serialize(&params), "background=light%20gray");
    }

    #[test]
    fn test_safe_encode_replaces_reserved_characters() {
        assert_eq!(QueryNormalizer::safe_encode("w=300"), "w-300");
        assert_eq!(QueryNormalizer::safe_encode("a,b|c&d"), "a-b-c-d");
    }

    #[test]
    fn test_safe_encode_is_idempotent_without_reserved_characters() {
        assert_eq!(QueryNormalizer::safe_encode("w-300"), "w-300");
        assert_eq!(
            QueryNormalizer::safe_encode(&QueryNormalizer::safe_encode("h-200_w-300")),
            "h-200_w-300"
        );
    }

    #[test]
    fn test_safe_encode_decodes_before_replacing() {
        // An escaped comma is decoded first, then dashed like a literal one
        assert_eq!(QueryNormalizer::safe_encode("crop=50%2C50"), "crop-50-50");
    }

    #[test]
    fn test_safe_encode_escapes_remaining_bytes() {
        assert_eq!(QueryNormalizer::safe_encode("a b"), "a%20b");
        assert_eq!(QueryNormalizer::safe_encode("a~b!c"), "a~b!c");
    }
}
