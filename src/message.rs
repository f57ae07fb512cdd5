//! AIS messages as key/value records
//!
//! A [`Message`] is a flat map from string keys to JSON-style primitive
//! values. It always carries the key `nmea` with the raw sentence text
//! (possibly empty), and may be constructed from a raw NMEA line, a JSON
//! object string, or an existing map.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Leading path segment of the UUID name, identifying this toolkit
const UUID_PREFIX: &str = "ais-tools";

/// Message fields hashed into the default UUID
pub const DEFAULT_UUID_FIELDS: [&str; 3] = ["source", "nmea", "tagblock_timestamp"];

/// Characters left untouched by the UUID percent-encoding: alphanumerics
/// plus `_ . - ~ /`
const QUOTE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// A decoded or to-be-encoded AIS message as a string-keyed record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    fields: Map<String, Value>,
}

impl Message {
    /// Creates an empty message carrying only `nmea: ""`
    pub fn new() -> Self {
        let mut msg = Self {
            fields: Map::new(),
        };
        msg.ensure_nmea();
        msg
    }

    fn ensure_nmea(&mut self) {
        if !self.fields.contains_key("nmea") {
            self.fields.insert("nmea".into(), Value::from(""));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Merges all fields of `other` into this message, overwriting on clash
    pub fn extend(&mut self, other: Message) {
        self.fields.extend(other.fields);
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Sets `source` if absent, or unconditionally with `overwrite`
    pub fn add_source(&mut self, source: &str, overwrite: bool) -> &mut Self {
        if overwrite || !self.fields.contains_key("source") {
            self.insert("source", source);
        }
        self
    }

    /// Attaches a deterministic UUID derived from the default field set
    pub fn add_uuid(&mut self, overwrite: bool) -> &mut Self {
        self.add_uuid_fields(&DEFAULT_UUID_FIELDS, overwrite)
    }

    /// Attaches a deterministic UUID derived from the named fields.
    ///
    /// The UUID is version 5 over the URL namespace, of the `/`-joined,
    /// percent-encoded, lowercased sequence `["ais-tools", field values...]`.
    /// Absent fields contribute an empty segment, so the same logical
    /// message always hashes the same way.
    pub fn add_uuid_fields(&mut self, fields: &[&str], overwrite: bool) -> &mut Self {
        if overwrite || !self.fields.contains_key("uuid") {
            let uuid = self.message_uuid(fields);
            self.insert("uuid", uuid);
        }
        self
    }

    fn message_uuid(&self, fields: &[&str]) -> String {
        let mut segments = vec![UUID_PREFIX.to_string()];
        segments.extend(fields.iter().map(|f| value_string(self.get(f))));
        let name = segments
            .iter()
            .map(|s| utf8_percent_encode(s, QUOTE).to_string())
            .collect::<Vec<_>>()
            .join("/")
            .to_lowercase();
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }

    /// Annotates the message with the implementation name and version
    pub fn add_parser_version(&mut self) -> &mut Self {
        self.insert(
            "parser",
            format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        );
        self
    }
}

/// Renders a field value the way it should appear inside a UUID name or a
/// tagblock: bare strings, plain decimal numbers, empty for absent.
pub fn value_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

impl From<Map<String, Value>> for Message {
    fn from(fields: Map<String, Value>) -> Self {
        let mut msg = Self { fields };
        msg.ensure_nmea();
        msg
    }
}

impl From<&str> for Message {
    /// Builds a message from either a JSON object or a raw NMEA line.
    /// Malformed JSON is captured as an `error` field rather than failing.
    fn from(raw: &str) -> Self {
        let line = raw.trim();
        let mut msg = if line.starts_with('{') {
            match serde_json::from_str::<Map<String, Value>>(line) {
                Ok(fields) => Self { fields },
                Err(err) => {
                    let mut msg = Self::default();
                    msg.insert("nmea", raw);
                    msg.insert("error", format!("JSONDecodeError: {}", err));
                    msg
                }
            }
        } else {
            let mut msg = Self::default();
            msg.insert("nmea", line);
            msg
        };
        msg.ensure_nmea();
        msg
    }
}

impl From<String> for Message {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_from_raw_nmea() {
        let msg = Message::from("!AIVDM1234567*89");
        assert_eq!(msg.get_str("nmea"), Some("!AIVDM1234567*89"));
    }

    #[test]
    fn construct_from_json() {
        let msg = Message::from(r#"{"nmea": "!AIVDM1234567*89"}"#);
        assert_eq!(msg.get_str("nmea"), Some("!AIVDM1234567*89"));
    }

    #[test]
    fn construct_empty_and_whitespace() {
        assert_eq!(Message::from("").get_str("nmea"), Some(""));
        assert_eq!(Message::from("\n").get_str("nmea"), Some(""));
        assert_eq!(Message::new().get_str("nmea"), Some(""));
    }

    #[test]
    fn construct_bad_json_sets_error() {
        for raw in ["{not valid JSON}", "{field:value}"] {
            let msg = Message::from(raw);
            assert!(
                msg.get_str("error").unwrap().starts_with("JSONDecodeError"),
                "{:?}",
                msg
            );
            assert_eq!(msg.get_str("nmea"), Some(raw));
        }
    }

    #[test]
    fn json_without_nmea_gains_empty_nmea() {
        let msg = Message::from(r#"{"id": 18}"#);
        assert_eq!(msg.get_str("nmea"), Some(""));
        assert_eq!(msg.get_u64("id"), Some(18));
    }

    #[test]
    fn add_source_respects_overwrite() {
        let mut msg = Message::new();
        msg.add_source("source", false);
        assert_eq!(msg.get_str("source"), Some("source"));

        msg.add_source("new", false);
        assert_eq!(msg.get_str("source"), Some("source"));

        msg.add_source("new", true);
        assert_eq!(msg.get_str("source"), Some("new"));
    }

    #[test]
    fn add_uuid_is_deterministic() {
        let mut a = Message::from("!AVIDM123");
        let mut b = Message::from("!AVIDM123");
        a.add_uuid(false);
        b.add_uuid(false);
        assert_eq!(a.get_str("uuid"), b.get_str("uuid"));
        let uuid = Uuid::parse_str(a.get_str("uuid").unwrap()).unwrap();
        assert_eq!(uuid.get_version_num(), 5);
    }

    #[test]
    fn add_uuid_depends_on_fields() {
        let mut a = Message::from("!AVIDM123");
        let mut b = Message::from("!AVIDM123");
        b.insert("tagblock_timestamp", 1598653784u64);
        a.add_uuid(false);
        b.add_uuid(false);
        assert_ne!(a.get_str("uuid"), b.get_str("uuid"));
    }

    #[test]
    fn add_uuid_respects_overwrite() {
        let mut msg = Message::from("!AVIDM123");
        msg.insert("uuid", "old");
        msg.add_uuid(false);
        assert_eq!(msg.get_str("uuid"), Some("old"));
        msg.add_uuid(true);
        assert_ne!(msg.get_str("uuid"), Some("old"));
    }

    #[test]
    fn parser_version_names_crate() {
        let mut msg = Message::new();
        msg.add_parser_version();
        let parser = msg.get_str("parser").unwrap();
        assert!(parser.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn serializes_transparently() {
        let mut msg = Message::new();
        msg.insert("id", 18u64);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
