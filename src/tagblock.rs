//! NMEA 4.10 tagblock handling
//!
//! Tag blocks are optional metadata prefixes of the form `\k:v,k:v,…*CS\`
//! carrying reception metadata such as timestamps, station identifiers and
//! multipart grouping. Parsed fields are stored under `tagblock_`-prefixed
//! keys; unknown keys are preserved verbatim under `tagblock_<key>`.
//!
//! For details see [NMEA Tag Blocks](https://gpsd.gitlab.io/gpsd/AIVDM.html#_nmea_tag_blocks).

use crate::checksum::{checksum_str, is_checksum_valid};
use crate::errors::{Error, Result};
use crate::message::{value_string, Message};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Timestamp format of the `T:` field
pub const TAGBLOCK_T_FORMAT: &str = "%Y-%m-%d %H.%M.%S";

/// `c:` values above this are interpreted as milliseconds rather than seconds
const MILLISECOND_THRESHOLD: u64 = 40_000_000_000;

/// Wire keys emitted in canonical order, with their `tagblock_` names
const CANONICAL_FIELDS: [(&str, &str); 6] = [
    ("c", "tagblock_timestamp"),
    ("s", "tagblock_station"),
    ("t", "tagblock_text"),
    ("d", "tagblock_destination"),
    ("n", "tagblock_line_count"),
    ("r", "tagblock_relative_time"),
];

/// Group-related keys never re-emitted as plain `k:v` fields
const GROUP_FIELDS: [&str; 4] = [
    "tagblock_sentence",
    "tagblock_groupsize",
    "tagblock_id",
    "tagblock_group_id",
];

/// Parses the text between the tagblock delimiters into `tagblock_*` fields.
///
/// The checksum separator `*` must be present; the checksum value itself is
/// only verified when `validate_checksum` is set.
pub fn parse_tagblock(tagblock: &str, validate_checksum: bool) -> Result<Message> {
    let tagblock = tagblock.trim_matches('\\');
    let mut fields = Message::default();
    if tagblock.is_empty() {
        return Ok(fields);
    }

    let Some((body, _)) = tagblock.split_once('*') else {
        return Err(Error::Parse(format!(
            "tagblock missing checksum separator: {tagblock:?}"
        )));
    };
    if validate_checksum && !is_checksum_valid(tagblock) {
        return Err(Error::Parse(format!(
            "invalid tagblock checksum: {tagblock:?}"
        )));
    }

    for field in body.split(',') {
        let Some((key, value)) = field.split_once(':') else {
            return Err(Error::Parse(format!(
                "tagblock field missing ':' delimiter: {field:?}"
            )));
        };
        match key {
            "c" => {
                let t: u64 = value.parse().map_err(|_| {
                    Error::Parse(format!("invalid tagblock timestamp: {value:?}"))
                })?;
                if t <= MILLISECOND_THRESHOLD {
                    fields.insert("tagblock_timestamp", t);
                } else {
                    fields.insert("tagblock_timestamp", t as f64 / 1000.0);
                }
            }
            "n" => fields.insert("tagblock_line_count", parse_int(value)?),
            "r" => fields.insert("tagblock_relative_time", parse_int(value)?),
            "d" => fields.insert("tagblock_destination", value),
            "s" => fields.insert("tagblock_station", value),
            "t" => fields.insert("tagblock_text", value),
            "g" => {
                let parts: Vec<&str> = value.split('-').collect();
                if parts.len() != 3 {
                    return Err(Error::Parse(format!(
                        "invalid group field in tagblock: {value:?}"
                    )));
                }
                fields.insert("tagblock_sentence", parse_int(parts[0])?);
                fields.insert("tagblock_groupsize", parse_int(parts[1])?);
                fields.insert("tagblock_id", parse_int(parts[2])?);
            }
            other => fields.insert(&format!("tagblock_{other}"), value),
        }
    }
    Ok(fields)
}

fn parse_int(value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::Parse(format!("invalid integer in tagblock: {value:?}")))
}

/// Emits `tagblock_*` fields of `message` as tagblock text (without the
/// surrounding backslashes), with a trailing checksum.
///
/// Fields appear in a stable canonical order so that round trips are
/// textually deterministic. The group triple is reassembled into a single
/// `g:S-G-I` field only when sentence, groupsize and id are all present.
pub fn encode_tagblock(message: &Message) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(value) = message.get("tagblock_timestamp") {
        parts.push(format!("c:{}", timestamp_field(value)));
    }
    for &(key, name) in CANONICAL_FIELDS.iter().skip(1) {
        if let Some(value) = message.get(name) {
            parts.push(format!("{key}:{}", value_string(Some(value))));
        }
    }
    if let (Some(sentence), Some(groupsize), Some(id)) = (
        message.get("tagblock_sentence"),
        message.get("tagblock_groupsize"),
        message.get("tagblock_id"),
    ) {
        parts.push(format!(
            "g:{}-{}-{}",
            value_string(Some(sentence)),
            value_string(Some(groupsize)),
            value_string(Some(id))
        ));
    }

    let known: Vec<&str> = CANONICAL_FIELDS.iter().map(|(_, name)| *name).collect();
    let mut extra: Vec<(&String, &Value)> = message
        .iter()
        .filter(|(key, _)| {
            key.starts_with("tagblock_")
                && !known.contains(&key.as_str())
                && !GROUP_FIELDS.contains(&key.as_str())
        })
        .collect();
    extra.sort_by_key(|(key, _)| key.as_str());
    for (key, value) in extra {
        let wire_key = &key["tagblock_".len()..];
        parts.push(format!("{wire_key}:{}", value_string(Some(value))));
    }

    let body = parts.join(",");
    format!("{}*{}", body, checksum_str(&body))
}

/// Integer timestamps are emitted as seconds; fractional ones carry
/// millisecond precision and are emitted as milliseconds.
fn timestamp_field(value: &Value) -> String {
    if value.as_i64().is_some() || value.as_u64().is_some() {
        value_string(Some(value))
    } else if let Some(t) = value.as_f64() {
        format!("{}", (t * 1000.0).round() as i64)
    } else {
        value_string(Some(value))
    }
}

/// Builds a fresh tagblock for `station`, stamped with `timestamp` seconds
/// (now when `None`). The `c:` field always carries milliseconds; the
/// human-readable `T:` field is added only when `add_tagblock_t` is set.
pub fn create_tagblock(station: &str, timestamp: Option<f64>, add_tagblock_t: bool) -> String {
    let t = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis() as f64 / 1000.0);
    let millis = (t * 1000.0).round() as i64;
    let mut body = format!("c:{millis},s:{station}");
    if add_tagblock_t {
        if let Some(dt) = DateTime::<Utc>::from_timestamp_millis(millis) {
            body.push_str(&format!(",T:{}", dt.format(TAGBLOCK_T_FORMAT)));
        }
    }
    format!("{}*{}", body, checksum_str(&body))
}

/// Splits the tagblock off the front of a sentence. A line carries a
/// tagblock iff it starts with `\` but not `\!`; only the first message of
/// a concatenated multipart line is split.
pub fn split_tagblock(nmea: &str) -> Result<(&str, &str)> {
    if nmea.starts_with('\\') && !nmea.starts_with("\\!") {
        nmea[1..]
            .split_once('\\')
            .ok_or_else(|| Error::Parse(format!("missing tagblock delimiter: {nmea:?}")))
    } else {
        Ok(("", nmea))
    }
}

/// Joins tagblock text onto a sentence that does not already carry one
pub fn join_tagblock(tagblock: &str, nmea: &str) -> String {
    if !tagblock.is_empty() && !nmea.is_empty() {
        format!(
            "\\{}\\{}",
            tagblock.trim_start_matches('\\'),
            nmea.trim_start_matches('\\')
        )
    } else {
        format!("{}{}", tagblock, nmea)
    }
}

/// Adds a tagblock to a sentence. An existing tagblock is replaced when
/// `overwrite` is set and kept otherwise.
pub fn add_tagblock(tagblock: &str, nmea: &str, overwrite: bool) -> Result<String> {
    let (existing, nmea) = split_tagblock(nmea)?;
    let tagblock = if !existing.is_empty() && !overwrite {
        existing
    } else {
        tagblock
    };
    Ok(join_tagblock(tagblock, nmea))
}

/// Merges `updates` into the existing tagblock of `line` (adding one if the
/// line has none) and re-emits the sentence.
pub fn update_tagblock(line: &str, updates: &Message) -> Result<String> {
    let (existing, nmea) = split_tagblock(line)?;
    let mut fields = parse_tagblock(existing, false)?;
    for (key, value) in updates.iter() {
        if key.starts_with("tagblock_") {
            fields.insert(key, value.clone());
        }
    }
    Ok(join_tagblock(&encode_tagblock(&fields), nmea))
}

/// Attempts to extract the tagblock timestamp without failing, for
/// annotating lines that cannot be decoded. Returns 0 when no timestamp can
/// be found.
pub fn safe_tagblock_timestamp(line: &str) -> f64 {
    if !line.starts_with('\\') {
        return 0.0;
    }
    let tagblock = line[1..].split('\\').next().unwrap_or("");
    let body = tagblock.split('*').next().unwrap_or("");
    for field in body.split(',') {
        if let Some((key, value)) = field.split_once(':') {
            if key == "c" {
                if let Ok(t) = value.parse::<u64>() {
                    return if t <= MILLISECOND_THRESHOLD {
                        t as f64
                    } else {
                        t as f64 / 1000.0
                    };
                }
                return 0.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_fields() {
        let fields =
            parse_tagblock("s:rORBCOMM000,q:u,c:1509502436,T:2017-11-01 02.13.56*50", false)
                .unwrap();
        assert_eq!(fields.get_u64("tagblock_timestamp"), Some(1509502436));
        assert_eq!(fields.get_str("tagblock_station"), Some("rORBCOMM000"));
        assert_eq!(fields.get_str("tagblock_q"), Some("u"));
        assert_eq!(fields.get_str("tagblock_T"), Some("2017-11-01 02.13.56"));
    }

    #[test]
    fn parse_millisecond_timestamp() {
        let fields = parse_tagblock(
            "c:1577762601537,s:sdr-experiments,T:2019-12-30 22.23.21*5D",
            false,
        )
        .unwrap();
        assert_eq!(fields.get_f64("tagblock_timestamp"), Some(1577762601.537));
    }

    #[test]
    fn parse_group_triple() {
        let fields = parse_tagblock("g:1-2-4372,s:rORBCOMM109,c:1426032000*00", false).unwrap();
        assert_eq!(fields.get_i64("tagblock_sentence"), Some(1));
        assert_eq!(fields.get_i64("tagblock_groupsize"), Some(2));
        assert_eq!(fields.get_i64("tagblock_id"), Some(4372));
    }

    #[test]
    fn parse_rejects_malformed() {
        // missing checksum separator
        assert!(parse_tagblock("s:x,c:1509502436,T:2017-11-01 02.13.56", false).is_err());
        // missing field delimiter
        assert!(parse_tagblock("s:x,c1509502436*50", false).is_err());
        // malformed group
        assert!(parse_tagblock("g:1-2--001,c:1326055296*3C", false).is_err());
        // non-integer timestamp
        assert!(parse_tagblock("c:noon*00", false).is_err());
    }

    #[test]
    fn parse_validates_checksum_on_request() {
        let good = "c:1000,s:old*5A";
        let bad = "c:1000,s:old*FF";
        assert!(parse_tagblock(good, true).is_ok());
        assert!(parse_tagblock(bad, false).is_ok());
        assert!(parse_tagblock(bad, true).is_err());
    }

    #[test]
    fn encode_round_trip() {
        for tagblock in [
            "c:1509502436,s:rORBCOMM000,t:sometext*4D",
            "c:1577762601537,s:sdr-experiments*37",
            "c:1426032000,s:rORBCOMM109,g:1-2-4372*55",
            "c:1000,s:sta,T:1969-12-31 19.00.01*36",
        ] {
            let fields = parse_tagblock(tagblock, false).unwrap();
            let emitted = encode_tagblock(&fields);
            assert_eq!(parse_tagblock(&emitted, true).unwrap(), fields);
        }
    }

    #[test]
    fn encode_canonical_order() {
        let mut fields = Message::default();
        fields.insert("tagblock_station", "sta");
        fields.insert("tagblock_timestamp", 1000u64);
        fields.insert("tagblock_sentence", 1);
        fields.insert("tagblock_groupsize", 2);
        fields.insert("tagblock_id", 1561);
        let body = encode_tagblock(&fields);
        assert!(body.starts_with("c:1000,s:sta,g:1-2-1561*"), "{body}");
    }

    #[test]
    fn encode_group_requires_all_three() {
        let mut fields = Message::default();
        fields.insert("tagblock_sentence", 1);
        fields.insert("tagblock_groupsize", 2);
        let body = encode_tagblock(&fields);
        assert!(!body.contains("g:"), "{body}");
    }

    #[test]
    fn encode_fractional_timestamp_as_millis() {
        let mut fields = Message::default();
        fields.insert("tagblock_timestamp", 1577762601.537);
        let body = encode_tagblock(&fields);
        assert!(body.starts_with("c:1577762601537*"), "{body}");
    }

    #[test]
    fn test_create_tagblock() {
        assert_eq!(create_tagblock("sta", Some(1.0), false), "c:1000,s:sta*5B");
        assert_eq!(
            create_tagblock("sta", Some(1.0), true),
            "c:1000,s:sta,T:1970-01-01 00.00.01*37"
        );
    }

    #[test]
    fn test_split_tagblock() {
        assert_eq!(split_tagblock("!AIVDM").unwrap(), ("", "!AIVDM"));
        assert_eq!(split_tagblock("\\!AIVDM").unwrap(), ("", "\\!AIVDM"));
        assert_eq!(
            split_tagblock("\\c:1000,s:sta*5B\\!AIVDM").unwrap(),
            ("c:1000,s:sta*5B", "!AIVDM")
        );
        assert_eq!(split_tagblock("NOT A MESSAGE").unwrap(), ("", "NOT A MESSAGE"));
        assert!(split_tagblock("\\c:1000,s:sta*5B!AIVDM").is_err());
    }

    #[test]
    fn test_join_tagblock() {
        assert_eq!(join_tagblock("", ""), "");
        assert_eq!(join_tagblock("", "!AIVDM"), "!AIVDM");
        assert_eq!(
            join_tagblock("c:1000,s:sta*5B", "!AIVDM"),
            "\\c:1000,s:sta*5B\\!AIVDM"
        );
        assert_eq!(
            join_tagblock("\\c:1000,s:sta*5B", "!AIVDM"),
            "\\c:1000,s:sta*5B\\!AIVDM"
        );
    }

    #[test]
    fn test_add_tagblock() {
        assert_eq!(add_tagblock("", "", true).unwrap(), "");
        assert_eq!(
            add_tagblock("c:1000,s:new*5B", "\\c:1000,s:old*5A\\!AIVDM", true).unwrap(),
            "\\c:1000,s:new*5B\\!AIVDM"
        );
        assert_eq!(
            add_tagblock("c:1000,s:new*5B", "\\c:1000,s:old*5A\\!AIVDM", false).unwrap(),
            "\\c:1000,s:old*5A\\!AIVDM"
        );
    }

    #[test]
    fn update_tagblock_merges_station() {
        let mut updates = Message::default();
        updates.insert("tagblock_station", "test");
        let updated = update_tagblock("\\c:1000,s:old*5A\\!AIVDM", &updates).unwrap();
        let (tagblock, nmea) = split_tagblock(&updated).unwrap();
        assert_eq!(nmea, "!AIVDM");
        let fields = parse_tagblock(tagblock, true).unwrap();
        assert_eq!(fields.get_str("tagblock_station"), Some("test"));
        assert_eq!(fields.get_u64("tagblock_timestamp"), Some(1000));
    }

    #[test]
    fn update_tagblock_rejects_malformed_group() {
        let line = "\\g:1-2--001,c:1326055296*3C\\!AIVDM,2,1,3,A,E7`B1:dW7oHth@@@@@@@@@@@@@@6@6R;mMQM@10888Qr8`8888888888,0*65";
        let updates = Message::default();
        assert!(update_tagblock(line, &updates).is_err());
    }

    #[test]
    fn test_safe_tagblock_timestamp() {
        assert_eq!(
            safe_tagblock_timestamp(
                "\\s:rORBCOMM000,q:u,c:1509502436,T:2017-11-01 02.13.56*50\\!AIVDM,1,1,,A,13`el0gP000H=3JN9jb>4?wb0>`<,0*7B"
            ),
            1509502436.0
        );
        // tolerates a missing tagblock terminator
        assert_eq!(
            safe_tagblock_timestamp(
                "\\s:x,q:u,c:1509502436,T:2017-11-01 02.13.56*50!AIVDM,1,1,,A,13`el0gP000H=3JN9jb>4?wb0>`<,0*7B"
            ),
            1509502436.0
        );
        assert_eq!(safe_tagblock_timestamp("\\s:x,c1509502436*50!AIVDM"), 0.0);
        assert_eq!(
            safe_tagblock_timestamp(
                "\\g:1-2-9907,s:rORBCOMM00,c:1327423135*6d\\!AIVDM,2,1,7,B,56:ToV0000008Q@S400nuJ0`Tr1UD4r1<PDpN3T:000004Hl0AVR5B0B@000,0*10"
            ),
            1327423135.0
        );
    }
}
