//! Specific AIS message types
//!
//! Each submodule owns the field tables and the encode/decode pair for one
//! message type. Dispatch is driven by the first six payload bits (the
//! message id) on decode, and by the `id` field of the message on encode.

use crate::bits::armor_value;
use crate::errors::{Error, Result};
use crate::message::Message;

pub mod binary_broadcast;
pub mod class_b_extended_position;
pub mod class_b_position;
pub mod commstate;
pub mod sar_aircraft_position;
pub mod single_slot_binary;
pub mod static_data_report;

/// Message types with a native codec in this crate
const NATIVE_TYPES: [u64; 6] = [8, 9, 18, 19, 24, 25];

/// Reads the message id from the first armored character of a body. The
/// first 6-bit group is exactly the first character, so no unarmoring of
/// the full body is needed.
pub fn message_type(body: &str) -> Option<u64> {
    body.bytes()
        .next()
        .and_then(|byte| armor_value(byte).ok())
        .map(u64::from)
}

/// Whether the native dispatch table claims this body
pub fn can_decode(body: &str, _pad: u32) -> bool {
    message_type(body).is_some_and(|id| NATIVE_TYPES.contains(&id))
}

/// Whether the native dispatch table can encode this message
pub fn can_encode(message: &Message) -> bool {
    message
        .get_u64("id")
        .is_some_and(|id| NATIVE_TYPES.contains(&id))
}

/// Decodes an armored payload into its message fields
pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let id = message_type(body)
        .ok_or_else(|| Error::UnknownType("AIS: empty message body".into()))?;
    match id {
        8 => binary_broadcast::decode(body, pad),
        9 => sar_aircraft_position::decode(body, pad),
        18 => class_b_position::decode(body, pad),
        19 => class_b_extended_position::decode(body, pad),
        24 => static_data_report::decode(body, pad),
        25 => single_slot_binary::decode(body, pad),
        _ => Err(Error::UnknownType(format!(
            "AIS: unknown message type {id}"
        ))),
    }
}

/// Encodes message fields into an armored payload and pad
pub fn encode(message: &Message) -> Result<(String, u32)> {
    let id = message
        .get_u64("id")
        .ok_or_else(|| Error::UnknownType("AIS: message has no type id".into()))?;
    match id {
        8 => binary_broadcast::encode(message),
        9 => sar_aircraft_position::encode(message),
        18 => class_b_position::encode(message),
        19 => class_b_extended_position::encode(message),
        24 => static_data_report::encode(message),
        25 => single_slot_binary::encode(message),
        _ => Err(Error::UnknownType(format!(
            "AIS: unknown message type {id}"
        ))),
    }
}

/// Reads a 0/1 flag that may arrive as either a boolean or an integer
pub(crate) fn flag(message: &Message, name: &str) -> bool {
    match message.get(name) {
        Some(value) => value.as_bool().unwrap_or_else(|| {
            value.as_i64().map(|v| v != 0).unwrap_or(false)
        }),
        None => false,
    }
}

/// Splits a 20-character `name` value into the `name_1`/`name_2` halves used
/// by the two 60-bit fields on the wire
pub(crate) fn split_name(message: &Message) -> Message {
    let mut msg = message.clone();
    let name = message.get_str("name").unwrap_or_default();
    let first: String = name.chars().take(10).collect();
    let rest: String = name.chars().skip(10).collect();
    msg.insert("name_1", first);
    msg.insert("name_2", rest);
    msg.remove("name");
    msg
}

/// Inverse of [`split_name`]: joins the decoded halves into `name`
pub(crate) fn join_name(message: &mut Message) {
    let first = message
        .remove("name_1")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    let rest = message
        .remove("name_2")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    message.insert("name", format!("{first}{rest}"));
}
