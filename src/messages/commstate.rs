//! Comm-state blocks shared by the position report types
//!
//! The trailing 19 bits of types 9 and 18 describe how the transmitter uses
//! its TDMA slots. The variant is selected by the already-decoded
//! `unit_flag` and `commstate_flag` header bits: carrier-sense units send a
//! fixed bit pattern, ITDMA units a slot increment block, and SOTDMA units a
//! sync/timeout pair followed by a sub-block keyed on `slot_timeout`.

use super::flag;
use crate::bits::BitBuffer;
use crate::errors::{Error, Result};
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

/// Total width of the comm-state block
pub const NBITS: usize = 19;

static CS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "commstate_cs",
        vec![Field::bits("commstate", 19, "1100000000000000110")],
    )
});

static ITDMA: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "commstate_itdma",
        vec![
            Field::uint("sync_state", 2, 0),
            Field::uint("slot_increment", 13, 0),
            Field::uint("slots_to_allocate", 3, 0),
            Field::boolean("keep_flag", false),
        ],
    )
});

static SOTDMA: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "commstate_sotdma",
        vec![
            Field::uint("sync_state", 2, 0),
            Field::uint("slot_timeout", 3, 0),
        ],
    )
});

static SOTDMA_TIMEOUT_0: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new("sotdma_timeout_0", vec![Field::uint("slot_offset", 14, 0)])
});

static SOTDMA_TIMEOUT_1: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "sotdma_timeout_1",
        vec![
            Field::uint("utc_hour", 5, 0),
            Field::uint("utc_min", 7, 0),
            Field::uint("utc_spare", 2, 0),
        ],
    )
});

static SOTDMA_TIMEOUT_2_4_6: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "sotdma_timeout_2_4_6",
        vec![Field::uint("slot_number", 14, 0)],
    )
});

static SOTDMA_TIMEOUT_3_5_7: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "sotdma_timeout_3_5_7",
        vec![Field::uint("received_stations", 14, 0)],
    )
});

enum Variant {
    CarrierSense,
    Itdma,
    Sotdma,
}

fn variant(message: &Message) -> Variant {
    if flag(message, "unit_flag") {
        Variant::CarrierSense
    } else if flag(message, "commstate_flag") {
        Variant::Itdma
    } else {
        Variant::Sotdma
    }
}

fn sotdma_timeout_fields(message: &Message) -> Result<&'static Struct> {
    let slot_timeout = message
        .get("slot_timeout")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    match slot_timeout {
        0 => Ok(&SOTDMA_TIMEOUT_0),
        1 => Ok(&SOTDMA_TIMEOUT_1),
        2 | 4 | 6 => Ok(&SOTDMA_TIMEOUT_2_4_6),
        3 | 5 | 7 => Ok(&SOTDMA_TIMEOUT_3_5_7),
        other => Err(Error::UnknownType(format!(
            "AIS18: unknown slot_timeout value {other}"
        ))),
    }
}

/// Decodes the comm-state block at the cursor into `message`
pub fn decode(bits: &mut BitBuffer, message: &mut Message) -> Result<()> {
    match variant(message) {
        Variant::CarrierSense => bits.unpack_into(&CS, message),
        Variant::Itdma => bits.unpack_into(&ITDMA, message),
        Variant::Sotdma => {
            bits.unpack_into(&SOTDMA, message)?;
            let fields = sotdma_timeout_fields(message)?;
            bits.unpack_into(fields, message)
        }
    }
}

/// Encodes the comm-state block for `message` at the cursor
pub fn encode(bits: &mut BitBuffer, message: &Message) -> Result<()> {
    match variant(message) {
        Variant::CarrierSense => bits.pack(&CS, message),
        Variant::Itdma => bits.pack(&ITDMA, message),
        Variant::Sotdma => {
            // resolve the sub-block before touching the buffer so a bad
            // slot_timeout fails without a partial write
            let fields = sotdma_timeout_fields(message)?;
            bits.pack(&SOTDMA, message)?;
            bits.pack(fields, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(message: &Message) -> Message {
        let mut bits = BitBuffer::new(NBITS);
        encode(&mut bits, message).unwrap();
        bits.seek(0);
        let mut decoded = message.clone();
        decode(&mut bits, &mut decoded).unwrap();
        decoded
    }

    #[test]
    fn carrier_sense_fixed_pattern() {
        let mut message = Message::default();
        message.insert("unit_flag", 1);
        let decoded = round_trip(&message);
        assert_eq!(decoded.get_str("commstate"), Some("1100000000000000110"));
    }

    #[test]
    fn itdma_fields() {
        let mut message = Message::default();
        message.insert("commstate_flag", 1);
        message.insert("slot_increment", 4969);
        message.insert("slots_to_allocate", 5);
        message.insert("keep_flag", true);
        let decoded = round_trip(&message);
        assert_eq!(decoded.get_u64("slot_increment"), Some(4969));
        assert_eq!(decoded.get_u64("slots_to_allocate"), Some(5));
        assert_eq!(decoded.get("keep_flag"), Some(&true.into()));
    }

    #[test]
    fn sotdma_timeout_subschemas() {
        for (slot_timeout, field) in [
            (0, "slot_offset"),
            (1, "utc_min"),
            (2, "slot_number"),
            (4, "slot_number"),
            (6, "slot_number"),
            (3, "received_stations"),
            (5, "received_stations"),
            (7, "received_stations"),
        ] {
            let mut message = Message::default();
            message.insert("slot_timeout", slot_timeout);
            message.insert(field, 99);
            let decoded = round_trip(&message);
            assert_eq!(decoded.get_u64(field), Some(99), "slot_timeout {slot_timeout}");
        }
    }

    #[test]
    fn unknown_slot_timeout_is_an_error() {
        let mut message = Message::default();
        message.insert("slot_timeout", 8);
        let mut bits = BitBuffer::new(NBITS);
        let err = encode(&mut bits, &message).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownType("AIS18: unknown slot_timeout value 8".into())
        );
    }
}
