//! Single-slot binary message (type 25)
//!
//! Carries short text payloads in 6-bit ASCII, optionally addressed to a
//! destination MMSI. The text runs to the end of the slot, so its length is
//! negotiated from the buffer on decode and from the value on encode.
//!
//! Text coding per <http://www.e-navigation.nl/content/text-using-6-bit-ascii-1>

use super::flag;
use crate::bits::BitBuffer;
use crate::errors::Result;
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais25",
        vec![
            Field::uint("id", 6, 25),
            Field::uint("repeat_indicator", 2, 0),
            Field::uint("mmsi", 30, 0),
            Field::uint("addressed", 1, 0),
            Field::uint("use_app_id", 1, 0),
        ],
    )
});

static DESTINATION: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais25_destination",
        vec![Field::uint("dest_mmsi", 30, 0), Field::uint("spare", 2, 0)],
    )
});

static DAC_FI: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais25_dac_fi",
        vec![
            Field::uint("dac", 10, 1),
            Field::uint("fi", 6, 0),
            Field::uint("text_seq", 11, 0),
            Field::var_ascii6("text"),
        ],
    )
});

pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let mut bits = BitBuffer::from_nmea(body, pad)?;
    let mut message = bits.unpack(&FIELDS)?;
    if flag(&message, "addressed") {
        bits.unpack_into(&DESTINATION, &mut message)?;
    }
    bits.unpack_into(&DAC_FI, &mut message)?;
    Ok(message)
}

pub fn encode(message: &Message) -> Result<(String, u32)> {
    let text_chars = message
        .get_str("text")
        .map(|text| text.chars().count())
        .unwrap_or(0);
    let addressed = flag(message, "addressed");
    let mut nbits = FIELDS.nbits() + DAC_FI.nbits() + text_chars * 6;
    if addressed {
        nbits += DESTINATION.nbits();
    }

    let mut bits = BitBuffer::new(nbits);
    bits.pack(&FIELDS, message)?;
    if addressed {
        bits.pack(&DESTINATION, message)?;
    }
    bits.pack(&DAC_FI, message)?;
    Ok(bits.to_nmea())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_broadcast() {
        let mut message = Message::default();
        message.insert("id", 25u64);
        message.insert("mmsi", 123456789u64);
        message.insert("text", "SOME TEXT");

        let (body, pad) = encode(&message).unwrap();
        let decoded = decode(&body, pad).unwrap();
        assert_eq!(decoded.get_u64("id"), Some(25));
        assert_eq!(decoded.get_u64("mmsi"), Some(123456789));
        assert_eq!(decoded.get_str("text"), Some("SOME TEXT"));
        assert_eq!(decoded.get_u64("addressed"), Some(0));
        assert_eq!(decoded.get_u64("dac"), Some(1));
    }

    #[test]
    fn round_trip_addressed() {
        let mut message = Message::default();
        message.insert("id", 25u64);
        message.insert("mmsi", 123456789u64);
        message.insert("addressed", 1);
        message.insert("dest_mmsi", 987654321u64);
        message.insert("text", "SOME TEXT");

        let (body, pad) = encode(&message).unwrap();
        let decoded = decode(&body, pad).unwrap();
        assert_eq!(decoded.get_u64("addressed"), Some(1));
        assert_eq!(decoded.get_u64("dest_mmsi"), Some(987654321));
        assert_eq!(decoded.get_str("text"), Some("SOME TEXT"));
    }

    #[test]
    fn decode_wire_body() {
        let message = decode("I0000027FtlE01000VNJ;0`:h`0", 2).unwrap();
        assert_eq!(message.get_u64("id"), Some(25));
        assert_eq!(message.get_u64("mmsi"), Some(0));
        assert_eq!(message.get_u64("dac"), Some(541));
        assert_eq!(message.get_u64("fi"), Some(27));
        assert_eq!(message.get_u64("text_seq"), Some(1640));
        assert_eq!(message.get_str("text"), Some("*@B@@AL<4VAPU!P"));
    }
}
