//! Binary broadcast message (type 8)
//!
//! The application payload after the 16-bit application id is opaque binary
//! carried as lowercase hex. Bodies frequently arrive with a bit length
//! that is not a nybble multiple; the tail bits are discarded on decode.

use crate::bits::BitBuffer;
use crate::errors::Result;
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais8",
        vec![
            Field::uint("id", 6, 8),
            Field::uint("repeat_indicator", 2, 0),
            Field::uint("mmsi", 30, 0),
            Field::uint("spare", 2, 0),
            Field::hex("application_id", 16),
            Field::var_hex("application_data"),
        ],
    )
});

pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let mut bits = BitBuffer::from_nmea(body, pad)?;
    bits.unpack(&FIELDS)
}

pub fn encode(message: &Message) -> Result<(String, u32)> {
    let data_len = message
        .get_str("application_data")
        .map(str::len)
        .unwrap_or(0);
    let mut bits = BitBuffer::new(FIELDS.nbits() + data_len * 4);
    bits.pack(&FIELDS, message)?;
    Ok(bits.to_nmea())
}
