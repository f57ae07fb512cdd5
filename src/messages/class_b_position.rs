//! Standard Class B position report (type 18)

use super::commstate;
use crate::bits::BitBuffer;
use crate::errors::Result;
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais18",
        vec![
            Field::uint("id", 6, 18),
            Field::uint("repeat_indicator", 2, 0),
            Field::uint("mmsi", 30, 0),
            Field::uint("spare", 8, 0),
            Field::uint10("sog", 10, 102.3),
            Field::uint("position_accuracy", 1, 0),
            Field::latlon("x", 28, 181.0),
            Field::latlon("y", 27, 91.0),
            Field::uint10("cog", 12, 360.0),
            Field::uint("true_heading", 9, 511),
            Field::uint("timestamp", 6, 60),
            Field::uint("spare2", 2, 0),
            Field::uint("unit_flag", 1, 0),
            Field::uint("display_flag", 1, 0),
            Field::uint("dsc_flag", 1, 0),
            Field::uint("band_flag", 1, 0),
            Field::uint("m22_flag", 1, 0),
            // `assigned_mode` is the canonical name for this bit, even
            // though some decoders call it `mode_flag` on type 18
            Field::boolean("assigned_mode", false),
            Field::boolean("raim", false),
            Field::uint("commstate_flag", 1, 0),
        ],
    )
});

pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let mut bits = BitBuffer::from_nmea(body, pad)?;
    let mut message = bits.unpack(&FIELDS)?;
    commstate::decode(&mut bits, &mut message)?;
    Ok(message)
}

pub fn encode(message: &Message) -> Result<(String, u32)> {
    let mut bits = BitBuffer::new(FIELDS.nbits() + commstate::NBITS);
    bits.pack(&FIELDS, message)?;
    commstate::encode(&mut bits, message)?;
    Ok(bits.to_nmea())
}
