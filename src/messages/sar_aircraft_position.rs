//! Search-and-rescue aircraft position report (type 9)

use super::commstate;
use crate::bits::BitBuffer;
use crate::errors::Result;
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais9",
        vec![
            Field::uint("id", 6, 9),
            Field::uint("repeat_indicator", 2, 0),
            Field::uint("mmsi", 30, 0),
            Field::uint("alt", 12, 4095),
            Field::uint("sog", 10, 1023),
            Field::uint("position_accuracy", 1, 0),
            Field::latlon("x", 28, 181.0),
            Field::latlon("y", 27, 91.0),
            Field::uint10("cog", 12, 360.0),
            Field::uint("timestamp", 6, 60),
            // the single bit between timestamp and the spare block
            Field::uint("alt_sensor", 1, 0),
            Field::uint("spare", 7, 0),
            Field::uint("dte", 1, 0),
            Field::uint("spare2", 3, 0),
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
