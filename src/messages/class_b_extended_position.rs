//! Extended Class B position report (type 19)

use super::{join_name, split_name};
use crate::bits::BitBuffer;
use crate::errors::Result;
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

// The 20-character vessel name spans two 60-bit fields on the wire; they
// are joined into a single `name` on decode and split back on encode.
static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais19",
        vec![
            Field::uint("id", 6, 19),
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
            Field::uint("spare2", 4, 0),
            Field::ascii6("name_1", 60),
            Field::ascii6("name_2", 60),
            Field::uint("type_and_cargo", 8, 0),
            Field::uint("dim_a", 9, 0),
            Field::uint("dim_b", 9, 0),
            Field::uint("dim_c", 6, 0),
            Field::uint("dim_d", 6, 0),
            Field::uint("fix_type", 4, 0),
            Field::boolean("raim", false),
            Field::uint("dte", 1, 0),
            Field::boolean("assigned_mode", false),
            Field::uint("spare3", 4, 0),
        ],
    )
});

pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let mut bits = BitBuffer::from_nmea(body, pad)?;
    let mut message = bits.unpack(&FIELDS)?;
    join_name(&mut message);
    Ok(message)
}

pub fn encode(message: &Message) -> Result<(String, u32)> {
    let mut bits = BitBuffer::new(FIELDS.nbits());
    bits.pack(&FIELDS, &split_name(message))?;
    Ok(bits.to_nmea())
}
