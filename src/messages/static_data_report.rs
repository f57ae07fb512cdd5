//! Static data report (type 24)
//!
//! Part A carries the vessel name; part B carries static details. Two
//! regions of part B are read twice: the 42-bit vendor id doubles as the
//! ITU-R M.1371-4 vendor/model/serial split, and for auxiliary craft
//! (MMSI 98xxxxxxx) the dimension bits double as the mothership MMSI.
//! The overlays are absolute-offset reads over the same buffer.

use super::{join_name, split_name};
use crate::bits::BitBuffer;
use crate::errors::{Error, Result};
use crate::message::Message;
use crate::transcode::{Field, Struct};
use std::sync::LazyLock;

static FIELDS: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais24",
        vec![
            Field::uint("id", 6, 24),
            Field::uint("repeat_indicator", 2, 0),
            Field::uint("mmsi", 30, 0),
            Field::uint("part_num", 2, 0),
        ],
    )
});

static PART_A: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais24_part_a",
        vec![Field::ascii6("name_1", 60), Field::ascii6("name_2", 60)],
    )
});

static PART_B: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais24_part_b",
        vec![
            Field::uint("type_and_cargo", 8, 0),
            Field::ascii6("vendor_id", 42),
            Field::ascii6("callsign", 42),
            Field::uint("dim_a", 9, 0),
            Field::uint("dim_b", 9, 0),
            Field::uint("dim_c", 6, 0),
            Field::uint("dim_d", 6, 0),
            Field::uint("fix_type", 4, 0),
            Field::uint("spare", 2, 0),
        ],
    )
});

/// ITU-R M.1371-4 reading of the vendor id region at bits [48, 92)
static VENDORID_1371_4: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais24_vendorid_1371_4",
        vec![
            Field::ascii6("vendor_id_1371_4", 18),
            Field::uint("vendor_model", 4, 0),
            Field::uint("vendor_serial", 20, 0),
        ],
    )
});

/// Auxiliary-craft reading of the dimension region at bits [132, 162)
static MOTHERSHIP: LazyLock<Struct> = LazyLock::new(|| {
    Struct::new(
        "ais24_mothership",
        vec![Field::uint("mothership_mmsi", 30, 0)],
    )
});

const VENDORID_OFFSET: usize = 48;
const MOTHERSHIP_OFFSET: usize = 132;

fn is_auxiliary_craft(message: &Message) -> bool {
    message.get_u64("mmsi").unwrap_or(0) / 10_000_000 == 98
}

pub fn decode(body: &str, pad: u32) -> Result<Message> {
    let mut bits = BitBuffer::from_nmea(body, pad)?;
    let mut message = bits.unpack(&FIELDS)?;
    match message.get_u64("part_num") {
        Some(0) => {
            bits.unpack_into(&PART_A, &mut message)?;
            join_name(&mut message);
        }
        Some(1) => {
            bits.unpack_into(&PART_B, &mut message)?;
            let vendor = bits.unpack_from(&VENDORID_1371_4, VENDORID_OFFSET)?;
            message.extend(vendor);
            if is_auxiliary_craft(&message) {
                let mothership = bits.unpack_from(&MOTHERSHIP, MOTHERSHIP_OFFSET)?;
                message.extend(mothership);
            }
        }
        other => {
            return Err(Error::UnknownType(format!(
                "AIS24: unknown part number {}",
                other.map_or_else(|| "?".into(), |v| v.to_string())
            )))
        }
    }
    Ok(message)
}

pub fn encode(message: &Message) -> Result<(String, u32)> {
    match message.get_u64("part_num").unwrap_or(0) {
        0 => {
            let mut bits = BitBuffer::new(FIELDS.nbits() + PART_A.nbits());
            let msg = split_name(message);
            bits.pack(&FIELDS, &msg)?;
            bits.pack(&PART_A, &msg)?;
            Ok(bits.to_nmea())
        }
        1 => {
            let mut bits = BitBuffer::new(FIELDS.nbits() + PART_B.nbits());
            bits.pack(&FIELDS, message)?;
            bits.pack(&PART_B, message)?;
            if message.contains_key("vendor_id_1371_4") {
                bits.pack_into(&VENDORID_1371_4, VENDORID_OFFSET, message)?;
            }
            if message.contains_key("mothership_mmsi") {
                bits.pack_into(&MOTHERSHIP, MOTHERSHIP_OFFSET, message)?;
            }
            Ok(bits.to_nmea())
        }
        other => Err(Error::UnknownType(format!(
            "AIS24: unknown part number {other}"
        ))),
    }
}
