//! Declarative packing and unpacking of bit-level message fields
//!
//! A message schema is an ordered [`Struct`] of [`Field`] descriptors. Each
//! descriptor knows its name, bit width and value type, and converts between
//! an exact bit span and a JSON-style value. Schemas are compiled once at
//! module initialization and shared read-only; the hot path dispatches on a
//! plain enum rather than through trait objects.

use crate::bits::{ascii6_value, BitBuffer, ASCII6};
use crate::errors::{Error, Result};
use crate::message::Message;
use serde_json::{Map, Value};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A single typed field descriptor.
///
/// Fixed-width descriptors advertise their width; the variable-length kinds
/// report a width of zero and negotiate their span from the remaining buffer
/// at decode time.
#[derive(Debug, Clone)]
pub enum Field {
    /// Unsigned big-endian integer
    Uint {
        name: &'static str,
        nbits: usize,
        default: u64,
    },
    /// Two's-complement signed integer
    Int { name: &'static str, nbits: usize },
    /// Single-bit flag
    Bool { name: &'static str, default: bool },
    /// Unsigned integer scaled by 1/10
    Uint10 {
        name: &'static str,
        nbits: usize,
        default: f64,
    },
    /// Signed integer scaled by 1/600000, rounded to 6 decimals on decode
    LatLon {
        name: &'static str,
        nbits: usize,
        default: f64,
    },
    /// Raw bit string of `'0'`/`'1'` characters, exact width
    Bits {
        name: &'static str,
        nbits: usize,
        default: &'static str,
    },
    /// Hexadecimal string; width must be a multiple of 4
    Hex { name: &'static str, nbits: usize },
    /// Fixed-width 6-bit ASCII; encode zero-pads with `@`, decode keeps
    /// trailing `@` characters
    Ascii6 { name: &'static str, nbits: usize },
    /// 6-bit ASCII over the remaining buffer, truncated to a multiple of 6
    VarAscii6 { name: &'static str },
    /// Hex over the remaining buffer, truncated to a multiple of 4
    VarHex { name: &'static str },
}

impl Field {
    pub const fn uint(name: &'static str, nbits: usize, default: u64) -> Self {
        Self::Uint {
            name,
            nbits,
            default,
        }
    }

    pub const fn int(name: &'static str, nbits: usize) -> Self {
        Self::Int { name, nbits }
    }

    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self::Bool { name, default }
    }

    pub const fn uint10(name: &'static str, nbits: usize, default: f64) -> Self {
        Self::Uint10 {
            name,
            nbits,
            default,
        }
    }

    pub const fn latlon(name: &'static str, nbits: usize, default: f64) -> Self {
        Self::LatLon {
            name,
            nbits,
            default,
        }
    }

    pub const fn bits(name: &'static str, nbits: usize, default: &'static str) -> Self {
        Self::Bits {
            name,
            nbits,
            default,
        }
    }

    pub const fn hex(name: &'static str, nbits: usize) -> Self {
        Self::Hex { name, nbits }
    }

    pub const fn ascii6(name: &'static str, nbits: usize) -> Self {
        Self::Ascii6 { name, nbits }
    }

    pub const fn var_ascii6(name: &'static str) -> Self {
        Self::VarAscii6 { name }
    }

    pub const fn var_hex(name: &'static str) -> Self {
        Self::VarHex { name }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uint { name, .. }
            | Self::Int { name, .. }
            | Self::Bool { name, .. }
            | Self::Uint10 { name, .. }
            | Self::LatLon { name, .. }
            | Self::Bits { name, .. }
            | Self::Hex { name, .. }
            | Self::Ascii6 { name, .. }
            | Self::VarAscii6 { name }
            | Self::VarHex { name } => name,
        }
    }

    /// Fixed bit width; zero for the variable-length kinds
    pub fn nbits(&self) -> usize {
        match self {
            Self::Uint { nbits, .. }
            | Self::Int { nbits, .. }
            | Self::Uint10 { nbits, .. }
            | Self::LatLon { nbits, .. }
            | Self::Bits { nbits, .. }
            | Self::Hex { nbits, .. }
            | Self::Ascii6 { nbits, .. } => *nbits,
            Self::Bool { .. } => 1,
            Self::VarAscii6 { .. } | Self::VarHex { .. } => 0,
        }
    }

    /// The value encoded when the message does not carry this field
    pub fn default_value(&self) -> Value {
        match self {
            Self::Uint { default, .. } => Value::from(*default),
            Self::Int { .. } => Value::from(0i64),
            Self::Bool { default, .. } => Value::from(*default),
            Self::Uint10 { default, .. } | Self::LatLon { default, .. } => Value::from(*default),
            Self::Bits { default, .. } => Value::from(*default),
            Self::Hex { nbits, .. } => Value::from("0".repeat(nbits / 4)),
            Self::Ascii6 { nbits, .. } => Value::from("@".repeat(nbits / 6)),
            Self::VarAscii6 { .. } | Self::VarHex { .. } => Value::from(""),
        }
    }

    fn decode(&self, buf: &mut BitBuffer) -> Result<Value> {
        match *self {
            Self::Uint { name, nbits, .. } => Ok(Value::from(buf.read_uint(name, nbits)?)),
            Self::Int { name, nbits } => Ok(Value::from(buf.read_int(name, nbits)?)),
            Self::Bool { name, .. } => Ok(Value::from(buf.read_uint(name, 1)? != 0)),
            Self::Uint10 { name, nbits, .. } => {
                Ok(Value::from(buf.read_uint(name, nbits)? as f64 / 10.0))
            }
            Self::LatLon { name, nbits, .. } => {
                let raw = buf.read_int(name, nbits)?;
                Ok(Value::from(round6(raw as f64 / 600_000.0)))
            }
            Self::Bits { name, nbits, .. } => {
                let mut out = String::with_capacity(nbits);
                for _ in 0..nbits {
                    out.push(if buf.read_uint(name, 1)? != 0 { '1' } else { '0' });
                }
                Ok(Value::from(out))
            }
            Self::Hex { name, nbits } => decode_hex(buf, name, nbits),
            Self::Ascii6 { name, nbits } => decode_ascii6(buf, name, nbits),
            Self::VarAscii6 { name } => {
                let nbits = buf.remaining() / 6 * 6;
                decode_ascii6(buf, name, nbits)
            }
            Self::VarHex { name } => {
                let nbits = buf.remaining() / 4 * 4;
                decode_hex(buf, name, nbits)
            }
        }
    }

    fn encode(&self, buf: &mut BitBuffer, message: &Message) -> Result<()> {
        let name = self.name();
        let value = match message.get(name) {
            Some(v) => v.clone(),
            None => self.default_value(),
        };
        match *self {
            Self::Uint { nbits, .. } => {
                let v = expect_uint(name, &value)?;
                if nbits < 64 && v >= 1u64 << nbits {
                    return Err(value_error(name, &value, "does not fit field width"));
                }
                buf.write_uint(nbits, v);
            }
            Self::Int { nbits, .. } => {
                let v = expect_int(name, &value)?;
                check_int_range(name, &value, v, nbits)?;
                buf.write_int(nbits, v);
            }
            Self::Bool { .. } => {
                let v = expect_flag(name, &value)?;
                buf.write_uint(1, v as u64);
            }
            Self::Uint10 { nbits, .. } => {
                let v = expect_float(name, &value)?;
                let raw = (v * 10.0).round();
                if raw < 0.0 || (nbits < 64 && raw >= (1u64 << nbits) as f64) {
                    return Err(value_error(name, &value, "does not fit field width"));
                }
                buf.write_uint(nbits, raw as u64);
            }
            Self::LatLon { nbits, .. } => {
                let v = expect_float(name, &value)?;
                let raw = (v * 600_000.0).round() as i64;
                check_int_range(name, &value, raw, nbits)?;
                buf.write_int(nbits, raw);
            }
            Self::Bits { nbits, .. } => {
                let s = expect_str(name, &value)?;
                if s.len() != nbits {
                    return Err(value_error(name, &value, "bit string width mismatch"));
                }
                for c in s.chars() {
                    match c {
                        '0' => buf.write_uint(1, 0),
                        '1' => buf.write_uint(1, 1),
                        _ => return Err(value_error(name, &value, "invalid bit character")),
                    }
                }
            }
            Self::Hex { nbits, .. } => {
                let s = expect_str(name, &value)?;
                if s.len() != nbits / 4 {
                    return Err(value_error(name, &value, "hex string width mismatch"));
                }
                encode_hex(buf, name, s)?;
            }
            Self::Ascii6 { nbits, .. } => {
                let s = expect_str(name, &value)?;
                if s.len() * 6 > nbits {
                    return Err(value_error(name, &value, "string too long for field"));
                }
                encode_ascii6(buf, name, s)?;
                // zero bits are '@', the 6-bit ASCII fill character
                for _ in 0..(nbits - s.len() * 6) {
                    buf.write_uint(1, 0);
                }
            }
            Self::VarAscii6 { .. } => {
                let s = expect_str(name, &value)?;
                encode_ascii6(buf, name, s)?;
            }
            Self::VarHex { .. } => {
                let s = expect_str(name, &value)?;
                encode_hex(buf, name, s)?;
            }
        }
        Ok(())
    }
}

fn decode_ascii6(buf: &mut BitBuffer, name: &'static str, nbits: usize) -> Result<Value> {
    let mut out = String::with_capacity(nbits / 6);
    for _ in 0..nbits / 6 {
        let v = buf.read_uint(name, 6)?;
        out.push(ASCII6[v as usize] as char);
    }
    Ok(Value::from(out))
}

fn encode_ascii6(buf: &mut BitBuffer, name: &'static str, s: &str) -> Result<()> {
    for c in s.chars() {
        let v = ascii6_value(c).ok_or_else(|| {
            Error::FieldValue(format!("invalid ASCII6 character {c:?} in field {name}"))
        })?;
        buf.write_uint(6, v as u64);
    }
    Ok(())
}

fn decode_hex(buf: &mut BitBuffer, name: &'static str, nbits: usize) -> Result<Value> {
    let mut out = String::with_capacity(nbits / 4);
    for _ in 0..nbits / 4 {
        let v = buf.read_uint(name, 4)?;
        out.push(HEX_DIGITS[v as usize] as char);
    }
    Ok(Value::from(out))
}

fn encode_hex(buf: &mut BitBuffer, name: &'static str, s: &str) -> Result<()> {
    for c in s.chars() {
        let v = c.to_digit(16).ok_or_else(|| {
            Error::FieldValue(format!("invalid hexadecimal string {s:?} in field {name}"))
        })?;
        buf.write_uint(4, v as u64);
    }
    Ok(())
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn value_error(name: &str, value: &Value, reason: &str) -> Error {
    Error::FieldValue(format!("invalid value {value} for field {name}: {reason}"))
}

fn expect_uint(name: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| value_error(name, value, "expected unsigned integer"))
}

fn expect_int(name: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| value_error(name, value, "expected integer"))
}

fn expect_float(name: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| value_error(name, value, "expected number"))
}

fn expect_str<'v>(name: &str, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| value_error(name, value, "expected string"))
}

/// Accepts JSON booleans as well as 0/1 integers for flag fields
fn expect_flag(name: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(_) => match value.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(value_error(name, value, "expected boolean")),
        },
        _ => Err(value_error(name, value, "expected boolean")),
    }
}

fn check_int_range(name: &str, value: &Value, v: i64, nbits: usize) -> Result<()> {
    if nbits < 64 {
        let max = 1i64 << (nbits - 1);
        if v >= max || v < -max {
            return Err(value_error(name, value, "does not fit field width"));
        }
    }
    Ok(())
}

/// An ordered, named sequence of field descriptors compiled into a
/// pack/unpack plan with a fixed total bit width.
#[derive(Debug, Clone)]
pub struct Struct {
    name: &'static str,
    fields: Vec<Field>,
    nbits: usize,
    defaults: Map<String, Value>,
}

impl Struct {
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        let nbits = fields.iter().map(Field::nbits).sum();
        let defaults = fields
            .iter()
            .map(|f| (f.name().to_string(), f.default_value()))
            .collect();
        Self {
            name,
            fields,
            nbits,
            defaults,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Sum of the fixed field widths; variable-length fields contribute zero
    pub fn nbits(&self) -> usize {
        self.nbits
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Values encoded for fields absent from the message
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }
}

impl BitBuffer {
    /// Decodes `schema` at the cursor, advancing past its fields, and merges
    /// the decoded values into `message`
    pub fn unpack_into(&mut self, schema: &Struct, message: &mut Message) -> Result<()> {
        for field in schema.fields() {
            let value = field.decode(self)?;
            message.insert(field.name(), value);
        }
        Ok(())
    }

    /// Decodes `schema` at the cursor into a fresh record
    pub fn unpack(&mut self, schema: &Struct) -> Result<Message> {
        let mut message = Message::default();
        self.unpack_into(schema, &mut message)?;
        Ok(message)
    }

    /// Decodes `schema` at an absolute bit offset; the cursor is unchanged
    pub fn unpack_from(&mut self, schema: &Struct, offset: usize) -> Result<Message> {
        let saved = self.pos();
        self.seek(offset);
        let result = self.unpack(schema);
        self.seek(saved);
        result
    }

    /// Encodes `schema` at the cursor, taking values from `message` and
    /// falling back to field defaults
    pub fn pack(&mut self, schema: &Struct, message: &Message) -> Result<()> {
        for field in schema.fields() {
            field.encode(self, message)?;
        }
        Ok(())
    }

    /// Encodes `schema` at an absolute bit offset; the cursor is unchanged
    pub fn pack_into(&mut self, schema: &Struct, offset: usize, message: &Message) -> Result<()> {
        let saved = self.pos();
        self.seek(offset);
        let result = self.pack(schema, message);
        self.seek(saved);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Struct {
        Struct::new(
            "sample",
            vec![
                Field::uint("id", 6, 18),
                Field::int("offset", 8),
                Field::boolean("flag", false),
                Field::uint10("sog", 10, 102.3),
                Field::latlon("x", 28, 181.0),
                Field::bits("raw", 3, "000"),
                Field::hex("app", 8),
                Field::ascii6("name", 18),
            ],
        )
    }

    #[test]
    fn width_is_sum_of_fixed_fields() {
        assert_eq!(sample_schema().nbits(), 6 + 8 + 1 + 10 + 28 + 3 + 8 + 18);
        let var = Struct::new("var", vec![Field::uint("id", 6, 8), Field::var_hex("data")]);
        assert_eq!(var.nbits(), 6);
    }

    #[test]
    fn round_trip_all_kinds() {
        let schema = sample_schema();
        let mut message = Message::default();
        message.insert("id", 18u64);
        message.insert("offset", -5i64);
        message.insert("flag", true);
        message.insert("sog", 12.3);
        message.insert("x", -122.345678);
        message.insert("raw", "101");
        message.insert("app", "f3");
        message.insert("name", "AB ");

        let mut buf = BitBuffer::new(schema.nbits());
        buf.pack(&schema, &message).unwrap();
        buf.seek(0);
        let decoded = buf.unpack(&schema).unwrap();

        assert_eq!(decoded.get_u64("id"), Some(18));
        assert_eq!(decoded.get_i64("offset"), Some(-5));
        assert_eq!(decoded.get("flag"), Some(&Value::from(true)));
        assert_eq!(decoded.get_f64("sog"), Some(12.3));
        assert_eq!(decoded.get_f64("x"), Some(-122.345678));
        assert_eq!(decoded.get_str("raw"), Some("101"));
        assert_eq!(decoded.get_str("app"), Some("f3"));
        // fixed-width ASCII6 keeps the @ fill
        assert_eq!(decoded.get_str("name"), Some("AB "));
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let schema = sample_schema();
        let mut buf = BitBuffer::new(schema.nbits());
        buf.pack(&schema, &Message::default()).unwrap();
        buf.seek(0);
        let decoded = buf.unpack(&schema).unwrap();
        assert_eq!(decoded.get_u64("id"), Some(18));
        assert_eq!(decoded.get_i64("offset"), Some(0));
        assert_eq!(decoded.get_f64("sog"), Some(102.3));
        assert_eq!(decoded.get_f64("x"), Some(181.0));
        assert_eq!(decoded.get_str("app"), Some("00"));
        assert_eq!(decoded.get_str("name"), Some("@@@"));
        assert_eq!(schema.defaults().get("sog"), Some(&Value::from(102.3)));
    }

    #[test]
    fn ascii6_pads_short_values_with_at() {
        let schema = Struct::new("s", vec![Field::ascii6("name", 24)]);
        let mut message = Message::default();
        message.insert("name", "AB");
        let mut buf = BitBuffer::new(24);
        buf.pack(&schema, &message).unwrap();
        buf.seek(0);
        let decoded = buf.unpack(&schema).unwrap();
        assert_eq!(decoded.get_str("name"), Some("AB@@"));
    }

    #[test]
    fn ascii6_rejects_lowercase() {
        let schema = Struct::new("s", vec![Field::ascii6("name", 24)]);
        let mut message = Message::default();
        message.insert("name", "ab");
        let mut buf = BitBuffer::new(24);
        assert!(matches!(
            buf.pack(&schema, &message),
            Err(Error::FieldValue(_))
        ));
    }

    #[test]
    fn uint_overflow_is_field_value_error() {
        let schema = Struct::new("s", vec![Field::uint("id", 6, 0)]);
        let mut message = Message::default();
        message.insert("id", 64u64);
        let mut buf = BitBuffer::new(6);
        assert!(matches!(
            buf.pack(&schema, &message),
            Err(Error::FieldValue(_))
        ));
    }

    #[test]
    fn unpack_past_end_is_truncated() {
        let schema = Struct::new("s", vec![Field::uint("mmsi", 30, 0)]);
        let mut buf = BitBuffer::new(20);
        let err = buf.unpack(&schema).unwrap_err();
        assert!(matches!(err, Error::Truncated { field: "mmsi", .. }));
    }

    #[test]
    fn var_hex_truncates_to_nybbles() {
        let schema = Struct::new("s", vec![Field::uint("id", 6, 8), Field::var_hex("data")]);
        // 6 + 10 bits: 10 % 4 == 2 leftover bits must be discarded
        let mut buf = BitBuffer::new(16);
        buf.write_uint(6, 8);
        buf.write_uint(10, 0x3FF);
        buf.seek(0);
        let decoded = buf.unpack(&schema).unwrap();
        assert_eq!(decoded.get_str("data"), Some("ff"));
    }

    #[test]
    fn var_ascii6_reads_remainder() {
        let schema = Struct::new("s", vec![Field::var_ascii6("text")]);
        let mut message = Message::default();
        message.insert("text", "SOME TEXT");
        let mut buf = BitBuffer::new(9 * 6);
        buf.pack(&schema, &message).unwrap();
        buf.seek(0);
        let decoded = buf.unpack(&schema).unwrap();
        assert_eq!(decoded.get_str("text"), Some("SOME TEXT"));
    }

    #[test]
    fn absolute_offset_overlay() {
        let overlay = Struct::new("overlay", vec![Field::uint("vendor_model", 4, 0)]);
        let mut buf = BitBuffer::new(16);
        buf.write_uint(16, 0b1010_1100_0011_0101);
        buf.seek(3);
        let decoded = buf.unpack_from(&overlay, 4).unwrap();
        assert_eq!(decoded.get_u64("vendor_model"), Some(0b1100));
        // cursor is untouched by the absolute-offset variants
        assert_eq!(buf.pos(), 3);
    }
}
