//! NMEA checksum computation and validation
//!
//! The NMEA checksum is the XOR of every byte of the sentence body, which is
//! the text between the leading `!` or `\` (exclusive) and the trailing
//! `*` (exclusive). It appears on the wire as two uppercase hex digits.

use crate::errors::{Error, Result};

/// Computes the XOR checksum over the bytes of `sentence`
pub fn checksum(sentence: &str) -> u8 {
    sentence.bytes().fold(0u8, |acc, item| acc ^ item)
}

/// Formats the checksum of `sentence` as two uppercase hex digits
pub fn checksum_str(sentence: &str) -> String {
    format!("{:02X}", checksum(sentence))
}

/// Returns `true` if `sentence` carries a `*HH` checksum matching the XOR of
/// the bytes before the `*`. Leading `!` and `\` characters are excluded
/// from the computation, and the hex digits may be upper- or lower-case.
/// A sentence without `*` is never valid.
pub fn is_checksum_valid(sentence: &str) -> bool {
    let body = sentence.trim_start_matches(['!', '\\']);
    let Some((payload, tail)) = body.split_once('*') else {
        return false;
    };
    if tail.len() < 2 || !tail.is_char_boundary(2) {
        return false;
    }
    let Ok(expected) = u8::from_str_radix(&tail[..2], 16) else {
        return false;
    };
    checksum(payload) == expected
}

/// Like [`is_checksum_valid`], but reports what went wrong: a missing or
/// malformed `*HH` trailer is a framing error, a wrong value a checksum
/// error carrying both sides of the mismatch.
pub fn validate(sentence: &str) -> Result<()> {
    let body = sentence.trim_start_matches(['!', '\\']);
    let malformed = || Error::Framing(format!("missing checksum: {sentence:?}"));
    let (payload, tail) = body.split_once('*').ok_or_else(malformed)?;
    if tail.len() < 2 || !tail.is_char_boundary(2) {
        return Err(malformed());
    }
    let expected = u8::from_str_radix(&tail[..2], 16).map_err(|_| malformed())?;
    let found = checksum(payload);
    if found != expected {
        return Err(Error::Checksum { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        assert_eq!(checksum("test"), 22);
        assert_eq!(checksum("XYZ"), 91);
        assert_eq!(checksum("0"), 48);
        assert_eq!(checksum(""), 0);
    }

    #[test]
    fn test_checksum_str() {
        assert_eq!(checksum_str("test"), "16");
        assert_eq!(checksum_str("XYZ"), "5B");
        assert_eq!(checksum_str("0"), "30");
        assert_eq!(checksum_str(""), "00");
    }

    #[test]
    fn test_is_checksum_valid() {
        for (sentence, expected) in [
            ("", false),
            ("*00", true),
            ("*", false),
            ("4", false),
            ("40", false),
            ("*40", false),
            ("nochecksum", false),
            ("partialchecksum*", false),
            ("partialchecksum*2", false),
            ("!AIVDM,1,1,,B,35MsUdPOh8JwI:0HUwquiIFH21>i,0*09", true),
            ("!AIVDM,11,1,,B,35MsUdPOh8JwI:0HUwquiIFH21>i,0*09", false),
            ("c:1000,s:old*5A", true),
            ("\\c:1000,s:old*5A", true),
        ] {
            assert_eq!(is_checksum_valid(sentence), expected, "{:?}", sentence);
        }
    }

    #[test]
    fn lowercase_hex_accepted() {
        assert!(is_checksum_valid("g:1-2-9907,s:rORBCOMM00,c:1327423135*6d"));
        assert!(is_checksum_valid("\\g:2-2-1561,s:rORBCOMM000,c:1598653784,T:2020-08-28 22.29.44*3a"));
    }

    #[test]
    fn validate_reports_mismatch() {
        assert_eq!(validate("c:1000,s:old*5A"), Ok(()));
        assert_eq!(
            validate("c:1000,s:old*FF"),
            Err(Error::Checksum {
                expected: 0xFF,
                found: 0x5A
            })
        );
        assert!(matches!(validate("c:1000,s:old"), Err(Error::Framing(_))));
    }
}
