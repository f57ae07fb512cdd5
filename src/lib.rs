//! Encode and decode AIS messages in AIVDM/AIVDO NMEA format.
//!
//! The crate is organized in layers: [`bits`] and [`transcode`] implement
//! the declarative bit-field codec, [`tagblock`] and [`nmea`] handle the
//! NMEA envelope including multipart stream reassembly, [`messages`] holds
//! the per-type field tables, and [`aivdm`] ties them together behind
//! [`Aivdm`]. Decoded messages are flat string-keyed records ([`Message`])
//! that serialize directly to JSON.

pub mod aivdm;
pub mod bits;
pub mod checksum;
pub mod errors;
pub mod message;
pub mod messages;
pub mod nmea;
pub mod tagblock;
pub mod transcode;

pub use aivdm::{Aivdm, PayloadDecoder};
pub use errors::{Error, Result};
pub use message::Message;

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MESSAGES: [&str; 6] = [
        "!AIVDM,1,1,,A,B>cSnNP00FVur7UaC7WQ3wS1jCJJ,0*73",
        "!AIVDM,1,1,,B,H>cSnNP@4eEL544000000000000,0*3E",
        "!AIVDM,1,1,,B,H>cSnNTU7B=40058qpmjhh000004,0*31",
        "!AIVDM,1,1,,A,B6:hQDh0029Pt<4TAS003h6TSP00,0*26",
        "!AIVDM,1,1,,B,B5O3hLP00H`fAd4naG6E3wR5oP06,0*24",
        "\\c:1577762601537,s:sdr-experiments*37\\!AIVDM,1,1,,A,B>cSnNP00FVur7UaC7WQ3wS1jCJJ,0*73",
    ];

    #[test]
    fn it_works() {
        let decoder = Aivdm::new();
        for line in TEST_MESSAGES.iter() {
            let result = decoder.decode(line);
            assert!(result.is_ok(), "{line}: {:?}", result);
        }
    }
}
