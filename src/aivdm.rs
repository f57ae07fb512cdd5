//! High-level AIVDM decode/encode facade
//!
//! Combines the envelope, tagblock and payload layers: a raw line (possibly
//! a concatenated multipart set) goes in, a flat [`Message`] comes out, and
//! the reverse for encoding. An optional fallback payload decoder can be
//! injected for message types the native table does not claim.

use crate::checksum::checksum_str;
use crate::errors::{Error, Result};
use crate::message::Message;
use crate::messages;
use crate::nmea::{expand_nmea, split_multipart};
use log::debug;

/// External decoder consulted for payloads the native table cannot claim
pub trait PayloadDecoder {
    /// Whether this decoder claims the given body
    fn can_decode(&self, body: &str, pad: u32) -> bool;
    /// Decodes the payload into message fields
    fn decode_payload(&self, body: &str, pad: u32) -> Result<Message>;
}

/// Decoder/encoder for AIVDM/AIVDO lines
#[derive(Default)]
pub struct Aivdm {
    fallback: Option<Box<dyn PayloadDecoder>>,
}

impl Aivdm {
    pub fn new() -> Self {
        Self { fallback: None }
    }

    /// Creates a facade that consults `fallback` for message types outside
    /// the native dispatch table
    pub fn with_fallback(fallback: Box<dyn PayloadDecoder>) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    /// Decodes a single line with default options: payload errors propagate
    /// and checksums are not validated
    pub fn decode(&self, line: &str) -> Result<Message> {
        self.decode_opts(line, false, false)
    }

    /// Decodes a single line, which may be a concatenated multipart set.
    ///
    /// With `safe_payload`, a payload that fails to decode attaches its
    /// error text to the returned message instead of failing the call;
    /// envelope errors still propagate.
    pub fn decode_opts(
        &self,
        line: &str,
        safe_payload: bool,
        validate_checksum: bool,
    ) -> Result<Message> {
        let line = line.trim();
        let mut message = Message::default();
        message.insert("nmea", line);

        let fragments = split_multipart(line)?;
        let mut parts = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            parts.push(expand_nmea(fragment, validate_checksum)?);
        }

        parts.sort_by_key(|(tagblock, _, _)| tagblock.get_i64("tagblock_sentence").unwrap_or(0));
        let pad = parts.last().map(|(_, _, pad)| *pad).unwrap_or(0);
        let body: String = parts
            .iter()
            .map(|(_, body, _)| body.as_str())
            .collect();

        // merge tagblocks, letting fields from earlier parts win
        let mut tagblock = Message::default();
        for (part_tagblock, _, _) in parts.iter().rev() {
            tagblock.extend(part_tagblock.clone());
        }

        let groupsize = tagblock.get_u64("tagblock_groupsize").unwrap_or(1);
        if groupsize as usize != parts.len() {
            return Err(Error::Grouping {
                expected: groupsize,
                found: parts.len(),
            });
        }

        message.extend(tagblock);
        match self.decode_payload(&body, pad) {
            Ok(payload) => message.extend(payload),
            Err(err) if safe_payload => {
                debug!("payload decode failed, keeping envelope: {err}");
                message.insert("error", err.to_string());
            }
            Err(err) => return Err(err),
        }
        Ok(message)
    }

    /// Decodes an armored payload, trying the native table first and the
    /// injected fallback second
    pub fn decode_payload(&self, body: &str, pad: u32) -> Result<Message> {
        if !messages::can_decode(body, pad) {
            if let Some(fallback) = &self.fallback {
                if fallback.can_decode(body, pad) {
                    return fallback.decode_payload(body, pad);
                }
            }
        }
        messages::decode(body, pad)
    }

    /// Like [`Aivdm::decode`], but any failure is captured into the `error`
    /// field of the returned message instead of propagating
    pub fn safe_decode(&self, line: &str) -> Message {
        match self.decode_opts(line, true, false) {
            Ok(message) => message,
            Err(err) => {
                let mut message = Message::default();
                message.insert("nmea", line.trim());
                message.insert("error", err.to_string());
                message
            }
        }
    }

    /// Encodes message fields as a single AIVDM sentence with checksum.
    /// No tagblock is added here.
    pub fn encode(&self, message: &Message) -> Result<String> {
        let (body, pad) = messages::encode(message)?;
        let sentence = format!("AIVDM,1,1,,A,{body},{pad}");
        Ok(format!("!{sentence}*{}", checksum_str(&sentence)))
    }

    /// Like [`Aivdm::encode`], but failures are captured into the `error`
    /// field of the returned message; on success the sentence is stored
    /// under `nmea`
    pub fn safe_encode(&self, message: &Message) -> Message {
        let mut out = message.clone();
        match self.encode(message) {
            Ok(nmea) => out.insert("nmea", nmea),
            Err(err) => out.insert("error", err.to_string()),
        }
        out
    }

    /// Maps [`Aivdm::safe_decode`] over a stream of lines
    pub fn decode_stream<'a, I>(&'a self, lines: I) -> impl Iterator<Item = Message> + 'a
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: 'a,
    {
        lines.into_iter().map(move |line| self.safe_decode(&line))
    }
}
