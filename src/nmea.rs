//! NMEA sentence envelope and multipart stream handling
//!
//! This layer splits a raw line into its tagblock, armored body and pad,
//! splits and joins concatenated multipart lines, and reassembles multipart
//! messages arriving out of order across a stream under bounded time and
//! line-count windows.

use crate::checksum;
use crate::errors::{Error, Result};
use crate::message::Message;
use crate::tagblock::{parse_tagblock, split_tagblock};
use log::debug;
use nom::bytes::complete::{tag, take, take_until};
use nom::character::complete::digit1;
use nom::combinator::{map_res, opt, verify};
use nom::IResult;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One AIVDM/AIVDO sentence stripped of its tagblock
#[derive(Debug, PartialEq)]
struct Sentence<'a> {
    talker_id: &'a str,
    groupsize: u64,
    sentence_number: u64,
    sequence_id: Option<u64>,
    channel: &'a str,
    body: &'a str,
    pad: u32,
}

fn parse_u64(data: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse)(data)
}

/// Named parser for the comma-separated AIVDM sentence core
fn parse_sentence_fields(data: &str) -> IResult<&str, Sentence> {
    let (data, talker_id) = take(2usize)(data)?;
    let (data, _formatter) = take(3usize)(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, groupsize) = parse_u64(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, sentence_number) = parse_u64(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, sequence_id) = opt(parse_u64)(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, channel) = take_until(",")(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, body) = take_until(",")(data)?;
    let (data, _) = tag(",")(data)?;
    let (data, pad) = verify(map_res(take(1usize), str::parse::<u32>), |pad| *pad < 6)(data)?;
    Ok((
        data,
        Sentence {
            talker_id,
            groupsize,
            sentence_number,
            sequence_id,
            channel,
            body,
            pad,
        },
    ))
}

fn parse_sentence(nmea: &str) -> Result<Sentence> {
    let stripped = nmea.trim_start_matches(['\\', '!']);
    let (_, sentence) = parse_sentence_fields(stripped)
        .map_err(|_| Error::Framing(format!("invalid nmea sentence: {nmea:?}")))?;
    Ok(sentence)
}

/// Expands one sentence into its tagblock fields, armored body and pad.
///
/// Grouping information is normalized into the tagblock map: when the
/// tagblock itself carries a `g:` group triple, that triple wins and its
/// per-session id is renamed `tagblock_group_id`; otherwise the group fields
/// come from the sentence header. The sentence channel and talker id are
/// recorded as `tagblock_channel` and `tagblock_talker_id`.
pub fn expand_nmea(line: &str, validate_checksum: bool) -> Result<(Message, String, u32)> {
    let (tagblock_str, nmea) = split_tagblock(line)?;
    let mut tagblock = parse_tagblock(tagblock_str, validate_checksum)?;

    let nmea = nmea.trim();
    if validate_checksum {
        checksum::validate(nmea)?;
    }
    let sentence = parse_sentence(nmea)?;

    tagblock.insert("tagblock_talker_id", sentence.talker_id);
    let has_group = ["tagblock_sentence", "tagblock_groupsize", "tagblock_id"]
        .iter()
        .all(|key| tagblock.contains_key(key));
    if has_group {
        if let Some(group_id) = tagblock.remove("tagblock_id") {
            tagblock.insert("tagblock_group_id", group_id);
        }
    } else {
        tagblock.insert("tagblock_groupsize", sentence.groupsize);
        tagblock.insert("tagblock_sentence", sentence.sentence_number);
    }
    if let Some(sequence_id) = sentence.sequence_id {
        tagblock.insert("tagblock_id", sequence_id);
    }
    tagblock.insert("tagblock_channel", sentence.channel);

    Ok((tagblock, sentence.body.to_string(), sentence.pad))
}

/// Splits a line that may contain several concatenated sentences back into
/// its parts. The framing pattern is keyed on the first character:
/// `!…`, `\!…` or `\tagblock\!…`, and all parts share one pattern.
pub fn split_multipart(line: &str) -> Result<Vec<&str>> {
    if line.starts_with('!') {
        Ok(split_fragments(line, false))
    } else if line.starts_with("\\!") {
        Ok(split_fragments(line, true))
    } else if line.starts_with('\\') {
        Ok(split_tagblocked_fragments(line))
    } else {
        Err(Error::Framing("no valid AIVDM message detected".into()))
    }
}

/// Fragments of the form `![^!]+`, optionally led by a backslash (`\![^!\]+`)
fn split_fragments(line: &str, backslash: bool) -> Vec<&str> {
    let mut fragments = Vec::new();
    let bytes = line.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let start = match find_fragment_start(bytes, pos, backslash) {
            Some(start) => start,
            None => break,
        };
        let body_start = start + if backslash { 2 } else { 1 };
        let mut end = body_start;
        while end < bytes.len() && bytes[end] != b'!' && (!backslash || bytes[end] != b'\\') {
            end += 1;
        }
        if end > body_start {
            fragments.push(&line[start..end]);
        }
        pos = end.max(start + 1);
    }
    fragments
}

fn find_fragment_start(bytes: &[u8], from: usize, backslash: bool) -> Option<usize> {
    let mut pos = from;
    while pos < bytes.len() {
        if backslash {
            if bytes[pos] == b'\\' && bytes.get(pos + 1) == Some(&b'!') {
                return Some(pos);
            }
        } else if bytes[pos] == b'!' {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Fragments of the form `\tagblock\![^!\]+`
fn split_tagblocked_fragments(line: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let bytes = line.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] != b'\\' {
            pos += 1;
            continue;
        }
        let start = pos;
        // tagblock: at least one non-backslash char up to the closing delimiter
        let mut close = start + 1;
        while close < bytes.len() && bytes[close] != b'\\' {
            close += 1;
        }
        if close >= bytes.len() || close == start + 1 || bytes.get(close + 1) != Some(&b'!') {
            pos = start + 1;
            continue;
        }
        let body_start = close + 2;
        let mut end = body_start;
        while end < bytes.len() && bytes[end] != b'!' && bytes[end] != b'\\' {
            end += 1;
        }
        if end > body_start {
            fragments.push(&line[start..end]);
            pos = end;
        } else {
            pos = start + 1;
        }
    }
    fragments
}

/// Concatenates the lines of a single multipart message in the order given.
/// All lines must start with the same character, either `\` or `!`.
pub fn join_multipart<S: AsRef<str>>(lines: &[S]) -> Result<String> {
    let lines: Vec<&str> = lines.iter().map(|line| line.as_ref()).collect();
    let first = lines.first().and_then(|line| line.chars().next());
    let aligned = matches!(first, Some('\\') | Some('!'))
        && lines.iter().all(|line| line.starts_with(first.unwrap_or('!')));
    if aligned {
        Ok(lines.concat())
    } else {
        Err(Error::Framing(
            "all lines to be joined must start with the same character, either '\\' or '!'".into(),
        ))
    }
}

/// Windows and error handling for [`join_multipart_stream`]
#[derive(Debug, Clone, Copy)]
pub struct MultipartOptions {
    /// Retain an unmatched part until this much time has elapsed
    pub max_time_window: Duration,
    /// Retain an unmatched part until this many lines have been seen
    pub max_message_window: usize,
    /// Pass undecodable lines through unchanged instead of yielding errors
    pub ignore_decode_errors: bool,
}

impl Default for MultipartOptions {
    fn default() -> Self {
        Self {
            max_time_window: Duration::from_millis(500),
            max_message_window: 1000,
            ignore_decode_errors: false,
        }
    }
}

/// Matching key for the parts of one multipart message.
///
/// When a tagblock group is present its per-session id identifies the group
/// on its own. Otherwise parts are matched on the full envelope tuple; the
/// sequence id alone is not unique across stations or channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Session {
        groupsize: i64,
        group_id: i64,
    },
    Envelope {
        groupsize: i64,
        station: Option<String>,
        sequence_id: Option<i64>,
        channel: Option<String>,
        talker_id: Option<String>,
    },
}

#[derive(Debug)]
struct BufferedPart {
    part_num: i64,
    line: String,
    index: usize,
    arrived: Instant,
}

/// Online reassembler for multipart NMEA streams.
///
/// Consumes an iterator of raw lines and yields lines in which complete
/// multipart sets have been concatenated in part-number order. Unmatched
/// parts are passed through unchanged once they age out of the time or
/// line-count window, and whatever remains buffered is flushed at end of
/// input in arrival order.
pub struct JoinMultipartStream<I> {
    lines: I,
    options: MultipartOptions,
    buffer: HashMap<GroupKey, Vec<BufferedPart>>,
    pending: VecDeque<Result<String>>,
    index: usize,
    finished: bool,
}

/// Streams `lines` through the multipart reassembler
pub fn join_multipart_stream<I>(
    lines: I,
    options: MultipartOptions,
) -> JoinMultipartStream<I::IntoIter>
where
    I: IntoIterator<Item = String>,
{
    JoinMultipartStream {
        lines: lines.into_iter(),
        options,
        buffer: HashMap::new(),
        pending: VecDeque::new(),
        index: 0,
        finished: false,
    }
}

/// Like [`join_multipart_stream`], but any line that cannot be decoded is
/// passed through unchanged instead of surfacing an error
pub fn safe_join_multipart_stream<I>(
    lines: I,
    options: MultipartOptions,
) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = String>,
{
    let options = MultipartOptions {
        ignore_decode_errors: true,
        ..options
    };
    join_multipart_stream(lines, options).filter_map(Result::ok)
}

impl<I> JoinMultipartStream<I>
where
    I: Iterator<Item = String>,
{
    fn process(&mut self, raw: String) {
        let index = self.index;
        self.index += 1;
        let line = raw.trim().to_string();

        let tagblock = match expand_nmea(&line, false) {
            Ok((tagblock, _, _)) => tagblock,
            Err(err) => {
                if self.options.ignore_decode_errors {
                    self.pending.push_back(Ok(line));
                } else {
                    self.pending.push_back(Err(err));
                }
                return;
            }
        };

        let groupsize = tagblock.get_i64("tagblock_groupsize").unwrap_or(1);
        if groupsize == 1 {
            self.pending.push_back(Ok(line));
        } else {
            let key = group_key(&tagblock, groupsize);
            let part = BufferedPart {
                part_num: tagblock.get_i64("tagblock_sentence").unwrap_or(0),
                line,
                index,
                arrived: Instant::now(),
            };
            self.file_part(key, part, groupsize);
        }

        self.evict(index);
    }

    fn file_part(&mut self, key: GroupKey, part: BufferedPart, groupsize: i64) {
        let parts = self.buffer.entry(key.clone()).or_default();

        if parts.iter().any(|p| p.part_num == part.part_num) {
            // a still-pending duplicate displaces everything buffered so far
            debug!("duplicate part {} for multipart group", part.part_num);
            for old in parts.drain(..) {
                self.pending.push_back(Ok(old.line));
            }
            parts.push(part);
        } else if is_complete(parts, part.part_num, groupsize) {
            let mut parts = self.buffer.remove(&key).unwrap_or_default();
            parts.push(part);
            parts.sort_by_key(|p| p.part_num);
            let joined = parts.iter().map(|p| p.line.as_str()).collect::<String>();
            self.pending.push_back(Ok(joined));
        } else {
            parts.push(part);
        }
    }

    /// Flushes every group with at least one part beyond either window,
    /// passing its parts through in arrival order
    fn evict(&mut self, index: usize) {
        let index_cut = index as i64 - self.options.max_message_window as i64;
        let time_cut = self.options.max_time_window;
        let expired: Vec<GroupKey> = self
            .buffer
            .iter()
            .filter(|(_, parts)| {
                parts
                    .iter()
                    .any(|p| (p.index as i64) < index_cut || p.arrived.elapsed() > time_cut)
            })
            .map(|(key, _)| key.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        let mut flushed = Vec::new();
        for key in expired {
            if let Some(parts) = self.buffer.remove(&key) {
                flushed.extend(parts);
            }
        }
        flushed.sort_by_key(|p| p.index);
        for part in flushed {
            debug!("flushing unmatched multipart fragment: {}", part.line);
            self.pending.push_back(Ok(part.line));
        }
    }

    fn finish(&mut self) {
        let mut remaining: Vec<BufferedPart> =
            self.buffer.drain().flat_map(|(_, parts)| parts).collect();
        remaining.sort_by_key(|p| p.index);
        for part in remaining {
            self.pending.push_back(Ok(part.line));
        }
    }
}

fn group_key(tagblock: &Message, groupsize: i64) -> GroupKey {
    if let Some(group_id) = tagblock.get_i64("tagblock_group_id") {
        GroupKey::Session {
            groupsize,
            group_id,
        }
    } else {
        GroupKey::Envelope {
            groupsize,
            station: tagblock.get_str("tagblock_station").map(String::from),
            sequence_id: tagblock.get_i64("tagblock_id"),
            channel: tagblock.get_str("tagblock_channel").map(String::from),
            talker_id: tagblock.get_str("tagblock_talker_id").map(String::from),
        }
    }
}

/// True when `parts` plus the new part number cover `1..=groupsize` exactly
fn is_complete(parts: &[BufferedPart], part_num: i64, groupsize: i64) -> bool {
    let mut nums: Vec<i64> = parts.iter().map(|p| p.part_num).collect();
    nums.push(part_num);
    nums.sort_unstable();
    nums.dedup();
    nums.len() as i64 == groupsize && nums.first() == Some(&1) && nums.last() == Some(&groupsize)
}

impl<I> Iterator for JoinMultipartStream<I>
where
    I: Iterator<Item = String>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(line) => self.process(line),
                None => {
                    self.finished = true;
                    self.finish();
                }
            }
        }
    }
}
