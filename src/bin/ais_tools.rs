//! Command-line frontend: decode/encode AIS streams, manage tagblocks,
//! reassemble multipart messages and run the built-in micro-benchmarks.
//!
//! All stream subcommands read one message per line from stdin and write
//! one message per line to stdout.

use ais_tools::message::Message;
use ais_tools::nmea::{safe_join_multipart_stream, MultipartOptions};
use ais_tools::tagblock;
use ais_tools::Aivdm;
use clap::{Parser, Subcommand};
use log::warn;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(version, about = "Tools for encoding and decoding AIS messages")]
struct Opt {
    /// Verbosity of debug messages
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode NMEA lines from stdin to JSON, one message per line.
    /// Lines that cannot be decoded come out with an `error` field.
    Decode {
        /// Validate NMEA and tagblock checksums
        #[arg(long)]
        validate_checksum: bool,
    },
    /// Encode JSON messages from stdin to NMEA lines. Messages that cannot
    /// be encoded come out as JSON with an `error` field.
    Encode,
    /// Prepend a fresh tagblock with station and current timestamp to each
    /// NMEA line
    AddTagblock {
        /// Identifier for this receiving station, useful for filtering when
        /// feeds from multiple receivers are merged
        #[arg(short, long, default_value = "ais-tools")]
        station: String,
        /// Skip the human-readable T: timestamp field
        #[arg(long)]
        no_tagblock_t: bool,
    },
    /// Merge fields into the existing tagblock of each NMEA line. Lines
    /// whose tagblock cannot be parsed pass through unchanged.
    UpdateTagblock {
        #[arg(short, long)]
        station: Option<String>,
        #[arg(short, long)]
        destination: Option<String>,
        #[arg(short, long)]
        text: Option<String>,
    },
    /// Match up multipart NMEA messages that may arrive out of order
    JoinMultipart {
        /// Retain an unmatched message part until this many milliseconds
        /// have elapsed since it was buffered
        #[arg(short = 't', long, default_value_t = 500)]
        max_time: u64,
        /// Retain an unmatched message part until this many lines have been
        /// seen after it was buffered
        #[arg(short = 'c', long, default_value_t = 1000)]
        max_count: usize,
    },
    /// Run fixed micro-benchmarks and print a timing table
    Benchmark {
        /// Iterations per benchmark
        #[arg(short = 'n', long, default_value_t = 100_000)]
        iterations: u64,
    },
}

fn main() {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("ais_tools")
        .verbosity(opt.verbose as usize)
        .init()
        .expect("failed to initialize logging");

    let result = match opt.command {
        Command::Decode { validate_checksum } => decode(validate_checksum),
        Command::Encode => encode(),
        Command::AddTagblock {
            station,
            no_tagblock_t,
        } => add_tagblock(&station, !no_tagblock_t),
        Command::UpdateTagblock {
            station,
            destination,
            text,
        } => update_tagblock(station, destination, text),
        Command::JoinMultipart {
            max_time,
            max_count,
        } => join_multipart(max_time, max_count),
        Command::Benchmark { iterations } => benchmark(iterations),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn input_lines() -> impl Iterator<Item = String> {
    io::stdin()
        .lock()
        .lines()
        .map_while(|line| line.ok())
}

fn decode(validate_checksum: bool) -> io::Result<()> {
    let decoder = Aivdm::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in input_lines() {
        let message = match decoder.decode_opts(&line, true, validate_checksum) {
            Ok(message) => message,
            Err(err) => {
                let mut message = Message::from(line.as_str());
                message.insert("error", err.to_string());
                message
            }
        };
        writeln!(out, "{}", serde_json::to_string(&message)?)?;
    }
    Ok(())
}

fn encode() -> io::Result<()> {
    let decoder = Aivdm::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in input_lines() {
        if line.trim().is_empty() {
            continue;
        }
        let message = decoder.safe_encode(&Message::from(line.as_str()));
        if message.get_str("error").is_some() {
            writeln!(out, "{}", serde_json::to_string(&message)?)?;
        } else {
            writeln!(out, "{}", message.get_str("nmea").unwrap_or_default())?;
        }
    }
    Ok(())
}

fn add_tagblock(station: &str, add_tagblock_t: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in input_lines() {
        let block = tagblock::create_tagblock(station, None, add_tagblock_t);
        match tagblock::add_tagblock(&block, line.trim(), true) {
            Ok(tagged) => writeln!(out, "{tagged}")?,
            Err(err) => {
                warn!("passing line through unchanged: {err}");
                writeln!(out, "{}", line.trim())?;
            }
        }
    }
    Ok(())
}

fn update_tagblock(
    station: Option<String>,
    destination: Option<String>,
    text: Option<String>,
) -> io::Result<()> {
    let mut updates = Message::default();
    if let Some(station) = station {
        updates.insert("tagblock_station", station);
    }
    if let Some(destination) = destination {
        updates.insert("tagblock_destination", destination);
    }
    if let Some(text) = text {
        updates.insert("tagblock_text", text);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in input_lines() {
        match tagblock::update_tagblock(line.trim(), &updates) {
            Ok(updated) => writeln!(out, "{updated}")?,
            Err(err) => {
                warn!("passing line through unchanged: {err}");
                writeln!(out, "{}", line.trim())?;
            }
        }
    }
    Ok(())
}

fn join_multipart(max_time: u64, max_count: usize) -> io::Result<()> {
    let options = MultipartOptions {
        max_time_window: Duration::from_millis(max_time),
        max_message_window: max_count,
        ignore_decode_errors: true,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in safe_join_multipart_stream(input_lines(), options) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

const BENCH_TYPE_18: &str = "!AIVDM,1,1,,A,B>cSnNP00FVur7UaC7WQ3wS1jCJJ,0*73";
const BENCH_TYPE_24: &str = "!AIVDM,1,1,,B,H>cSnNP@4eEL544000000000000,0*3E";
const BENCH_TYPE_25: &str = "!AIVDM,1,1,,B,I0000027FtlE01000VNJ;0`:h`0,2*4A";
const BENCH_CHECKSUM: &str = "AIVDM,1,1,,A,B>cSnNP00FVur7UaC7WQ3wS1jCJJ,0";

fn benchmark(iterations: u64) -> io::Result<()> {
    let decoder = Aivdm::new();
    let decoded_18 = decoder.safe_decode(BENCH_TYPE_18);
    let decoded_24 = decoder.safe_decode(BENCH_TYPE_24);

    let benches: Vec<(&str, Box<dyn Fn() + '_>, u64)> = vec![
        (
            "decode type 18",
            Box::new(|| {
                decoder.safe_decode(BENCH_TYPE_18);
            }),
            iterations,
        ),
        (
            "decode type 24",
            Box::new(|| {
                decoder.safe_decode(BENCH_TYPE_24);
            }),
            iterations,
        ),
        (
            "decode type 25",
            Box::new(|| {
                decoder.safe_decode(BENCH_TYPE_25);
            }),
            iterations,
        ),
        (
            "encode type 18",
            Box::new(|| {
                decoder.safe_encode(&decoded_18);
            }),
            iterations,
        ),
        (
            "encode type 24",
            Box::new(|| {
                decoder.safe_encode(&decoded_24);
            }),
            iterations,
        ),
        (
            "checksum",
            Box::new(|| {
                ais_tools::checksum::checksum_str(BENCH_CHECKSUM);
            }),
            iterations * 10,
        ),
    ];

    println!(
        "{:<22}{:>12}{:>12}{:>14}",
        "Benchmark", "Iterations", "Time", "Ops/sec"
    );
    for (name, bench, n) in benches {
        let start = Instant::now();
        for _ in 0..n {
            bench();
        }
        let elapsed = start.elapsed().as_secs_f64();
        println!(
            "{:<22}{:>12}{:>11.3}s{:>14.0}",
            name,
            n,
            elapsed,
            n as f64 / elapsed
        );
    }
    Ok(())
}
