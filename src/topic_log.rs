//! Append-only topic log.
//!
//! One header line, then one line per tick:
//!
//! ```text
//! Time, TopicMessageDictionaries
//! 1687274057.65, {"SystemTime":{"message":{"Unix":1687274057.65,"DeltaTimeSeconds":0.0},
//!     "time":1687274057.65,"delta":0.0}}
//! ```
//!
//! Readers also accept the older layout where each topic maps to a single
//! string `"<json>, <time>, <delta>"`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::message::Payload;

pub const LOG_HEADER: &str = "Time, TopicMessageDictionaries";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("tick at time {time}: {reason}")]
    Record { time: f64, reason: String },

    #[error("failed to encode tick record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What one topic published during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEntry {
    pub message: Payload,
    pub time: f64,
    pub delta: f64,
}

/// Topic name to published entry, in publish order.
pub type TopicEntries = IndexMap<String, LoggedEntry>;

/// Everything published during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub time: f64,
    pub topics: TopicEntries,
}

impl TickRecord {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            topics: TopicEntries::new(),
        }
    }

    /// The record as a log line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, LogError> {
        Ok(format!("{}, {}", self.time, serde_json::to_string(&self.topics)?))
    }
}

/// Writes tick records to a fresh log file, flushing after every line.
#[derive(Debug)]
pub struct TopicLogWriter {
    path: PathBuf,
    file: File,
    records_written: u64,
}

impl TopicLogWriter {
    /// Create the file at `path` and write the header. An existing file is
    /// never overwritten: it is reported as an I/O error instead.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source: io::Error| LogError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_error)?;
        writeln!(file, "{LOG_HEADER}").map_err(io_error)?;
        file.flush().map_err(io_error)?;

        Ok(Self {
            path,
            file,
            records_written: 0,
        })
    }

    pub fn append(&mut self, record: &TickRecord) -> Result<(), LogError> {
        let line = record.to_line()?;
        self.append_line(&line)
    }

    /// Append an already encoded record line.
    pub fn append_line(&mut self, line: &str) -> Result<(), LogError> {
        let written = writeln!(self.file, "{line}").and_then(|()| self.file.flush());
        written.map_err(|source| LogError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.records_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn close(self) -> Result<(), LogError> {
        self.file.sync_all().map_err(|source| LogError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Read a log into its tick times and the raw per-tick topic text.
pub fn load(path: impl AsRef<Path>) -> Result<(Vec<f64>, Vec<String>), LogError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut times = Vec::new();
    let mut contents = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let Some((time, content)) = parse_line(&line, number + 1)? else {
            continue;
        };
        times.push(time);
        contents.push(content.to_string());
    }
    Ok((times, contents))
}

/// Split one log line into time and raw content. Blank lines and the header
/// yield `None`.
pub fn parse_line(line: &str, number: usize) -> Result<Option<(f64, &str)>, LogError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some((time, content)) = line.split_once(',') else {
        return Err(LogError::Parse {
            line: number,
            reason: "missing ',' after the tick time".into(),
        });
    };
    if time.trim() == "Time" {
        return Ok(None);
    }
    let time = time.trim().parse::<f64>().map_err(|e| LogError::Parse {
        line: number,
        reason: format!("invalid tick time '{time}': {e}"),
    })?;
    Ok(Some((time, content.trim())))
}

/// Logged ticks in recorded order.
///
/// Tick times need not be unique: a clock that did not advance between two
/// ticks logs both under the same time, and both are kept.
#[derive(Debug, Default)]
pub struct LogIndex {
    records: Vec<TickRecord>,
}

impl LogIndex {
    /// Entries of the first tick logged at `time`.
    pub fn lookup(&self, time: f64) -> Option<&TopicEntries> {
        self.records
            .iter()
            .find(|record| record.time.to_bits() == time.to_bits())
            .map(|record| &record.topics)
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TickRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse every tick's content, keeping the recorded order.
pub fn index(times: &[f64], contents: &[String]) -> Result<LogIndex, LogError> {
    let records = times
        .iter()
        .zip(contents)
        .map(|(&time, content)| {
            Ok(TickRecord {
                time,
                topics: parse_entries(time, content)?,
            })
        })
        .collect::<Result<_, LogError>>()?;
    Ok(LogIndex { records })
}

fn parse_entries(time: f64, content: &str) -> Result<TopicEntries, LogError> {
    let raw: IndexMap<String, Value> =
        serde_json::from_str(content).map_err(|e| LogError::Record {
            time,
            reason: e.to_string(),
        })?;

    let mut entries = TopicEntries::with_capacity(raw.len());
    for (topic, value) in raw {
        let entry = match value {
            Value::String(composite) => parse_composite(&composite),
            other => serde_json::from_value(other).map_err(|e| e.to_string()),
        }
        .map_err(|reason| LogError::Record {
            time,
            reason: format!("topic '{topic}': {reason}"),
        })?;
        entries.insert(topic, entry);
    }
    Ok(entries)
}

/// Older logs stored each topic as `"<json>, <time>, <delta>"`.
fn parse_composite(composite: &str) -> Result<LoggedEntry, String> {
    let mut fields = composite.rsplitn(3, ',');
    let (Some(delta), Some(time), Some(message)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("expected '<json>, <time>, <delta>', found '{composite}'"));
    };

    let message = match serde_json::from_str(message.trim()).map_err(|e| e.to_string())? {
        Value::Object(payload) => payload,
        _ => return Err("logged message is not a mapping".into()),
    };
    let time = time.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let delta = delta.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok(LoggedEntry {
        message,
        time,
        delta,
    })
}
