use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("I/O error reading trace: {0}")]
    Io(#[from] std::io::Error),
}

/// One occurrence in a replayable trace, counted once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub relative_time_sec: u64,
}

impl TraceEvent {
    pub fn at(relative_time_sec: u64) -> Self {
        Self { relative_time_sec }
    }
}

/// A raw input line: `time_sec category`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub time_sec: u64,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceRow {
    pub time_sec: u64,
    pub relative_time_sec: u64,
    pub interarrival_sec: u64,
}

/// All events of one category, sorted and rebased to the first timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTrace {
    pub category: String,
    pub rows: Vec<TraceRow>,
}

impl CategoryTrace {
    pub fn prepare(category: impl Into<String>, mut times: Vec<u64>) -> Self {
        times.sort();
        let first = times.first().copied().unwrap_or(0);
        let mut prev = first;
        let rows = times
            .into_iter()
            .map(|time_sec| {
                let row = TraceRow {
                    time_sec,
                    relative_time_sec: time_sec - first,
                    interarrival_sec: time_sec - prev,
                };
                prev = time_sec;
                row
            })
            .collect();
        Self {
            category: category.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.rows.iter().map(|r| TraceEvent::at(r.relative_time_sec)).collect()
    }

    /// Relative time of the last event, i.e. how far the simulation runs.
    pub fn span_sec(&self) -> u64 {
        self.rows.last().map(|r| r.relative_time_sec).unwrap_or(0)
    }
}

pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        let mut fields = line.split_whitespace();
        let Some(time) = fields.next() else {
            continue;
        };
        let category = fields.next().ok_or_else(|| TraceError::Malformed {
            line: lineno,
            reason: "expected 'time_sec category'".to_string(),
        })?;
        if fields.next().is_some() {
            return Err(TraceError::Malformed {
                line: lineno,
                reason: "too many fields".to_string(),
            });
        }
        let time_sec = time.parse::<u64>().map_err(|_| TraceError::Malformed {
            line: lineno,
            reason: format!("'{time}' is not a non-negative integer timestamp"),
        })?;
        records.push(TraceRecord {
            time_sec,
            category: category.to_string(),
        });
    }
    Ok(records)
}

/// Splits records by category, keyed in sorted category order.
pub fn group_by_category(records: Vec<TraceRecord>) -> BTreeMap<String, Vec<u64>> {
    let mut groups: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for record in records {
        groups.entry(record.category).or_default().push(record.time_sec);
    }
    groups
}

pub fn prepare_categories(records: Vec<TraceRecord>) -> Vec<CategoryTrace> {
    group_by_category(records)
        .into_iter()
        .map(|(category, times)| CategoryTrace::prepare(category, times))
        .collect()
}

pub fn load_categories(path: &Path) -> Result<Vec<CategoryTrace>, TraceError> {
    let file = std::fs::File::open(path)?;
    let records = parse_records(std::io::BufReader::new(file))?;
    Ok(prepare_categories(records))
}
