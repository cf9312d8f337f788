//! Bar stream: OHLCV type, source contract, and the streaming CSV reader.
//!
//! A bar's timestamp is an opaque ordinal identifier; the engine never
//! parses it, it only carries it through to fills, trades and exports.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use crate::logging::{self, v_str};

pub const EXPECTED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Intra-bar price range, high minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Chronological bar feed. `next` returns `None` once exhausted.
pub trait BarSource {
    fn has_next(&mut self) -> bool;
    fn next(&mut self) -> Option<Bar>;
}

/// In-memory source for tests and replay.
pub struct VecBarSource {
    bars: std::vec::IntoIter<Bar>,
    peeked: Option<Bar>,
}

impl VecBarSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars: bars.into_iter(), peeked: None }
    }
}

impl BarSource for VecBarSource {
    fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.bars.next();
        }
        self.peeked.is_some()
    }

    fn next(&mut self) -> Option<Bar> {
        if self.peeked.is_some() {
            return self.peeked.take();
        }
        self.bars.next()
    }
}

pub fn parse_bar_line(line: &str) -> Result<Bar> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return Err(anyhow!("expected 6 columns, got {}", parts.len()));
    }
    let bar = Bar {
        timestamp: parts[0].trim().to_string(),
        open: parts[1].trim().parse()?,
        high: parts[2].trim().parse()?,
        low: parts[3].trim().parse()?,
        close: parts[4].trim().parse()?,
        volume: parts[5].trim().parse()?,
    };
    if bar.low > bar.high
        || bar.open < bar.low
        || bar.open > bar.high
        || bar.close < bar.low
        || bar.close > bar.high
    {
        return Err(anyhow!(
            "price range violated: o={} h={} l={} c={}",
            bar.open,
            bar.high,
            bar.low,
            bar.close
        ));
    }
    Ok(bar)
}

fn is_header_or_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.to_lowercase().starts_with("timestamp,")
}

/// Streaming CSV bar source. Malformed rows are logged and skipped; the
/// stream keeps going until the file ends.
pub struct CsvBarSource {
    lines: Lines<BufReader<File>>,
    pending: Option<Bar>,
}

impl CsvBarSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow!("cannot open bar data {}: {}", path.display(), e))?;
        Ok(Self { lines: BufReader::new(file).lines(), pending: None })
    }

    fn advance(&mut self) -> Option<Bar> {
        for line in self.lines.by_ref() {
            let line = match line {
                Ok(l) => l,
                Err(err) => {
                    logging::warn("bar_read_failed", &[("error", v_str(&err.to_string()))]);
                    continue;
                }
            };
            let trimmed = line.trim();
            if is_header_or_comment(trimmed) {
                continue;
            }
            match parse_bar_line(trimmed) {
                Ok(bar) => return Some(bar),
                Err(err) => {
                    logging::warn("bar_row_skipped", &[("error", v_str(&err.to_string()))]);
                }
            }
        }
        None
    }
}

impl BarSource for CsvBarSource {
    fn has_next(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.advance();
        }
        self.pending.is_some()
    }

    fn next(&mut self) -> Option<Bar> {
        if self.pending.is_some() {
            return self.pending.take();
        }
        self.advance()
    }
}

// ===========================================================================
// Dataset quality tooling
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub bad_rows: u64,
    pub columns: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub rows: u64,
    pub bad_rows: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub ok: bool,
    pub message: String,
}

pub fn analyze_csv(path: &Path, now_ts: u64) -> Result<(DatasetManifest, DataQualityReport)> {
    let hash = file_sha256(path)?;
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut row_count = 0u64;
    let mut bad_rows = 0u64;
    let mut warnings = Vec::new();
    let mut header: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.to_lowercase().starts_with("timestamp,") && header.is_empty() {
            header = trimmed.split(',').map(|s| s.trim().to_string()).collect();
            continue;
        }
        match parse_bar_line(trimmed) {
            Ok(_) => row_count += 1,
            Err(err) => {
                bad_rows += 1;
                warnings.push(format!("bad_row: {}", err));
            }
        }
    }

    if header.is_empty() {
        warnings.push("missing_header".to_string());
    }

    let manifest = DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count,
        bad_rows,
        columns: header,
        warnings: warnings.clone(),
        generated_at_epoch: now_ts,
    };
    let report = DataQualityReport { rows: row_count, bad_rows, warnings };
    Ok((manifest, report))
}

pub fn validate_schema(path: &Path) -> Result<SchemaReport> {
    let header = read_header(path)?;
    let expected: Vec<String> = EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect();
    let ok = header == expected;
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("schema mismatch: got {:?} expected {:?}", header, expected)
    };
    Ok(SchemaReport { columns: header, expected, ok, message })
}

pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.to_lowercase().starts_with("timestamp,") {
            return Ok(trimmed.split(',').map(|s| s.trim().to_string()).collect());
        }
        break;
    }
    Ok(Vec::new())
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
