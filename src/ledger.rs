//! Transaction Ledger - append-only text log of simulated purchases
//!
//! One line per purchase:
//!
//! ```text
//! Date: 2024-05-01 12:00:00, NFT: Cosmic Cat, Price: 0.5 ETH, Buyer: alice, Seller: bob
//! ```
//!
//! In [`LineFormat::Escaped`] (the default) user-supplied values have `%`,
//! `,`, `:`, CR and LF percent-encoded, so a value can never contain the
//! `", "` or `": "` separators and every line parses back to the fields that
//! were written. [`LineFormat::Legacy`] writes values verbatim. A legacy value
//! containing a separator desynchronizes its line, and the reader skips it.

use chrono::{Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

pub const ITEM_SENTINEL: &str = "Unknown NFT";
pub const PRICE_SENTINEL: &str = "0";
pub const BUYER_SENTINEL: &str = "Unknown Buyer";
pub const SELLER_SENTINEL: &str = "Unknown Seller";

pub const CURRENCY: &str = "ETH";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const LABEL_DATE: &str = "Date";
pub const LABEL_NFT: &str = "NFT";
pub const LABEL_PRICE: &str = "Price";
pub const LABEL_BUYER: &str = "Buyer";
pub const LABEL_SELLER: &str = "Seller";

const LABELS: [&str; 5] = [LABEL_DATE, LABEL_NFT, LABEL_PRICE, LABEL_BUYER, LABEL_SELLER];

const FIELD_SEPARATOR: &str = ", ";
const LABEL_SEPARATOR: &str = ": ";

const ESCAPES: [(char, &str); 5] = [
    ('%', "%25"),
    (',', "%2C"),
    (':', "%3A"),
    ('\n', "%0A"),
    ('\r', "%0D"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    #[default]
    Escaped,
    Legacy,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Ledger is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Why a single ledger line could not be read back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 5 fields, found {found}")]
    FieldCount { found: usize },

    #[error("field {chunk:?} has no label separator")]
    MissingSeparator { chunk: String },

    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    #[error("label {0:?} appears twice")]
    DuplicateLabel(String),

    #[error("label {0:?} is missing")]
    MissingLabel(&'static str),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match ESCAPES.iter().find(|(ch, _)| *ch == c) {
            Some((_, code)) => out.push_str(code),
            None => out.push(c),
        }
    }
    out
}

/// Decodes exactly the escapes [`escape_value`] produces; any other `%` is literal.
fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ESCAPES.iter().find(|(_, code)| tail.starts_with(code)) {
            Some((ch, code)) => {
                out.push(*ch);
                rest = &tail[code.len()..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// The four caller-supplied fields of a purchase, defaults already applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub item_name: String,
    pub price: String,
    pub buyer: String,
    pub seller: String,
}

impl Default for Purchase {
    fn default() -> Self {
        Self {
            item_name: ITEM_SENTINEL.to_string(),
            price: PRICE_SENTINEL.to_string(),
            buyer: BUYER_SENTINEL.to_string(),
            seller: SELLER_SENTINEL.to_string(),
        }
    }
}

/// One recorded purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub timestamp: NaiveDateTime,
    pub item_name: String,
    /// Verbatim price text, without the currency unit
    pub price: String,
    pub buyer: String,
    pub seller: String,
}

impl TransactionRecord {
    pub fn new(timestamp: NaiveDateTime, purchase: Purchase) -> Self {
        Self {
            timestamp,
            item_name: purchase.item_name,
            price: purchase.price,
            buyer: purchase.buyer,
            seller: purchase.seller,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Canonical ledger line, including the trailing line break
    pub fn to_line(&self, format: LineFormat) -> String {
        let enc = |v: &str| match format {
            LineFormat::Escaped => escape_value(v),
            LineFormat::Legacy => v.to_string(),
        };
        format!(
            "{LABEL_DATE}: {}, {LABEL_NFT}: {}, {LABEL_PRICE}: {} {CURRENCY}, {LABEL_BUYER}: {}, {LABEL_SELLER}: {}\n",
            self.formatted_timestamp(),
            enc(&self.item_name),
            enc(&self.price),
            enc(&self.buyer),
            enc(&self.seller),
        )
    }

    /// Typed view of a parsed line. The price loses its currency suffix.
    pub fn from_entry(entry: &LedgerEntry) -> Result<Self, ParseError> {
        let field = |label: &'static str| {
            entry.get(label).map(str::to_string).ok_or(ParseError::MissingLabel(label))
        };
        let date = field(LABEL_DATE)?;
        let timestamp = NaiveDateTime::parse_from_str(&date, TIMESTAMP_FORMAT)
            .map_err(|_| ParseError::InvalidTimestamp(date.clone()))?;
        let price = field(LABEL_PRICE)?;
        // Written as `{price} ETH`; a trimmed legacy empty price reads as `ETH`
        let price = price
            .strip_suffix(CURRENCY)
            .map(|p| p.strip_suffix(' ').unwrap_or(p).to_string())
            .unwrap_or(price);

        Ok(Self {
            timestamp,
            item_name: field(LABEL_NFT)?,
            price,
            buyer: field(LABEL_BUYER)?,
            seller: field(LABEL_SELLER)?,
        })
    }
}

/// A parsed ledger line: label -> value, exactly the five ledger labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerEntry(BTreeMap<String, String>);

impl LedgerEntry {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split one ledger line into its labelled fields.
///
/// Only the line terminator is stripped, so an empty last value keeps its
/// `": "`. Escaped values are decoded verbatim; legacy values are trimmed.
pub fn parse_line(line: &str, format: LineFormat) -> Result<LedgerEntry, ParseError> {
    let chunks: Vec<&str> = line
        .trim_end_matches(['\r', '\n'])
        .split(FIELD_SEPARATOR)
        .collect();
    if chunks.len() != LABELS.len() {
        return Err(ParseError::FieldCount { found: chunks.len() });
    }

    let mut fields = BTreeMap::new();
    for chunk in chunks {
        let (label, value) = chunk
            .split_once(LABEL_SEPARATOR)
            .ok_or_else(|| ParseError::MissingSeparator { chunk: chunk.to_string() })?;
        let label = label.trim();
        if !LABELS.contains(&label) {
            return Err(ParseError::UnknownLabel(label.to_string()));
        }
        let value = match format {
            LineFormat::Escaped => unescape_value(value),
            LineFormat::Legacy => value.trim().to_string(),
        };
        if fields.insert(label.to_string(), value).is_some() {
            return Err(ParseError::DuplicateLabel(label.to_string()));
        }
    }

    Ok(LedgerEntry(fields))
}

/// Storage behind the ledger: append whole lines, read everything back.
pub trait Ledger: Send + Sync {
    /// Append `line` as one atomic write. `line` carries its own line break.
    fn append_line(&self, line: &str) -> Result<(), LedgerError>;

    /// Full contents, or `None` when nothing has ever been written
    fn read_all(&self) -> Result<Option<String>, LedgerError>;
}

/// Ledger stored in a single text file.
///
/// Appends and reads share one mutex, so a reader never observes a line
/// half-written by this process.
pub struct FileLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Ledger for FileLedger {
    fn append_line(&self, line: &str) -> Result<(), LedgerError> {
        let _guard = self.lock.lock();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        f.write_all(line.as_bytes()).map_err(|e| self.io_error(e))?;
        f.flush().map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn read_all(&self) -> Result<Option<String>, LedgerError> {
        let _guard = self.lock.lock();
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-memory ledger for tests and dry runs
#[derive(Default)]
pub struct MemoryLedger {
    contents: Mutex<Option<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing log text, e.g. a legacy file's contents
    pub fn with_contents(contents: &str) -> Self {
        Self {
            contents: Mutex::new(Some(contents.to_string())),
        }
    }
}

impl Ledger for MemoryLedger {
    fn append_line(&self, line: &str) -> Result<(), LedgerError> {
        self.contents
            .lock()
            .get_or_insert_with(String::new)
            .push_str(line);
        Ok(())
    }

    fn read_all(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.contents.lock().clone())
    }
}

/// Server clock, truncated to whole seconds to match the line format
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Appends purchases; the writer is the only source of ledger timestamps.
pub struct LedgerWriter<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    format: LineFormat,
}

impl<'a, L: Ledger + ?Sized> LedgerWriter<'a, L> {
    pub fn new(ledger: &'a L, format: LineFormat) -> Self {
        Self { ledger, format }
    }

    /// Stamp `purchase` with the current time and append it.
    pub fn append(&self, purchase: Purchase) -> Result<TransactionRecord, LedgerError> {
        let record = TransactionRecord::new(now(), purchase);
        self.ledger.append_line(&record.to_line(self.format))?;
        info!(
            item = %record.item_name,
            date = %record.formatted_timestamp(),
            "transaction appended to ledger"
        );
        Ok(record)
    }
}

/// Reads the ledger back in file order (oldest first).
pub struct LedgerReader<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    format: LineFormat,
}

impl<'a, L: Ledger + ?Sized> LedgerReader<'a, L> {
    pub fn new(ledger: &'a L, format: LineFormat) -> Self {
        Self { ledger, format }
    }

    /// Every well-formed line as a label mapping.
    ///
    /// A missing ledger is an empty history. Malformed lines are logged and
    /// skipped so one bad line never hides the rest.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let Some(contents) = self.ledger.read_all()? else {
            return Ok(vec![]);
        };

        let mut entries = vec![];
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line, self.format) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = idx + 1, error = %e, "skipping malformed ledger line"),
            }
        }
        Ok(entries)
    }

    /// Typed records; entries whose date does not parse are skipped.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self
            .entries()?
            .iter()
            .filter_map(|entry| match TransactionRecord::from_entry(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "skipping ledger entry");
                    None
                }
            })
            .collect())
    }
}
