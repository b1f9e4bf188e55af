//! CSV file data adapter.
//!
//! One file holds the bars and, optionally, the signal columns produced for
//! them. Header names are matched case-insensitively.

use crate::domain::error::TradesimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::ports::data_port::{DataPort, MarketData};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

const TIME_COLUMNS: [&str; 4] = ["time", "date", "datetime", "timestamp"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Column positions resolved from the header row.
struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    long_signal: Option<usize>,
    short_signal: Option<usize>,
    stop_loss: Option<usize>,
    take_profit: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, TradesimError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| TradesimError::DataSource {
                reason: format!("missing {name} column"),
            })
        };

        let time = TIME_COLUMNS
            .iter()
            .find_map(|name| find(*name))
            .ok_or_else(|| TradesimError::DataSource {
                reason: format!("missing time column (one of {})", TIME_COLUMNS.join(", ")),
            })?;

        Ok(Columns {
            time,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
            long_signal: find("long_signal"),
            short_signal: find("short_signal"),
            stop_loss: find("stop_loss"),
            take_profit: find("take_profit"),
        })
    }
}

impl DataPort for CsvAdapter {
    fn load(&self) -> Result<MarketData, TradesimError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| TradesimError::DataSource {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let headers = rdr.headers().map_err(|e| TradesimError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::resolve(headers)?;

        let mut rows: Vec<(OhlcvBar, Signal)> = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            // Line number in the file, counting the header.
            let row = i + 2;
            let record = result.map_err(|e| TradesimError::DataRow {
                row,
                reason: format!("CSV parse error: {}", e),
            })?;
            rows.push(parse_row(&record, &columns, row)?);
        }

        rows.sort_by_key(|(bar, _)| bar.timestamp);
        if let Some(pair) = rows.windows(2).find(|w| w[0].0.timestamp == w[1].0.timestamp) {
            return Err(TradesimError::DataSource {
                reason: format!("duplicate timestamp {}", pair[0].0.timestamp),
            });
        }

        let (bars, signals) = rows.into_iter().unzip();
        Ok(MarketData { bars, signals })
    }
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &Columns,
    row: usize,
) -> Result<(OhlcvBar, Signal), TradesimError> {
    let field = |idx: usize| record.get(idx).unwrap_or("");
    let row_err = |reason: String| TradesimError::DataRow { row, reason };

    let timestamp = parse_timestamp(field(columns.time))
        .ok_or_else(|| row_err(format!("invalid timestamp '{}'", field(columns.time))))?;

    let price = |idx: usize, name: &str| -> Result<f64, TradesimError> {
        let raw = field(idx);
        let value: f64 = raw
            .parse()
            .map_err(|_| row_err(format!("invalid {name} value '{raw}'")))?;
        if !value.is_finite() {
            return Err(row_err(format!("non-finite {name} value")));
        }
        Ok(value)
    };

    let volume = match columns.volume.map(field) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| row_err(format!("invalid volume value '{raw}'")))?,
        ),
    };

    let bar = OhlcvBar {
        timestamp,
        open: price(columns.open, "open")?,
        high: price(columns.high, "high")?,
        low: price(columns.low, "low")?,
        close: price(columns.close, "close")?,
        volume,
    };
    if !bar.is_well_formed() {
        return Err(row_err("prices outside the high/low range".to_string()));
    }

    let flag = |idx: Option<usize>, name: &str| -> Result<bool, TradesimError> {
        match idx.map(field) {
            None => Ok(false),
            Some(raw) => parse_flag(raw).ok_or_else(|| row_err(format!("invalid {name} '{raw}'"))),
        }
    };
    let level = |idx: Option<usize>, name: &str| -> Result<Option<f64>, TradesimError> {
        match idx.map(field) {
            None => Ok(None),
            Some(raw) => parse_level(raw).map_err(|_| row_err(format!("invalid {name} '{raw}'"))),
        }
    };

    let signal = Signal {
        long: flag(columns.long_signal, "long_signal")?,
        short: flag(columns.short_signal, "short_signal")?,
        stop_loss: level(columns.stop_loss, "stop_loss")?,
        take_profit: level(columns.take_profit, "take_profit")?,
    };

    Ok((bar, signal))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "" | "false" | "0" => Some(false),
        "true" | "1" => Some(true),
        _ => None,
    }
}

/// Blank and NaN cells mean "no level".
fn parse_level(raw: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw.parse()?;
    Ok(value.is_finite().then_some(value))
}
