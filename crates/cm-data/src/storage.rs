use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use csv::{ReaderBuilder, WriterBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;

use cm_types::{CmError, CmResult, DataError, OptionKind, Record, HISTORY_COLUMNS};

use crate::reconcile::reconcile;

/// Outcome of merging a batch into the history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    /// Records offered by this run.
    pub offered: usize,
    /// Rows dropped because a later row shares their key.
    pub superseded: usize,
    /// Rows in the file after the write.
    pub total: usize,
}

/// CSV-backed history table.
///
/// Reads tolerate rows written by older collectors (different price column
/// name, blank volume, naive timestamps) but refuse rows that cannot be keyed.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pub path: PathBuf,
    pub timezone: Tz,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P, timezone: Tz) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timezone,
        }
    }

    /// Load every row. A missing or empty file is an empty table.
    pub fn load(&self) -> CmResult<Vec<Record>> {
        if !self.path.exists() || std::fs::metadata(&self.path)?.len() == 0 {
            tracing::info!("No history at {}, starting a new table", self.path.display());
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to open {}: {}", self.path.display(), e),
            })?;

        let mut records = Vec::new();
        for (idx, result) in reader.deserialize::<StoredRow>().enumerate() {
            // header is line 1
            let line = idx + 2;
            let row = result.map_err(|e| DataError::Corruption {
                line,
                message: e.to_string(),
            })?;
            let record = row
                .into_record(self.timezone)
                .map_err(|message| DataError::Corruption { line, message })?;
            records.push(record);
        }

        tracing::debug!("Loaded {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Replace the file with `records`.
    ///
    /// The table is written to a sibling temp file and renamed into place, so
    /// readers see either the old table or the new one.
    pub fn save(&self, records: &[Record]) -> CmResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(&mut tmp);
            writer.write_record(HISTORY_COLUMNS).map_err(csv_error)?;
            for record in records {
                writer.serialize(record).map_err(csv_error)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CmError::Io(e.error))?;

        tracing::debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Read, reconcile with `new`, and write back.
    ///
    /// Nothing is written if the existing file cannot be read in full.
    pub fn append(&self, new: Vec<Record>) -> CmResult<AppendReport> {
        let existing = self.load()?;
        let offered = new.len();
        let before = existing.len() + offered;

        let merged = reconcile(existing, new, self.timezone);
        self.save(&merged)?;

        let report = AppendReport {
            offered,
            superseded: before - merged.len(),
            total: merged.len(),
        };
        tracing::info!(
            "Saved {} new records to {} ({} superseded, {} total)",
            report.offered,
            self.path.display(),
            report.superseded,
            report.total
        );
        Ok(report)
    }

    /// Copy the history file to a publication location.
    pub fn mirror_to<P: AsRef<Path>>(&self, destination: P) -> CmResult<()> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::copy(&self.path, destination)?;
        tracing::info!("Data copied to {}", destination.display());
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> CmError {
    CmError::Csv(e.to_string())
}

/// Loosely typed history row; every column may be absent or blank.
#[derive(Debug, Deserialize)]
struct StoredRow {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "ibit_price")]
    underlying_price: Option<String>,
    #[serde(default)]
    option_type: Option<String>,
    #[serde(default)]
    strike_price: Option<String>,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    time_to_expiration: Option<f64>,
    #[serde(default)]
    market_price: Option<String>,
    #[serde(default)]
    bid: Option<String>,
    #[serde(default)]
    ask: Option<String>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    open_interest: Option<f64>,
    #[serde(default)]
    implied_volatility: Option<f64>,
    #[serde(default)]
    purchase_cost: Option<String>,
    #[serde(default)]
    total_return: Option<String>,
    #[serde(default)]
    return_percentage: Option<String>,
    #[serde(default)]
    delta: Option<f64>,
    #[serde(default)]
    gamma: Option<f64>,
    #[serde(default)]
    theta: Option<f64>,
    #[serde(default)]
    vega: Option<f64>,
    #[serde(default)]
    rho: Option<f64>,
}

impl StoredRow {
    fn into_record(self, timezone: Tz) -> Result<Record, String> {
        let timestamp = self
            .timestamp
            .as_deref()
            .ok_or_else(|| "missing timestamp".to_string())
            .and_then(|s| parse_timestamp(s, timezone))?;

        let strike_price = self
            .strike_price
            .as_deref()
            .ok_or_else(|| "missing strike_price".to_string())
            .and_then(|s| parse_decimal("strike_price", s))?;

        let expiration_date = self
            .expiration_date
            .as_deref()
            .ok_or_else(|| "missing expiration_date".to_string())
            .and_then(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| format!("invalid expiration_date '{}': {}", s, e))
            })?;

        let option_type = match self.option_type.as_deref().map(str::to_ascii_lowercase) {
            None => OptionKind::Call,
            Some(s) if s == "call" => OptionKind::Call,
            Some(s) if s == "put" => OptionKind::Put,
            Some(s) => return Err(format!("unknown option_type '{}'", s)),
        };

        let dec = |field: &str, value: Option<String>| -> Result<Decimal, String> {
            value.map_or(Ok(Decimal::ZERO), |s| parse_decimal(field, &s))
        };
        let count = |value: Option<f64>| {
            value
                .filter(|v| v.is_finite() && *v > 0.0)
                .map_or(0, |v| v as u64)
        };
        let float = |value: Option<f64>| value.filter(|v| v.is_finite()).unwrap_or(0.0);

        Ok(Record {
            timestamp,
            underlying_price: dec("underlying_price", self.underlying_price)?,
            option_type,
            strike_price,
            expiration_date,
            time_to_expiration: float(self.time_to_expiration),
            market_price: dec("market_price", self.market_price)?,
            bid: dec("bid", self.bid)?,
            ask: dec("ask", self.ask)?,
            volume: count(self.volume),
            open_interest: count(self.open_interest),
            implied_volatility: float(self.implied_volatility),
            purchase_cost: dec("purchase_cost", self.purchase_cost)?,
            total_return: dec("total_return", self.total_return)?,
            return_percentage: dec("return_percentage", self.return_percentage)?,
            delta: float(self.delta),
            gamma: float(self.gamma),
            theta: float(self.theta),
            vega: float(self.vega),
            rho: float(self.rho),
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| format!("invalid {} '{}': {}", field, value, e))
}

/// Accepts RFC 3339, space-separated ISO 8601 with offset, or a naive
/// timestamp taken to be in `timezone`.
fn parse_timestamp(value: &str, timezone: Tz) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| {
            // wall times skipped by spring-forward land an hour later
            timezone
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    let shifted = naive + Duration::hours(1);
                    timezone.from_local_datetime(&shifted).earliest()
                })
        })
        .map(|ts| ts.fixed_offset())
        .ok_or_else(|| format!("unparseable timestamp '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn record(timestamp: &str, bid: Decimal) -> Record {
        Record {
            timestamp: DateTime::parse_from_rfc3339(timestamp).unwrap(),
            underlying_price: dec!(90.00),
            option_type: OptionKind::Call,
            strike_price: dec!(85),
            expiration_date: NaiveDate::from_ymd_opt(2027, 12, 17).unwrap(),
            time_to_expiration: 928.0 / 365.25,
            market_price: bid + dec!(0.5),
            bid,
            ask: bid + dec!(1),
            volume: 12,
            open_interest: 3400,
            implied_volatility: 0.55,
            purchase_cost: dec!(14.95),
            total_return: dec!(505.00),
            return_percentage: dec!(33.779264214046822742474916388),
            delta: 0.7359,
            gamma: 0.0054,
            theta: -0.0183,
            vega: 0.4012,
            rho: 0.9876,
        }
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("calls.csv"), New_York);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_empty_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        std::fs::write(&path, "").unwrap();
        assert!(HistoryStore::new(&path, New_York).load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_rows() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("data").join("calls.csv"), New_York);
        let rows = vec![
            record("2025-05-30T16:00:00-04:00", dec!(18)),
            record("2025-06-02T16:00:00-04:00", dec!(19.50)),
        ];
        store.save(&rows).unwrap();

        let content = std::fs::read_to_string(&store.path).unwrap();
        assert!(content.starts_with(&HISTORY_COLUMNS.join(",")));
        assert!(content.contains(",call,"));

        assert_eq!(store.load().unwrap(), rows);
    }

    #[test]
    fn test_save_empty_table_writes_header() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("calls.csv"), New_York);
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
        let content = std::fs::read_to_string(&store.path).unwrap();
        assert_eq!(content.trim(), HISTORY_COLUMNS.join(","));
    }

    #[test]
    fn test_append_deduplicates_same_day() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("calls.csv"), New_York);

        let first = store.append(vec![record("2025-06-02T10:00:00-04:00", dec!(19))]).unwrap();
        assert_eq!(first, AppendReport { offered: 1, superseded: 0, total: 1 });

        let rerun = record("2025-06-02T16:00:00-04:00", dec!(19.50));
        let second = store.append(vec![rerun.clone()]).unwrap();
        assert_eq!(second, AppendReport { offered: 1, superseded: 1, total: 1 });
        assert_eq!(store.load().unwrap(), vec![rerun]);

        let next_day = store.append(vec![record("2025-06-03T16:00:00-04:00", dec!(21))]).unwrap();
        assert_eq!(next_day.total, 2);
    }

    #[test]
    fn test_reads_legacy_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ibit_calls.csv");
        std::fs::write(
            &path,
            "timestamp,ibit_price,option_type,strike_price,expiration_date,time_to_expiration,market_price,bid,ask,volume,open_interest,implied_volatility,purchase_cost,total_return,return_percentage,delta,gamma,theta,vega,rho\n\
             2025-05-30T16:02:11.482913-04:00,58.1,call,85,2027-12-17,2.5489,12.5,12.2,12.8,,1520.0,0.5412,14.95,-245.0,-16.387959866220736,0.61,1.2e-05,-0.0142,0.3551,0.6622\n\
             2025-05-29 16:00:00,57.9,call,85.0,2027-12-17,2.5517,12.4,12.1,12.7,3.0,1500.0,0.54,14.95,-255.0,-17.05,0.6,0.0077,-0.0141,0.355,0.66\n",
        )
        .unwrap();

        let rows = HistoryStore::new(&path, New_York).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].underlying_price, dec!(58.1));
        assert_eq!(rows[0].volume, 0);
        assert_eq!(rows[0].open_interest, 1520);
        assert_eq!(rows[0].gamma, 1.2e-05);
        // naive legacy timestamp is read in the reference timezone
        assert_eq!(rows[1].timestamp.to_rfc3339(), "2025-05-29T16:00:00-04:00");
        assert_eq!(rows[1].volume, 3);
    }

    #[test]
    fn test_naive_timestamps_across_dst_transitions() {
        // skipped by spring-forward
        let gap = parse_timestamp("2025-03-09 02:30:00", New_York).unwrap();
        assert_eq!(gap.to_rfc3339(), "2025-03-09T03:30:00-04:00");
        assert_eq!(gap.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());

        // repeated by fall-back: first occurrence
        let overlap = parse_timestamp("2025-11-02 01:30:00", New_York).unwrap();
        assert_eq!(overlap.to_rfc3339(), "2025-11-02T01:30:00-04:00");
    }

    #[test]
    fn test_unkeyable_row_is_rejected_and_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        let store = HistoryStore::new(&path, New_York);
        store.save(&[record("2025-05-30T16:00:00-04:00", dec!(18))]).unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str(
            "yesterday-ish,90,call,85,2027-12-17,2.5,20,19.5,20.5,0,0,0.55,14.95,505,33.78,\
             0.7,0.01,-0.02,0.4,0.9\n",
        );
        std::fs::write(&path, &content).unwrap();

        let err = store.append(vec![record("2025-06-02T16:00:00-04:00", dec!(19.5))]).unwrap_err();
        match err {
            CmError::Data(DataError::Corruption { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("yesterday-ish"));
            }
            other => panic!("expected corruption error, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_missing_strike_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        std::fs::write(
            &path,
            "timestamp,strike_price,expiration_date\n2025-06-02T16:00:00-04:00,,2027-12-17\n",
        )
        .unwrap();
        let err = HistoryStore::new(&path, New_York).load().unwrap_err();
        assert!(err.to_string().contains("missing strike_price"));
    }

    #[test]
    fn test_mirror_copies_file() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("calls.csv"), New_York);
        store.save(&[record("2025-06-02T16:00:00-04:00", dec!(19.5))]).unwrap();

        let mirror = dir.path().join("docs").join("data").join("calls.csv");
        store.mirror_to(&mirror).unwrap();
        assert_eq!(
            std::fs::read_to_string(&mirror).unwrap(),
            std::fs::read_to_string(&store.path).unwrap()
        );
    }
}
