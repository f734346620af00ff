//! Merge of freshly collected records into the history table.
//!
//! The table holds at most one row per (trading day, strike, expiration).
//! The trading day is the calendar date of the row's timestamp in the
//! reference timezone, derived at merge time so rows written without any
//! date helper column are keyed the same way as new ones.

use std::collections::HashMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;

use cm_types::Record;

/// Deduplication key: (trading day, strike, expiration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub trading_day: NaiveDate,
    pub strike: Decimal,
    pub expiration: NaiveDate,
}

impl RecordKey {
    pub fn of(record: &Record, timezone: Tz) -> Self {
        Self {
            trading_day: record.timestamp.with_timezone(&timezone).date_naive(),
            strike: record.strike_price,
            expiration: record.expiration_date,
        }
    }
}

/// Merge `new` into `existing`, keeping the latest-timestamped row per key.
///
/// Survivors are returned in timestamp order. On equal timestamps the row
/// that came later in `existing ++ new` wins.
pub fn reconcile(existing: Vec<Record>, new: Vec<Record>, timezone: Tz) -> Vec<Record> {
    let mut combined = existing;
    combined.extend(new);

    // stable: ties keep input order
    combined.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let keys: Vec<RecordKey> = combined
        .iter()
        .map(|record| RecordKey::of(record, timezone))
        .collect();

    let mut latest: HashMap<RecordKey, usize> = HashMap::with_capacity(keys.len());
    for (idx, key) in keys.iter().enumerate() {
        latest.insert(*key, idx);
    }

    combined
        .into_iter()
        .zip(keys)
        .enumerate()
        .filter(|(idx, (_, key))| latest.get(key) == Some(idx))
        .map(|(_, (record, _))| record)
        .collect()
}
