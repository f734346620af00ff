use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::OptionKind;

/// Column order of the history file.
pub const HISTORY_COLUMNS: [&str; 20] = [
    "timestamp",
    "underlying_price",
    "option_type",
    "strike_price",
    "expiration_date",
    "time_to_expiration",
    "market_price",
    "bid",
    "ask",
    "volume",
    "open_interest",
    "implied_volatility",
    "purchase_cost",
    "total_return",
    "return_percentage",
    "delta",
    "gamma",
    "theta",
    "vega",
    "rho",
];

/// One row of the history file: a priced, enriched observation of a contract.
///
/// Field order matches [`HISTORY_COLUMNS`]; the CSV writer relies on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<FixedOffset>,
    pub underlying_price: Decimal,
    pub option_type: OptionKind,
    pub strike_price: Decimal,
    pub expiration_date: NaiveDate,
    /// Years until expiration; non-positive once expired.
    pub time_to_expiration: f64,
    /// Mid of bid and ask.
    pub market_price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
    pub purchase_cost: Decimal,
    /// Dollars per contract.
    pub total_return: Decimal,
    pub return_percentage: Decimal,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Record {
    /// Short human label, e.g. `$85 call 2027-12-17`.
    pub fn contract_label(&self) -> String {
        format!(
            "${} {} {}",
            self.strike_price.normalize(),
            self.option_type,
            self.expiration_date
        )
    }
}
