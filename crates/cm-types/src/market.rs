use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a listed underlying with exchange information
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol: String,
    pub exchange: String,
}

impl Symbol {
    pub fn new(symbol: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
        }
    }

    pub fn equity(symbol: &str) -> Self {
        Self::new(symbol, "NASDAQ")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// Option type — call or put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    #[default]
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "call"),
            OptionKind::Put => write!(f, "put"),
        }
    }
}

/// Latest close of the underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub symbol: Symbol,
    pub price: Decimal,
    /// Trading session the price belongs to.
    pub session: NaiveDate,
}

/// Market quote for a single option contract.
///
/// Providers frequently omit volume, open interest and implied volatility;
/// those stay `None` here and read as zero through the accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    pub timestamp: DateTime<FixedOffset>,
}

impl OptionQuote {
    /// Midpoint of bid and ask.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    pub fn volume_or_zero(&self) -> u64 {
        self.volume.unwrap_or(0)
    }

    pub fn open_interest_or_zero(&self) -> u64 {
        self.open_interest.unwrap_or(0)
    }

    /// Implied volatility as a fraction of 1; zero means unavailable.
    pub fn implied_volatility_or_zero(&self) -> f64 {
        match self.implied_volatility {
            Some(iv) if iv.is_finite() && iv > 0.0 => iv,
            _ => 0.0,
        }
    }
}

/// Everything the record builder needs for one contract on one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub underlying_price: Decimal,
    pub quote: OptionQuote,
}
