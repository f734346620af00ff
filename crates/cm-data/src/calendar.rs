use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};

/// Whether the market is open on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Weekend,
    Holiday,
}

impl MarketStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }

    /// Human-readable status line, e.g. `Weekend: Saturday, May 31, 2025`.
    pub fn describe(&self, date: NaiveDate) -> String {
        format!("{}: {}", self, date.format("%A, %B %d, %Y"))
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "Trading Day"),
            MarketStatus::Weekend => write!(f, "Weekend"),
            MarketStatus::Holiday => write!(f, "Market Holiday"),
        }
    }
}

/// Source of truth for which dates the exchange trades.
pub trait TradingCalendar: Send + Sync + fmt::Debug {
    fn status(&self, date: NaiveDate) -> MarketStatus;

    /// Whether the calendar has holiday data for `date`'s year. An uncovered
    /// weekday reports `Open` but is really unknown.
    fn covers(&self, _date: NaiveDate) -> bool {
        true
    }

    fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.status(date).is_open()
    }
}

/// Weekends plus an explicit list of exchange holidays.
///
/// A year is covered once at least one holiday in it is listed.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
    years: BTreeSet<i32>,
}

impl HolidayCalendar {
    pub fn new<I: IntoIterator<Item = NaiveDate>>(holidays: I) -> Self {
        let holidays: BTreeSet<NaiveDate> = holidays.into_iter().collect();
        let years = holidays.iter().map(|d| d.year()).collect();
        Self { holidays, years }
    }

    /// Full-day NYSE closures for the years in [`nyse_holidays`].
    pub fn nyse() -> Self {
        Self::new(nyse_holidays())
    }

    pub fn first_year(&self) -> Option<i32> {
        self.years.first().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.years.last().copied()
    }
}

impl TradingCalendar for HolidayCalendar {
    fn status(&self, date: NaiveDate) -> MarketStatus {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            MarketStatus::Weekend
        } else if self.holidays.contains(&date) {
            MarketStatus::Holiday
        } else {
            MarketStatus::Open
        }
    }

    fn covers(&self, date: NaiveDate) -> bool {
        self.years.contains(&date.year())
    }
}

/// Published NYSE full-day closures, 2025 through 2027. Observed dates are
/// listed where the holiday falls on a weekend.
pub fn nyse_holidays() -> Vec<NaiveDate> {
    const CLOSURES: &[(i32, u32, u32)] = &[
        (2025, 1, 1),
        (2025, 1, 20),
        (2025, 2, 17),
        (2025, 4, 18),
        (2025, 5, 26),
        (2025, 6, 19),
        (2025, 7, 4),
        (2025, 9, 1),
        (2025, 11, 27),
        (2025, 12, 25),
        (2026, 1, 1),
        (2026, 1, 19),
        (2026, 2, 16),
        (2026, 4, 3),
        (2026, 5, 25),
        (2026, 6, 19),
        (2026, 7, 3), // Independence Day observed
        (2026, 9, 7),
        (2026, 11, 26),
        (2026, 12, 25),
        (2027, 1, 1),
        (2027, 1, 18),
        (2027, 2, 15),
        (2027, 3, 26),
        (2027, 5, 31),
        (2027, 6, 18), // Juneteenth observed
        (2027, 7, 5),  // Independence Day observed
        (2027, 9, 6),
        (2027, 11, 25),
        (2027, 12, 24), // Christmas observed
    ];
    CLOSURES
        .iter()
        .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
}
