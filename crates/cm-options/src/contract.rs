use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use cm_types::{validation_error, CmResult, OptionKind};

/// Day-count basis used to annualise time to expiration and to express
/// theta per calendar day.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// A held option position being monitored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Call or put.
    #[serde(default)]
    pub kind: OptionKind,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Price paid per share when the position was opened.
    pub purchase_cost: Decimal,
}

impl OptionContract {
    pub fn new(
        kind: OptionKind,
        strike: Decimal,
        expiration: NaiveDate,
        purchase_cost: Decimal,
    ) -> Self {
        Self {
            kind,
            strike,
            expiration,
            purchase_cost,
        }
    }

    /// Convenience constructor for a long call.
    pub fn call(strike: Decimal, expiration: NaiveDate, purchase_cost: Decimal) -> Self {
        Self::new(OptionKind::Call, strike, expiration, purchase_cost)
    }

    /// Reject contracts that cannot be priced or valued.
    pub fn validate(&self) -> CmResult<()> {
        if self.strike <= Decimal::ZERO {
            return Err(validation_error!("strike must be positive, got {}", self.strike));
        }
        if self.purchase_cost < Decimal::ZERO {
            return Err(validation_error!(
                "purchase cost must be non-negative, got {}",
                self.purchase_cost
            ));
        }
        Ok(())
    }

    /// Years remaining until expiration as of `as_of`.
    pub fn time_to_expiry(&self, as_of: NaiveDate) -> f64 {
        years_until(self.expiration, as_of)
    }

    /// True once the expiration date has been reached.
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        self.time_to_expiry(as_of) <= 0.0
    }

    /// Intrinsic value given the current underlying price.
    pub fn intrinsic_value(&self, spot: Decimal) -> Decimal {
        let iv = match self.kind {
            OptionKind::Call => spot - self.strike,
            OptionKind::Put => self.strike - spot,
        };
        iv.max(Decimal::ZERO)
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${} {} expiring {}",
            self.strike.normalize(),
            self.kind,
            self.expiration.format("%Y-%m-%d"),
        )
    }
}

/// Whole calendar days between `as_of` and `expiration`, in years.
///
/// Negative for contracts that have already expired.
pub fn years_until(expiration: NaiveDate, as_of: NaiveDate) -> f64 {
    (expiration - as_of).num_days() as f64 / DAYS_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_contract() -> OptionContract {
        OptionContract::call(dec!(85), date(2027, 12, 17), dec!(14.95))
    }

    #[test]
    fn test_years_until() {
        // 928 calendar days
        let t = years_until(date(2027, 12, 17), date(2025, 6, 2));
        assert!((t - 928.0 / 365.25).abs() < 1e-12, "t = {t}");
        assert!(t > 2.54 && t < 2.55);
    }

    #[test]
    fn test_years_until_negative_when_expired() {
        let t = years_until(date(2025, 6, 1), date(2025, 6, 2));
        assert!(t < 0.0);
    }

    #[test]
    fn test_expired() {
        let c = sample_contract();
        assert!(!c.is_expired(date(2027, 12, 16)));
        assert!(c.is_expired(date(2027, 12, 17)));
        assert!(c.is_expired(date(2028, 1, 3)));
    }

    #[test]
    fn test_intrinsic_value() {
        let call = sample_contract();
        assert_eq!(call.intrinsic_value(dec!(90)), dec!(5));
        assert_eq!(call.intrinsic_value(dec!(80)), dec!(0));

        let put = OptionContract::new(OptionKind::Put, dec!(85), date(2027, 12, 17), dec!(3));
        assert_eq!(put.intrinsic_value(dec!(80)), dec!(5));
    }

    #[test]
    fn test_validate() {
        assert!(sample_contract().validate().is_ok());

        let mut bad = sample_contract();
        bad.strike = dec!(0);
        assert!(bad.validate().is_err());

        let mut bad = sample_contract();
        bad.purchase_cost = dec!(-1);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_kind_defaults_to_call_in_config() {
        let json = r#"{"strike": "85", "expiration": "2027-12-17", "purchase_cost": "14.95"}"#;
        let c: OptionContract = serde_json::from_str(json).unwrap();
        assert_eq!(c, sample_contract());
    }

    #[test]
    fn test_display() {
        let s = format!("{}", sample_contract());
        assert_eq!(s, "$85 call expiring 2027-12-17");
    }
}
