//! Translation of a raw market snapshot into a history record.

use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use cm_options::{compute_greeks, compute_return_with_multiplier, OptionContract};
use cm_types::{validation_error, CmResult, MarketSnapshot, Record};

/// Price `contract` against `snapshot` and assemble its record.
///
/// Time to expiration is counted from the snapshot's trading day in
/// `timezone`; the stored timestamp is expressed in that timezone too.
pub fn build_record(
    contract: &OptionContract,
    snapshot: &MarketSnapshot,
    risk_free_rate: f64,
    multiplier: u32,
    timezone: Tz,
) -> CmResult<Record> {
    let quote = &snapshot.quote;
    let observed = quote.timestamp.with_timezone(&timezone);

    let time_to_expiration = contract.time_to_expiry(observed.date_naive());
    let market_price = quote.mid();
    let implied_volatility = quote.implied_volatility_or_zero();

    let greeks = compute_greeks(
        to_f64("underlying price", snapshot.underlying_price)?,
        to_f64("strike", contract.strike)?,
        time_to_expiration,
        risk_free_rate,
        implied_volatility,
        contract.kind,
    )?;
    if greeks.is_zero() {
        tracing::debug!(
            "{}: no informative greeks (T={:.4}, iv={})",
            contract,
            time_to_expiration,
            implied_volatility
        );
    }

    let returns = compute_return_with_multiplier(market_price, contract.purchase_cost, multiplier);

    Ok(Record {
        timestamp: observed.fixed_offset(),
        underlying_price: snapshot.underlying_price,
        option_type: contract.kind,
        strike_price: contract.strike,
        expiration_date: contract.expiration,
        time_to_expiration,
        market_price,
        bid: quote.bid,
        ask: quote.ask,
        volume: quote.volume_or_zero(),
        open_interest: quote.open_interest_or_zero(),
        implied_volatility,
        purchase_cost: contract.purchase_cost,
        total_return: returns.total_return,
        return_percentage: returns.return_percentage,
        delta: greeks.delta,
        gamma: greeks.gamma,
        theta: greeks.theta,
        vega: greeks.vega,
        rho: greeks.rho,
    })
}

fn to_f64(field: &str, value: Decimal) -> CmResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| validation_error!("{} {} is not representable as f64", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use chrono_tz::America::New_York;
    use cm_types::{CmError, OptionQuote};
    use rust_decimal_macros::dec;

    fn contract() -> OptionContract {
        OptionContract::call(dec!(85), NaiveDate::from_ymd_opt(2027, 12, 17).unwrap(), dec!(14.95))
    }

    fn snapshot(spot: Decimal, iv: Option<f64>, timestamp: &str) -> MarketSnapshot {
        MarketSnapshot {
            underlying_price: spot,
            quote: OptionQuote {
                bid: dec!(19.50),
                ask: dec!(20.50),
                volume: Some(310),
                open_interest: None,
                implied_volatility: iv,
                timestamp: DateTime::parse_from_rfc3339(timestamp).unwrap(),
            },
        }
    }

    #[test]
    fn test_reference_scenario() {
        let snap = snapshot(dec!(90.00), Some(0.55), "2025-06-02T16:00:00-04:00");
        let r = build_record(&contract(), &snap, 0.0439, 100, New_York).unwrap();

        assert_eq!(r.market_price, dec!(20.00));
        assert!((r.time_to_expiration - 2.54).abs() < 0.01, "T = {}", r.time_to_expiration);
        assert!(r.delta > 0.70 && r.delta < 0.85, "delta = {}", r.delta);
        assert!(r.gamma > 0.0 && r.vega > 0.0 && r.rho > 0.0);
        assert!(r.theta < 0.0);
        assert_eq!(r.total_return, dec!(505.00));
        assert_eq!(r.return_percentage.round_dp(2), dec!(33.78));
        assert_eq!(r.volume, 310);
        assert_eq!(r.open_interest, 0);
        assert_eq!(r.option_type, cm_types::OptionKind::Call);
        assert_eq!(r.timestamp.to_rfc3339(), "2025-06-02T16:00:00-04:00");
    }

    #[test]
    fn test_timestamp_is_stored_in_reference_timezone() {
        let snap = snapshot(dec!(90), Some(0.55), "2025-06-02T20:00:00+00:00");
        let r = build_record(&contract(), &snap, 0.0439, 100, New_York).unwrap();
        assert_eq!(r.timestamp.to_rfc3339(), "2025-06-02T16:00:00-04:00");
    }

    #[test]
    fn test_missing_volatility_gives_zero_greeks() {
        let snap = snapshot(dec!(90), None, "2025-06-02T16:00:00-04:00");
        let r = build_record(&contract(), &snap, 0.0439, 100, New_York).unwrap();
        assert_eq!((r.delta, r.gamma, r.theta, r.vega, r.rho), (0.0, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(r.implied_volatility, 0.0);
        assert_eq!(r.total_return, dec!(505.00));
    }

    #[test]
    fn test_expired_contract_gives_zero_greeks() {
        let snap = snapshot(dec!(90), Some(0.55), "2027-12-20T16:00:00-05:00");
        let r = build_record(&contract(), &snap, 0.0439, 100, New_York).unwrap();
        assert!(r.time_to_expiration < 0.0);
        assert_eq!(r.delta, 0.0);
    }

    #[test]
    fn test_zero_spot_is_rejected() {
        let snap = snapshot(dec!(0), Some(0.55), "2025-06-02T16:00:00-04:00");
        let err = build_record(&contract(), &snap, 0.0439, 100, New_York).unwrap_err();
        assert!(matches!(err, CmError::Pricing(_)));
    }
}
