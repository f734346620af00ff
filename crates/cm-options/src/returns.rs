use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shares controlled by one standard equity option contract.
pub const CONTRACT_MULTIPLIER: u32 = 100;

/// Profit and loss of one contract against its purchase cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractReturn {
    /// Dollars gained or lost on the whole contract.
    pub total_return: Decimal,
    /// Return relative to the amount paid, in percent.
    pub return_percentage: Decimal,
}

/// Return on a standard 100-share contract.
pub fn compute_return(market_price: Decimal, purchase_cost: Decimal) -> ContractReturn {
    compute_return_with_multiplier(market_price, purchase_cost, CONTRACT_MULTIPLIER)
}

/// Return on a contract with an arbitrary multiplier.
///
/// A zero purchase cost yields a zero percentage rather than a division fault.
pub fn compute_return_with_multiplier(
    market_price: Decimal,
    purchase_cost: Decimal,
    multiplier: u32,
) -> ContractReturn {
    let multiplier = Decimal::from(multiplier);
    let current_value = market_price * multiplier;
    let paid = purchase_cost * multiplier;
    let total_return = current_value - paid;

    let return_percentage = if paid > Decimal::ZERO {
        total_return / paid * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    ContractReturn {
        total_return,
        return_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gain() {
        let r = compute_return(dec!(20.00), dec!(14.95));
        assert_eq!(r.total_return, dec!(505.00));
        assert_eq!(r.return_percentage.round_dp(2), dec!(33.78));
    }

    #[test]
    fn test_loss() {
        let r = compute_return(dec!(10), dec!(12.50));
        assert_eq!(r.total_return, dec!(-250));
        assert_eq!(r.return_percentage, dec!(-20));
    }

    #[test]
    fn test_zero_cost_has_zero_percentage() {
        let r = compute_return(dec!(3.25), Decimal::ZERO);
        assert_eq!(r.total_return, dec!(325));
        assert_eq!(r.return_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_custom_multiplier() {
        let r = compute_return_with_multiplier(dec!(2), dec!(1), 10);
        assert_eq!(r.total_return, dec!(10));
        assert_eq!(r.return_percentage, dec!(100));
    }
}
