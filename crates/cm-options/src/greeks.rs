use serde::{Deserialize, Serialize};

/// Option greeks computed from a pricing model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    /// Rate of change of option price w.r.t. underlying price.
    pub delta: f64,
    /// Rate of change of delta w.r.t. underlying price.
    pub gamma: f64,
    /// Rate of change of option price w.r.t. time (per calendar day).
    pub theta: f64,
    /// Rate of change of option price w.r.t. volatility (per 1% move).
    pub vega: f64,
    /// Rate of change of option price w.r.t. risk-free rate (per 1% move).
    pub rho: f64,
}

impl Greeks {
    /// Sentinel for "no informative greeks": expired or unquoted volatility.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_greeks() {
        let g = Greeks::zero();
        assert_eq!(g.delta, 0.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.theta, 0.0);
        assert_eq!(g.vega, 0.0);
        assert_eq!(g.rho, 0.0);
        assert!(g.is_zero());
    }

    #[test]
    fn test_nonzero_is_not_sentinel() {
        let g = Greeks {
            delta: 0.5,
            ..Greeks::zero()
        };
        assert!(!g.is_zero());
    }
}
