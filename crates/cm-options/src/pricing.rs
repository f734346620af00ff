//! Black-Scholes pricing and greeks for European options.

use cm_types::{CmResult, OptionKind, PricingError};
use serde::{Deserialize, Serialize};

use crate::contract::DAYS_PER_YEAR;
use crate::greeks::Greeks;

/// Inputs shared by all pricing calls.
#[derive(Debug, Clone)]
pub struct PricingInput {
    /// Current underlying spot price.
    pub spot: f64,
    /// Strike price.
    pub strike: f64,
    /// Annualised risk-free rate, continuously compounded (e.g. 0.0439 = 4.39 %).
    pub risk_free_rate: f64,
    /// Annualised implied volatility (e.g. 0.55 = 55 %).
    pub volatility: f64,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
}

impl PricingInput {
    fn validate(&self) -> Result<(), PricingError> {
        let fields = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("risk_free_rate", self.risk_free_rate),
            ("volatility", self.volatility),
            ("time_to_expiry", self.time_to_expiry),
        ];
        if let Some((field, value)) = fields.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PricingError::NonFinite { field, value });
        }
        if self.spot <= 0.0 {
            return Err(PricingError::NonPositiveSpot { spot: self.spot });
        }
        if self.strike <= 0.0 {
            return Err(PricingError::NonPositiveStrike {
                strike: self.strike,
            });
        }
        Ok(())
    }
}

/// Result of a pricing calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    /// Theoretical option price.
    pub price: f64,
    /// Greeks.
    pub greeks: Greeks,
}

// ---------- normal distribution helpers (no external dep) ----------

/// Standard normal cumulative distribution function (Abramowitz & Stegun 26.2.17).
fn norm_cdf(x: f64) -> f64 {
    if x >= 8.0 {
        return 1.0;
    }
    if x <= -8.0 {
        return 0.0;
    }

    let a1 = 0.254829592_f64;
    let a2 = -0.284496736_f64;
    let a3 = 1.421413741_f64;
    let a4 = -1.453152027_f64;
    let a5 = 1.061405429_f64;
    let p = 0.3275911_f64;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x_abs = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * x_abs);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x_abs * x_abs).exp();

    0.5 * (1.0 + sign * y)
}

/// Standard normal probability density function.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

// ---------- Black-Scholes core ----------

/// Compute d1 and d2.
fn d1_d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> (f64, f64) {
    let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt());
    let d2 = d1 - sigma * t.sqrt();
    (d1, d2)
}

/// Price a European option and compute its greeks using Black-Scholes.
///
/// Expired contracts (`time_to_expiry <= 0`) and unquoted volatility
/// (`volatility <= 0`) price at intrinsic value with all-zero greeks.
pub fn black_scholes_price(kind: OptionKind, input: &PricingInput) -> CmResult<PricingResult> {
    input.validate()?;

    let s = input.spot;
    let k = input.strike;
    let r = input.risk_free_rate;
    let sigma = input.volatility;
    let t = input.time_to_expiry;

    if t <= 0.0 || sigma <= 0.0 {
        let intrinsic = match kind {
            OptionKind::Call => (s - k).max(0.0),
            OptionKind::Put => (k - s).max(0.0),
        };
        return Ok(PricingResult {
            price: intrinsic,
            greeks: Greeks::zero(),
        });
    }

    let (d1, d2) = d1_d2(s, k, r, sigma, t);
    let disc = (-r * t).exp();

    let price = match kind {
        OptionKind::Call => s * norm_cdf(d1) - k * disc * norm_cdf(d2),
        OptionKind::Put => k * disc * norm_cdf(-d2) - s * norm_cdf(-d1),
    };

    // --- Greeks ---
    let delta = match kind {
        OptionKind::Call => norm_cdf(d1),
        OptionKind::Put => -norm_cdf(-d1),
    };

    let gamma = norm_pdf(d1) / (s * sigma * t.sqrt());

    let theta_common = -(s * norm_pdf(d1) * sigma) / (2.0 * t.sqrt());
    let theta = match kind {
        OptionKind::Call => theta_common - r * k * disc * norm_cdf(d2),
        OptionKind::Put => theta_common + r * k * disc * norm_cdf(-d2),
    };

    let vega = s * norm_pdf(d1) * t.sqrt();

    let rho = match kind {
        OptionKind::Call => k * t * disc * norm_cdf(d2),
        OptionKind::Put => -k * t * disc * norm_cdf(-d2),
    };

    Ok(PricingResult {
        price,
        greeks: Greeks {
            delta,
            gamma,
            theta: theta / DAYS_PER_YEAR,
            vega: vega / 100.0,
            rho: rho / 100.0,
        },
    })
}

/// Greeks only, for callers that already have a market price.
pub fn compute_greeks(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
    kind: OptionKind,
) -> CmResult<Greeks> {
    let input = PricingInput {
        spot,
        strike,
        risk_free_rate,
        volatility,
        time_to_expiry,
    };
    black_scholes_price(kind, &input).map(|res| res.greeks)
}
