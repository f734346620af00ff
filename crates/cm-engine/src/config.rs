use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cm_data::{nyse_holidays, HolidayCalendar};
use cm_options::{OptionContract, CONTRACT_MULTIPLIER};
use cm_types::{config_error, CmResult, Symbol};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CALLMON_CONFIG";

/// Static configuration for a collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Ticker of the underlying.
    pub underlying: String,
    pub exchange: String,
    /// Continuously compounded annual rate, e.g. 0.0439.
    pub risk_free_rate: f64,
    pub contract_multiplier: u32,
    /// IANA name of the timezone that defines a trading day.
    pub timezone: String,
    /// Positions to price on every run.
    pub contracts: Vec<OptionContract>,
    pub data_file: PathBuf,
    /// Optional publication copy of the history file.
    pub mirror_file: Option<PathBuf>,
    /// Full-day exchange closures. Years with no entry are treated as
    /// unknown and block collection unless forced.
    pub holidays: Vec<NaiveDate>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            underlying: "IBIT".to_string(),
            exchange: "NASDAQ".to_string(),
            risk_free_rate: 0.0439,
            contract_multiplier: CONTRACT_MULTIPLIER,
            timezone: "America/New_York".to_string(),
            contracts: vec![OptionContract::call(
                Decimal::from(85),
                NaiveDate::from_ymd_opt(2027, 12, 17).unwrap_or_default(),
                Decimal::new(1495, 2),
            )],
            data_file: default_data_file(),
            mirror_file: None,
            holidays: nyse_holidays(),
        }
    }
}

impl MonitorConfig {
    /// Read and validate a JSON config file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CmResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: MonitorConfig = serde_json::from_str(&content)
            .map_err(|e| config_error!("invalid config {}: {}", path.display(), e))?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Explicit path, then `CALLMON_CONFIG`, then built-in defaults.
    pub fn load(path: Option<&Path>) -> CmResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => Self::from_file(p),
                _ => {
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            },
        }
    }

    pub fn validate(&self) -> CmResult<()> {
        if self.underlying.trim().is_empty() {
            return Err(config_error!("underlying must not be empty"));
        }
        if self.contracts.is_empty() {
            return Err(config_error!("at least one contract must be configured"));
        }
        for contract in &self.contracts {
            contract
                .validate()
                .map_err(|e| config_error!("contract {}: {}", contract, e))?;
        }
        if !self.risk_free_rate.is_finite() {
            return Err(config_error!("risk_free_rate must be finite"));
        }
        if self.contract_multiplier == 0 {
            return Err(config_error!("contract_multiplier must be positive"));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> CmResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error!("unknown timezone '{}'", self.timezone))
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.underlying, &self.exchange)
    }

    pub fn calendar(&self) -> HolidayCalendar {
        HolidayCalendar::new(self.holidays.iter().copied())
    }
}

/// `<platform data dir>/callmon/ibit_calls.csv`
pub fn default_data_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("callmon")
        .join("ibit_calls.csv")
}
