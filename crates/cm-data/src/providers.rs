use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cm_types::{CmResult, DataError, OptionKind, OptionQuote, SpotQuote, Symbol};

/// Trait for market data sources (HTTP APIs, recorded snapshots, etc.)
#[async_trait]
pub trait MarketDataProvider: Send + Sync + std::fmt::Debug {
    /// Latest daily close of the underlying.
    async fn spot_price(&mut self, symbol: &Symbol) -> CmResult<SpotQuote>;

    /// Quote for the contract at exactly `strike` and `expiration`.
    async fn option_quote(
        &mut self,
        symbol: &Symbol,
        kind: OptionKind,
        strike: Decimal,
        expiration: NaiveDate,
    ) -> CmResult<OptionQuote>;

    /// Get provider name
    fn name(&self) -> &str;
}

fn contract_id(
    symbol: &Symbol,
    kind: OptionKind,
    strike: Decimal,
    expiration: NaiveDate,
) -> String {
    format!("{} ${} {} {}", symbol.symbol, strike.normalize(), kind, expiration)
}

/// Yahoo Finance provider using the public chart and options endpoints.
#[derive(Debug)]
pub struct YahooProvider {
    pub name: String,
    pub base_url: String,
    pub timezone: Tz,
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new(timezone: Tz) -> Self {
        Self::with_base_url("https://query1.finance.yahoo.com", timezone)
    }

    pub fn with_base_url(base_url: &str, timezone: Tz) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .unwrap_or_default();
        Self {
            name: "Yahoo Finance".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timezone,
            client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> CmResult<T> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::LoadingFailed {
                message: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(DataError::LoadingFailed {
                message: format!("HTTP error: {}", response.status()),
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            DataError::ParseError {
                message: format!("Failed to parse JSON response: {}", e),
            }
            .into()
        })
    }

    /// Last non-null close in a chart response, with its session date.
    fn latest_close(&self, chart: YahooChartData) -> Option<(NaiveDate, f64)> {
        let closes = chart.indicators.quote.into_iter().next()?.close;
        chart
            .timestamp
            .iter()
            .zip(closes)
            .filter_map(|(&ts, close)| {
                let close = close?;
                let session = DateTime::from_timestamp(ts, 0)?
                    .with_timezone(&self.timezone)
                    .date_naive();
                Some((session, close))
            })
            .last()
    }

    fn convert_option_quote(&self, data: &YahooOptionData) -> OptionQuote {
        let to_dec = |v: Option<f64>| v.and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO);
        OptionQuote {
            bid: to_dec(data.bid),
            ask: to_dec(data.ask),
            volume: data.volume.and_then(|v| u64::try_from(v).ok()),
            open_interest: data.open_interest.and_then(|v| u64::try_from(v).ok()),
            implied_volatility: data.implied_volatility,
            timestamp: Utc::now().with_timezone(&self.timezone).fixed_offset(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn spot_price(&mut self, symbol: &Symbol) -> CmResult<SpotQuote> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=2d&interval=1d",
            self.base_url, symbol.symbol
        );
        let response: YahooChartResponse = self.get_json(&url).await?;

        let chart = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let (session, close) = self.latest_close(chart).ok_or_else(|| DataError::LoadingFailed {
            message: format!("No {} price data available", symbol.symbol),
        })?;

        let price = Decimal::from_f64(close).ok_or_else(|| DataError::ParseError {
            message: format!("Invalid close price {} for {}", close, symbol.symbol),
        })?;

        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        if session == today {
            tracing::info!("{} close for {}: ${:.2}", symbol.symbol, session, price);
        } else {
            tracing::info!(
                "{} latest close ({}): ${:.2} (today's close not yet available)",
                symbol.symbol,
                session,
                price
            );
        }

        Ok(SpotQuote {
            symbol: symbol.clone(),
            price,
            session,
        })
    }

    async fn option_quote(
        &mut self,
        symbol: &Symbol,
        kind: OptionKind,
        strike: Decimal,
        expiration: NaiveDate,
    ) -> CmResult<OptionQuote> {
        // Yahoo keys expirations by midnight UTC of the expiry date
        let expiry_ts = expiration
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| DataError::InvalidFormat {
                message: format!("Invalid expiration {}", expiration),
            })?;

        let url = format!(
            "{}/v7/finance/options/{}?date={}",
            self.base_url, symbol.symbol, expiry_ts
        );
        let response: YahooOptionsResponse = self.get_json(&url).await?;

        let not_found = || DataError::SymbolNotFound {
            symbol: contract_id(symbol, kind, strike, expiration),
        };

        let chain = response
            .option_chain
            .result
            .into_iter()
            .next()
            .and_then(|r| r.options.into_iter().next())
            .ok_or_else(not_found)?;

        let side = match kind {
            OptionKind::Call => &chain.calls,
            OptionKind::Put => &chain.puts,
        };

        let data = side
            .iter()
            .find(|o| o.strike.and_then(Decimal::from_f64) == Some(strike))
            .ok_or_else(not_found)?;

        Ok(self.convert_option_quote(data))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// Yahoo Finance API response structures

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartData>>,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChain,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChain {
    result: Vec<YahooOptionChainData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChainData {
    options: Vec<YahooOptions>,
}

#[derive(Debug, Deserialize)]
struct YahooOptions {
    #[serde(default)]
    calls: Vec<YahooOptionData>,
    #[serde(default)]
    puts: Vec<YahooOptionData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionData {
    strike: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    volume: Option<i64>,
    #[serde(rename = "openInterest")]
    open_interest: Option<i64>,
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
}

/// Recorded market state, as read by [`SnapshotFileProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Missing spot makes every run fail, as an unreachable feed would.
    #[serde(default)]
    pub spot: Option<SpotEntry>,
    #[serde(default)]
    pub quotes: Vec<QuoteEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotEntry {
    pub price: Decimal,
    pub session: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEntry {
    #[serde(default)]
    pub kind: OptionKind,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    #[serde(flatten)]
    pub quote: OptionQuote,
}

/// Serves quotes from a recorded snapshot, for offline runs and tests.
#[derive(Debug)]
pub struct SnapshotFileProvider {
    pub name: String,
    snapshot: SnapshotFile,
}

impl SnapshotFileProvider {
    pub fn new(snapshot: SnapshotFile) -> Self {
        Self {
            name: "Snapshot File".to_string(),
            snapshot,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CmResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::SourceNotFound(path.to_string_lossy().to_string()).into());
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: SnapshotFile = serde_json::from_str(&content)?;
        tracing::info!(
            "Loaded snapshot with {} quotes from {}",
            snapshot.quotes.len(),
            path.display()
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotFileProvider {
    async fn spot_price(&mut self, symbol: &Symbol) -> CmResult<SpotQuote> {
        let spot = self.snapshot.spot.as_ref().ok_or_else(|| DataError::LoadingFailed {
            message: format!("No {} price data available", symbol.symbol),
        })?;
        Ok(SpotQuote {
            symbol: symbol.clone(),
            price: spot.price,
            session: spot.session,
        })
    }

    async fn option_quote(
        &mut self,
        symbol: &Symbol,
        kind: OptionKind,
        strike: Decimal,
        expiration: NaiveDate,
    ) -> CmResult<OptionQuote> {
        self.snapshot
            .quotes
            .iter()
            .find(|q| q.kind == kind && q.strike == strike && q.expiration == expiration)
            .map(|q| q.quote.clone())
            .ok_or_else(|| {
                DataError::SymbolNotFound {
                    symbol: contract_id(symbol, kind, strike, expiration),
                }
                .into()
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
