pub mod config;
pub mod enrich;
pub mod logging;

pub use config::*;
pub use enrich::*;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::Instrument;
use uuid::Uuid;

use cm_data::{AppendReport, HistoryStore, MarketDataProvider, MarketStatus, TradingCalendar};
use cm_options::OptionContract;
use cm_types::{config_error, CmError, CmResult, MarketSnapshot, Record, SpotQuote};

/// What a single collection run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// Calendar says the exchange is shut; nothing fetched.
    MarketClosed { date: NaiveDate, status: MarketStatus },
    /// Every contract failed; the history file was not touched.
    NoData { skipped: Vec<SkippedContract> },
    Collected(RunSummary),
}

/// A contract that was dropped from this run, and why.
#[derive(Debug)]
pub struct SkippedContract {
    pub contract: OptionContract,
    pub error: CmError,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub spot: SpotQuote,
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedContract>,
    pub report: AppendReport,
    /// Whether the publication copy was refreshed.
    pub mirrored: bool,
}

impl RunSummary {
    /// Combined dollar return of the contracts collected this run.
    pub fn total_return(&self) -> Decimal {
        self.records.iter().map(|r| r.total_return).sum()
    }

    pub fn observed_at(&self) -> Option<DateTime<FixedOffset>> {
        self.records.iter().map(|r| r.timestamp).max()
    }
}

/// Runs one fetch → price → reconcile pass over the configured contracts.
#[derive(Debug)]
pub struct Collector {
    config: MonitorConfig,
    timezone: Tz,
    provider: Box<dyn MarketDataProvider>,
    calendar: Box<dyn TradingCalendar>,
    store: HistoryStore,
    ignore_calendar: bool,
}

impl Collector {
    pub fn new(
        config: MonitorConfig,
        provider: Box<dyn MarketDataProvider>,
        calendar: Box<dyn TradingCalendar>,
    ) -> CmResult<Self> {
        config.validate()?;
        let timezone = config.tz()?;
        let store = HistoryStore::new(&config.data_file, timezone);
        Ok(Self {
            config,
            timezone,
            provider,
            calendar,
            store,
            ignore_calendar: false,
        })
    }

    /// Collect even when the calendar reports the market closed.
    pub fn ignore_calendar(mut self, ignore: bool) -> Self {
        self.ignore_calendar = ignore;
        self
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Collect and persist one snapshot per contract for `today`.
    ///
    /// Per-contract failures are skipped. Failing to price the underlying,
    /// or to read or write the history file, fails the run.
    pub async fn run(&mut self, today: NaiveDate) -> CmResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        self.run_inner(run_id, today).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid, today: NaiveDate) -> CmResult<RunOutcome> {
        let status = self.calendar.status(today);
        tracing::info!("Market status: {}", status.describe(today));
        if !status.is_open() {
            if self.ignore_calendar {
                tracing::warn!("Market closed on {}, collecting anyway", today);
            } else {
                tracing::info!("Exiting: not a trading day");
                return Ok(RunOutcome::MarketClosed { date: today, status });
            }
        } else if !self.calendar.covers(today) {
            if self.ignore_calendar {
                tracing::warn!("No holidays configured for {}, collecting anyway", today);
            } else {
                tracing::error!(
                    "No holidays configured for {}; cannot tell if it is a trading day",
                    today
                );
                return Err(config_error!(
                    "holiday calendar does not cover {}; add that year's closures to the config",
                    today
                ));
            }
        }

        let symbol = self.config.symbol();
        let spot = self.provider.spot_price(&symbol).await.map_err(|e| {
            tracing::error!(
                "Error fetching {} price from {}: {}",
                symbol.symbol,
                self.provider.name(),
                e
            );
            e
        })?;

        let mut records = Vec::with_capacity(self.config.contracts.len());
        let mut skipped = Vec::new();
        let contracts = self.config.contracts.clone();

        for contract in contracts {
            tracing::info!("Processing {}", contract);
            match self.process_contract(&contract, &spot).await {
                Ok(record) => {
                    tracing::info!(
                        "Success: {} - market ${:.2}, return ${:.0} ({:.1}%)",
                        contract,
                        record.market_price,
                        record.total_return,
                        record.return_percentage
                    );
                    records.push(record);
                }
                Err(error) => {
                    tracing::warn!("Skipping {}: {}", contract, error);
                    skipped.push(SkippedContract { contract, error });
                }
            }
        }

        if records.is_empty() {
            tracing::warn!("No option data collected");
            return Ok(RunOutcome::NoData { skipped });
        }

        let report = self.store.append(records.clone())?;

        let mirrored = match &self.config.mirror_file {
            Some(mirror) => match self.store.mirror_to(mirror) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to mirror history to {}: {}", mirror.display(), e);
                    false
                }
            },
            None => false,
        };

        let summary = RunSummary {
            run_id,
            spot,
            records,
            skipped,
            report,
            mirrored,
        };
        self.log_summary(&summary);
        Ok(RunOutcome::Collected(summary))
    }

    async fn process_contract(
        &mut self,
        contract: &OptionContract,
        spot: &SpotQuote,
    ) -> CmResult<Record> {
        contract.validate()?;
        let quote = self
            .provider
            .option_quote(&spot.symbol, contract.kind, contract.strike, contract.expiration)
            .await?;
        tracing::debug!(
            "{}: bid ${} ask ${} iv {:?}",
            contract,
            quote.bid,
            quote.ask,
            quote.implied_volatility
        );

        let snapshot = MarketSnapshot {
            underlying_price: spot.price,
            quote,
        };
        build_record(
            contract,
            &snapshot,
            self.config.risk_free_rate,
            self.config.contract_multiplier,
            self.timezone,
        )
    }

    fn log_summary(&self, summary: &RunSummary) {
        tracing::info!("=== Portfolio Summary ===");
        tracing::info!("Total Return: ${:.0}", summary.total_return());
        tracing::info!("{} Price: ${:.2}", summary.spot.symbol.symbol, summary.spot.price);
        if let Some(ts) = summary.observed_at() {
            tracing::info!(
                "Timestamp: {}",
                ts.with_timezone(&self.timezone).format("%Y-%m-%d %I:%M %p %Z")
            );
        }
        tracing::info!(
            "Rows in history: {} ({} contracts skipped)",
            summary.report.total,
            summary.skipped.len()
        );
    }
}
