use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Overflow;
use crate::indicator::sma::{has_enough, sma};
use crate::invocation::InvocationStatus;
use crate::model::signal::{Alert, TrendSignal};
use crate::model::tick::sort_key_for;
use crate::model::window::TrendWindow;
use crate::notify::Notifier;
use crate::tick_store::TickStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSettings {
    pub symbols: Vec<String>,
    pub short_period: usize,
    pub long_period: usize,
    /// Trailing span of history loaded per evaluation.
    pub window: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string()],
            short_period: 5,
            long_period: 20,
            window: Duration::from_secs(5 * 60),
        }
    }
}

impl DetectorSettings {
    /// Fewest points that allow a crossover evaluation.
    pub fn min_points(&self) -> usize {
        self.short_period.max(self.long_period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaPair {
    pub short: Decimal,
    pub long: Decimal,
}

impl SmaPair {
    fn at(prices: &[Decimal], short_period: usize, long_period: usize) -> Result<Self, Overflow> {
        Ok(Self {
            short: sma(prices, short_period)?,
            long: sma(prices, long_period)?,
        })
    }
}

/// Short/long SMAs at the latest point and one point earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverEvaluation {
    pub previous: SmaPair,
    pub current: SmaPair,
}

impl CrossoverEvaluation {
    pub fn new(
        prices: &[Decimal],
        short_period: usize,
        long_period: usize,
    ) -> Result<Self, Overflow> {
        let previous = &prices[..prices.len().saturating_sub(1)];
        Ok(Self {
            previous: SmaPair::at(previous, short_period, long_period)?,
            current: SmaPair::at(prices, short_period, long_period)?,
        })
    }

    pub fn signal(&self) -> Option<TrendSignal> {
        let (prev, now) = (self.previous, self.current);
        if prev.short < prev.long && now.short > now.long {
            Some(TrendSignal::Uptrend)
        } else if prev.short > prev.long && now.short < now.long {
            Some(TrendSignal::Downtrend)
        } else {
            None
        }
    }
}

/// Crossover between the previous and current point of `prices` (oldest first).
///
/// Never fires with fewer than `max(short_period, long_period)` prices.
pub fn detect_crossover(
    prices: &[Decimal],
    short_period: usize,
    long_period: usize,
) -> Result<Option<TrendSignal>, Overflow> {
    if !has_enough(prices, short_period.max(long_period)) {
        return Ok(None);
    }
    Ok(CrossoverEvaluation::new(prices, short_period, long_period)?.signal())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    InsufficientData { points: usize },
    /// Store read failed; treated as an empty window.
    RetrievalFailed { reason: String },
    /// Averages could not be computed over the stored prices.
    EvaluationFailed { reason: String },
    NoSignal,
    Alerted(TrendSignal),
    PublishFailed { signal: TrendSignal, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct TrendOutcome {
    pub symbols: Vec<(String, SymbolOutcome)>,
}

impl TrendOutcome {
    pub fn alerts(&self) -> Vec<(&str, TrendSignal)> {
        self.symbols
            .iter()
            .filter_map(|(symbol, o)| match o {
                SymbolOutcome::Alerted(signal) => Some((symbol.as_str(), *signal)),
                _ => None,
            })
            .collect()
    }

    pub fn outcome_for(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }

    pub fn status(&self) -> InvocationStatus {
        InvocationStatus::ok("Trend analysis complete")
    }
}

pub struct TrendDetector<S, N> {
    store: S,
    notifier: N,
    settings: DetectorSettings,
}

impl<S: TickStore, N: Notifier> TrendDetector<S, N> {
    pub fn new(store: S, notifier: N, settings: DetectorSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn run(&self) -> TrendOutcome {
        self.run_at(Utc::now())
    }

    pub fn run_at(&self, now: DateTime<Utc>) -> TrendOutcome {
        let invocation_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("trend", %invocation_id);
        let _enter = span.enter();

        let window = chrono::Duration::from_std(self.settings.window)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let threshold = sort_key_for(now - window);

        let symbols = self
            .settings
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.evaluate_symbol(symbol, &threshold)))
            .collect();
        let outcome = TrendOutcome { symbols };

        tracing::info!(
            symbols = outcome.symbols.len(),
            alerts = outcome.alerts().len(),
            since = %threshold,
            "Trend analysis complete"
        );
        outcome
    }

    fn evaluate_symbol(&self, symbol: &str, threshold: &str) -> SymbolOutcome {
        let records = match self.store.query_since(symbol, threshold) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Failed to fetch recent ticks");
                return SymbolOutcome::RetrievalFailed {
                    reason: e.to_string(),
                };
            }
        };

        let window = TrendWindow::new(records);
        if window.len() < self.settings.min_points() {
            tracing::debug!(symbol, points = window.len(), "Not enough ticks for crossover");
            return SymbolOutcome::InsufficientData {
                points: window.len(),
            };
        }

        let prices = window.prices();
        let eval = match CrossoverEvaluation::new(
            &prices,
            self.settings.short_period,
            self.settings.long_period,
        ) {
            Ok(eval) => eval,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Failed to evaluate SMA crossover");
                return SymbolOutcome::EvaluationFailed {
                    reason: e.to_string(),
                };
            }
        };
        tracing::debug!(
            symbol,
            short_now = %eval.current.short,
            long_now = %eval.current.long,
            short_prev = %eval.previous.short,
            long_prev = %eval.previous.long,
            "SMA crossover evaluated"
        );

        let Some(signal) = eval.signal() else {
            return SymbolOutcome::NoSignal;
        };

        let alert = Alert::new(symbol, signal);
        match self.notifier.publish(&alert) {
            Ok(()) => {
                tracing::info!(symbol, trend = signal.label(), "Trend alert published");
                SymbolOutcome::Alerted(signal)
            }
            Err(e) => {
                tracing::error!(symbol, trend = signal.label(), error = %e, "Failed to publish trend alert");
                SymbolOutcome::PublishFailed {
                    signal,
                    reason: e.to_string(),
                }
            }
        }
    }
}
