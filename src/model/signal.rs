use serde::Serialize;

/// Direction of a short/long SMA crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendSignal {
    Uptrend,
    Downtrend,
}

impl TrendSignal {
    pub fn label(self) -> &'static str {
        match self {
            Self::Uptrend => "Uptrend",
            Self::Downtrend => "Downtrend",
        }
    }

    pub fn suggestion(self) -> &'static str {
        match self {
            Self::Uptrend => "buy opportunity",
            Self::Downtrend => "consider selling",
        }
    }
}

/// One message for the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub symbol: String,
    pub signal: TrendSignal,
    pub subject: String,
    pub message: String,
}

impl Alert {
    pub fn new(symbol: &str, signal: TrendSignal) -> Self {
        let message = match signal {
            TrendSignal::Uptrend => format!(
                "{} is in an {}! Consider a {}.",
                symbol,
                signal.label(),
                signal.suggestion()
            ),
            TrendSignal::Downtrend => {
                format!("{} is in a {}! Consider selling.", symbol, signal.label())
            }
        };
        Self {
            symbol: symbol.to_string(),
            signal,
            subject: format!("Stock Alert: {}", symbol),
            message,
        }
    }
}
