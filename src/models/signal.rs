use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Call,
    Put,
    Neutral,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Call => write!(f, "CALL"),
            SignalAction::Put => write!(f, "PUT"),
            SignalAction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

impl SignalAction {
    pub fn is_actionable(&self) -> bool {
        !matches!(self, SignalAction::Neutral)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalOutcome {
    #[default]
    Pending,
    Win,
    Loss,
}

impl fmt::Display for SignalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalOutcome::Pending => write!(f, "PENDING"),
            SignalOutcome::Win => write!(f, "WIN"),
            SignalOutcome::Loss => write!(f, "LOSS"),
        }
    }
}

/// One signal produced by the backend. The client only reads these;
/// `timestamp` (unix seconds) doubles as the dedup key when the same
/// `last_signal` arrives on consecutive polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub pair: String,
    pub action: SignalAction,
    /// Percentage in [0, 100].
    pub confidence: f64,
    /// Unix seconds, fractional (the backend emits `time.time()` floats).
    pub timestamp: f64,
    #[serde(default)]
    pub status: SignalOutcome,
}

impl SignalEvent {
    pub fn headline(&self) -> String {
        format!("{} Signal Detected!", self.action)
    }

    pub fn body(&self) -> String {
        format!(
            "{}: {} Signal with {:.1}% confidence.",
            self.pair, self.action, self.confidence
        )
    }

    /// RFC 3339 rendering of `timestamp`, or the raw float when it is out
    /// of chrono's representable range.
    pub fn time_rfc3339(&self) -> String {
        let secs = self.timestamp as i64;
        let nanos = ((self.timestamp - secs as f64) * 1e9) as u32;
        match DateTime::from_timestamp(secs, nanos) {
            Some(dt) => dt.to_rfc3339(),
            None => format!("{}", self.timestamp),
        }
    }
}

/// Request body for the one-shot `/analyze` scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub pair: String,
    /// Candle timeframe in minutes.
    pub timeframe: u32,
    pub strategy: String,
}
