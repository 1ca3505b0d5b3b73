use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::models::SignalEvent;

/// Most pairs a single session is allowed to scan, enforced client-side.
pub const MAX_PAIRS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    #[default]
    Practice,
    Real,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Practice => write!(f, "PRACTICE"),
            AccountType::Real => write!(f, "REAL"),
        }
    }
}

/// Snapshot of a remote session as reported by `GET /status/{identity}`.
///
/// Snapshots replace each other wholesale, last arrival wins. The backend
/// returns an all-zero inactive status for unknown identities, which is also
/// the `Default` here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStatus {
    pub active: bool,
    #[serde(default)]
    pub total_trades: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub consecutive_losses: u32,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub last_signal: Option<SignalEvent>,
    /// Most-recent-last.
    #[serde(default)]
    pub history: Vec<SignalEvent>,
}

impl SessionStatus {
    pub fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or("USD")
    }

    /// Invariant reported by the backend: settled trades never exceed totals.
    pub fn is_consistent(&self) -> bool {
        self.wins + self.losses <= self.total_trades
    }

    pub fn win_rate(&self) -> f64 {
        let settled = self.wins + self.losses;
        if settled == 0 {
            return 0.0;
        }
        self.wins as f64 / settled as f64 * 100.0
    }
}

/// Command payload for `POST /start`. The backend owns the running
/// configuration; this is only kept locally as last-used defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wire name kept from the original backend schema.
    #[serde(rename = "email")]
    pub identity: String,
    pub password: String,
    pub account_type: AccountType,
    pub pairs: Vec<String>,
    pub amount: f64,
    /// Minutes; 0 means "auto".
    pub timeframe: f64,
    pub strategy: String,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub max_consecutive_losses: u32,
    pub max_trades: u32,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pairs.is_empty() {
            return Err(ValidationError::NoPairs);
        }
        if self.pairs.len() > MAX_PAIRS {
            return Err(ValidationError::TooManyPairs(self.pairs.len()));
        }
        if !(self.amount > 0.0) {
            return Err(ValidationError::NotPositive { field: "amount" });
        }
        if !(self.timeframe >= 0.0) {
            return Err(ValidationError::Negative { field: "timeframe" });
        }
        if !(self.stop_loss >= 0.0) {
            return Err(ValidationError::Negative { field: "stop_loss" });
        }
        if !(self.take_profit >= 0.0) {
            return Err(ValidationError::Negative { field: "take_profit" });
        }
        if self.max_consecutive_losses < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "max_consecutive_losses",
                min: 1,
            });
        }
        if self.max_trades < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "max_trades",
                min: 1,
            });
        }
        Ok(())
    }

    /// Copy safe to persist as last-used defaults: credentials cleared.
    pub fn redacted(&self) -> Self {
        let mut saved = self.clone();
        saved.password.clear();
        saved
    }
}

/// The start form as the user types it: every numeric field is text until
/// parsed. A field that fails to parse is a validation error, never a silent
/// zero.
#[derive(Debug, Clone)]
pub struct SessionForm {
    pub password: String,
    pub account_type: AccountType,
    pub pairs: Vec<String>,
    pub amount: String,
    pub timeframe: String,
    pub strategy: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub max_consecutive_losses: String,
    pub max_trades: String,
}

impl Default for SessionForm {
    fn default() -> Self {
        // Defaults shown on the original start screen.
        Self {
            password: String::new(),
            account_type: AccountType::Practice,
            pairs: vec!["EURUSD-OTC".to_string()],
            amount: "1".to_string(),
            timeframe: "1".to_string(),
            strategy: "RSI Reversal".to_string(),
            stop_loss: "10".to_string(),
            take_profit: "20".to_string(),
            max_consecutive_losses: "3".to_string(),
            max_trades: "50".to_string(),
        }
    }
}

impl SessionForm {
    pub fn parse(&self, identity: &str) -> Result<SessionConfig, ValidationError> {
        let config = SessionConfig {
            identity: identity.to_string(),
            password: self.password.clone(),
            account_type: self.account_type,
            pairs: self.pairs.clone(),
            amount: parse_decimal("amount", &self.amount)?,
            timeframe: parse_decimal("timeframe", &self.timeframe)?,
            strategy: self.strategy.clone(),
            stop_loss: parse_decimal("stop_loss", &self.stop_loss)?,
            take_profit: parse_decimal("take_profit", &self.take_profit)?,
            max_consecutive_losses: parse_count("max_consecutive_losses", &self.max_consecutive_losses)?,
            max_trades: parse_count("max_trades", &self.max_trades)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn parse_count(field: &'static str, raw: &str) -> Result<u32, ValidationError> {
    raw.trim().parse().map_err(|_| ValidationError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_status_json_decodes() {
        // Shape returned by the backend for a running session.
        let json = r#"{
            "active": true,
            "total_trades": 12,
            "wins": 7,
            "losses": 4,
            "profit": 13.4,
            "consecutive_losses": 1,
            "balance": 213.4,
            "currency": "EUR",
            "last_signal": {"pair":"EURUSD-OTC","action":"PUT","confidence":64.0,"timestamp":1712345678.0}
        }"#;
        let status: SessionStatus = serde_json::from_str(json).unwrap();
        assert!(status.active);
        assert!(status.is_consistent());
        assert_eq!(status.currency(), "EUR");
        assert!(status.history.is_empty());
        assert_eq!(status.last_signal.unwrap().confidence, 64.0);
    }

    #[test]
    fn unknown_identity_status_defaults() {
        let status: SessionStatus = serde_json::from_str(r#"{"active": false}"#).unwrap();
        assert!(!status.active);
        assert_eq!(status.total_trades, 0);
        assert_eq!(status.currency(), "USD");
        assert_eq!(status.win_rate(), 0.0);
    }

    #[test]
    fn config_serializes_identity_as_email() {
        let config = SessionForm::default().parse("anon_1_2").unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"email\":\"anon_1_2\""));
        assert!(json.contains("\"account_type\":\"PRACTICE\""));
    }

    #[test]
    fn form_parses_screen_defaults() {
        let config = SessionForm::default().parse("user@example.com").unwrap();
        assert_eq!(config.amount, 1.0);
        assert_eq!(config.timeframe, 1.0);
        assert_eq!(config.max_trades, 50);
        assert_eq!(config.pairs, vec!["EURUSD-OTC".to_string()]);
    }

    #[test]
    fn bad_numeric_input_is_rejected() {
        let mut form = SessionForm::default();
        form.amount = "ten".to_string();
        let err = form.parse("u").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumber { field: "amount", .. }));
    }

    #[test]
    fn empty_and_oversized_pair_sets_are_rejected() {
        let mut form = SessionForm::default();
        form.pairs.clear();
        assert!(matches!(form.parse("u").unwrap_err(), ValidationError::NoPairs));

        form.pairs = vec![
            "EURUSD-OTC".into(),
            "GBPUSD-OTC".into(),
            "EURJPY-OTC".into(),
            "AUDCAD-OTC".into(),
        ];
        assert!(matches!(
            form.parse("u").unwrap_err(),
            ValidationError::TooManyPairs(4)
        ));
    }

    #[test]
    fn zero_amount_is_rejected_but_zero_timeframe_means_auto() {
        let mut form = SessionForm::default();
        form.amount = "0".to_string();
        assert!(matches!(
            form.parse("u").unwrap_err(),
            ValidationError::NotPositive { field: "amount" }
        ));

        let mut form = SessionForm::default();
        form.timeframe = "0".to_string();
        assert_eq!(form.parse("u").unwrap().timeframe, 0.0);
    }

    #[test]
    fn redacted_copy_drops_credentials() {
        let mut form = SessionForm::default();
        form.password = "hunter2".to_string();
        let config = form.parse("u").unwrap();
        assert_eq!(config.redacted().password, "");
        assert_eq!(config.password, "hunter2");
    }
}
