use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A trading pair symbol on the exchange (e.g., "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a signal asks the system to do with a position.
///
/// The alert source calls these "buy" and "sell"; internally a buy opens
/// a position and a sell closes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Open,
    Close,
}

/// Whether a signal results in real exchange orders or is ledger-only.
///
/// Set once at position creation and immutable thereafter. Simulated and
/// live positions for the same symbol never match against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Live,
    Simulated,
}

/// An inbound trading instruction, already authenticated and parsed by the
/// signal gateway. Transient; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub side: SignalSide,
    /// Quote-currency amount to commit. Required (and > 0) for Open signals.
    pub notional: Option<Decimal>,
    pub mode: TradeMode,
}

impl Signal {
    /// Validates the signal before any gateway call is made.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.0.trim().is_empty() {
            return Err(Error::InvalidSignal {
                reason: "symbol must be non-empty".to_string(),
            });
        }
        if self.side == SignalSide::Open {
            match self.notional {
                Some(amount) if amount > Decimal::ZERO => {}
                Some(amount) => {
                    return Err(Error::InvalidSignal {
                        reason: format!("notional amount must be positive, got {amount}"),
                    });
                }
                None => {
                    return Err(Error::InvalidSignal {
                        reason: "open signal requires a notional amount".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Lifecycle state of a position. A position transitions Open -> Closed
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    Open,
    Closed,
}

/// A ledger record spanning one open-to-close trade cycle.
///
/// `close_price`, `closed_at` and `realized_profit` are set together,
/// atomically with the state flag, and never modified afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub state: PositionState,
    pub mode: TradeMode,
    pub opened_at: DateTime<Utc>,
    pub open_price: Decimal,
    /// Quote-currency amount committed at open.
    pub notional: Decimal,
    /// Base-asset quantity, floored to the exchange lot step at open.
    pub quantity: Decimal,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_price: Option<Decimal>,
    pub realized_profit: Option<Decimal>,
    /// Set permanently when an exchange order failed after the ledger was
    /// already written; flags the row for manual reconciliation.
    pub review_note: Option<String>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.state == PositionState::Open
    }
}

/// What the executor actually did for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A new position was opened (and, in live mode, a buy order filled).
    Opened,
    /// An existing position was closed (and, in live mode, a sell order filled).
    Closed,
}

/// The structured result of handling one signal, returned to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub symbol: Symbol,
    pub side: SignalSide,
    pub mode: TradeMode,
    pub outcome: Outcome,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Realized profit in quote currency; present only for closes.
    pub profit: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_signal(notional: Option<Decimal>) -> Signal {
        Signal {
            symbol: Symbol("BTCUSDT".to_string()),
            side: SignalSide::Open,
            notional,
            mode: TradeMode::Live,
        }
    }

    #[test]
    fn open_signal_requires_positive_notional() {
        assert!(open_signal(Some(dec!(100))).validate().is_ok());
        assert!(open_signal(Some(dec!(0))).validate().is_err());
        assert!(open_signal(Some(dec!(-5))).validate().is_err());
        assert!(open_signal(None).validate().is_err());
    }

    #[test]
    fn close_signal_needs_no_notional() {
        let signal = Signal {
            symbol: Symbol("ETHUSDT".to_string()),
            side: SignalSide::Close,
            notional: None,
            mode: TradeMode::Simulated,
        };
        assert!(signal.validate().is_ok());
    }

    #[test]
    fn blank_symbol_is_rejected() {
        let signal = Signal {
            symbol: Symbol("  ".to_string()),
            side: SignalSide::Close,
            notional: None,
            mode: TradeMode::Live,
        };
        assert!(matches!(
            signal.validate(),
            Err(Error::InvalidSignal { .. })
        ));
    }
}
