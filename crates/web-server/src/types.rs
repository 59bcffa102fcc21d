use core_types::{Position, Signal, SignalSide, Symbol, TradeMode};
use ledger::RowId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The wire shape the alert source POSTs to `/webhook`.
///
/// This matches the alerting convention: `action` is `"buy"` or `"sell"`,
/// `amount` is the quote-currency notional, and `testing: "yes"` asks for
/// a ledger-only simulated trade.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub secret: String,
    pub symbol: String,
    pub action: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub testing: Option<String>,
}

impl WebhookPayload {
    /// Maps the wire payload onto the internal signal shape.
    pub fn into_signal(self) -> Result<Signal> {
        let side = match self.action.to_lowercase().as_str() {
            "buy" => SignalSide::Open,
            "sell" => SignalSide::Close,
            other => {
                return Err(Error::Engine(engine::Error::InvalidSignal {
                    reason: format!("unknown action '{other}', expected buy or sell"),
                }));
            }
        };

        let mode = match self.testing.as_deref() {
            Some(flag) if flag.eq_ignore_ascii_case("yes") => TradeMode::Simulated,
            _ => TradeMode::Live,
        };

        Ok(Signal {
            symbol: Symbol(self.symbol),
            side,
            notional: self.amount,
            mode,
        })
    }
}

/// A ledger row as served by `GET /api/positions`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiPosition {
    pub id: RowId,
    #[serde(flatten)]
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload(action: &str, testing: Option<&str>) -> WebhookPayload {
        WebhookPayload {
            secret: "s3cret".to_string(),
            symbol: "BTCUSDT".to_string(),
            action: action.to_string(),
            amount: Some(dec!(250)),
            testing: testing.map(str::to_string),
        }
    }

    #[test]
    fn buy_maps_to_open_live() {
        let signal = payload("buy", None).into_signal().unwrap();
        assert_eq!(signal.side, SignalSide::Open);
        assert_eq!(signal.mode, TradeMode::Live);
        assert_eq!(signal.notional, Some(dec!(250)));
    }

    #[test]
    fn sell_with_testing_yes_maps_to_close_simulated() {
        let signal = payload("SELL", Some("Yes")).into_signal().unwrap();
        assert_eq!(signal.side, SignalSide::Close);
        assert_eq!(signal.mode, TradeMode::Simulated);
    }

    #[test]
    fn testing_no_means_live() {
        let signal = payload("buy", Some("no")).into_signal().unwrap();
        assert_eq!(signal.mode, TradeMode::Live);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result = payload("hold", None).into_signal();
        assert!(matches!(
            result,
            Err(Error::Engine(engine::Error::InvalidSignal { .. }))
        ));
    }

    #[test]
    fn amount_accepts_string_or_number() {
        let json = r#"{"secret":"s","symbol":"BTCUSDT","action":"buy","amount":"99.5"}"#;
        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.amount, Some(dec!(99.5)));

        let json = r#"{"secret":"s","symbol":"BTCUSDT","action":"buy","amount":99.5}"#;
        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.amount, Some(dec!(99.5)));
    }
}
