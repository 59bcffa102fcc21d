use chrono::Utc;
use core_types::{ExecutionReport, Outcome, Signal, SignalSide, TradeMode};
use ledger::{LedgerStore, RowId};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::locks::{KeyedLocks, LockKey};
use crate::matcher::PositionMatcher;
use crate::ExchangeGateway;

/// Sequences the side-effecting steps for one signal: price fetch,
/// ledger decision, live order, report. Guarantees the ledger ends up
/// consistent with what actually happened at the exchange, annotating
/// the affected row when the two diverge.
pub struct TradeExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    ledger: Arc<dyn LedgerStore>,
    matcher: PositionMatcher,
    locks: KeyedLocks,
    gateway_timeout: Duration,
}

impl TradeExecutor {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Arc<dyn LedgerStore>,
        matcher: PositionMatcher,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            ledger,
            matcher,
            locks: KeyedLocks::new(),
            gateway_timeout,
        }
    }

    /// The single entry point the signal gateway calls.
    ///
    /// Everything from the price fetch to the last ledger write runs
    /// under the `(symbol, mode)` lock, so concurrent or redelivered
    /// signals for the same key serialize instead of racing the ledger.
    pub async fn handle_signal(&self, signal: &Signal) -> Result<ExecutionReport> {
        signal.validate()?;

        let _guard = self
            .locks
            .acquire(LockKey {
                symbol: signal.symbol.clone(),
                mode: signal.mode,
            })
            .await;

        let price = self
            .with_timeout("price fetch", self.gateway.get_price(&signal.symbol))
            .await
            .map_err(|e| match e {
                timeout @ Error::GatewayTimeout { .. } => timeout,
                other => Error::PriceUnavailable {
                    symbol: signal.symbol.clone(),
                    reason: other.to_string(),
                },
            })?;

        // A zero or negative quote is a broken feed, not a tradable price.
        if price <= Decimal::ZERO {
            return Err(Error::PriceUnavailable {
                symbol: signal.symbol.clone(),
                reason: format!("exchange returned non-positive price {price}"),
            });
        }

        tracing::info!(
            symbol = %signal.symbol,
            side = ?signal.side,
            mode = ?signal.mode,
            price = %price,
            "Handling signal."
        );

        match signal.side {
            SignalSide::Open => self.execute_open(signal, price).await,
            SignalSide::Close => self.execute_close(signal, price).await,
        }
    }

    async fn execute_open(&self, signal: &Signal, price: Decimal) -> Result<ExecutionReport> {
        let notional = signal.notional.ok_or_else(|| Error::InvalidSignal {
            reason: "open signal requires a notional amount".to_string(),
        })?;

        // Metadata failures fall back to the configured step rather than
        // dropping the signal; only the order itself must not be guessed.
        let lot_step = match self
            .with_timeout("lot step lookup", self.gateway.get_lot_step(&signal.symbol))
            .await
        {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(
                    symbol = %signal.symbol,
                    error = %e,
                    "Lot step lookup failed; using fallback step."
                );
                None
            }
        };

        let (row_id, position) = self
            .with_timeout(
                "ledger append",
                self.matcher.resolve_open(
                    self.ledger.as_ref(),
                    &signal.symbol,
                    signal.mode,
                    notional,
                    price,
                    lot_step,
                    Utc::now(),
                ),
            )
            .await?;

        if signal.mode == TradeMode::Live {
            let buy = self
                .with_timeout(
                    "buy order",
                    self.gateway.place_market_buy(&signal.symbol, notional),
                )
                .await;
            match buy {
                Ok(fill_price) => {
                    tracing::info!(
                        symbol = %signal.symbol,
                        row_id,
                        fill_price = %fill_price,
                        "Buy order filled."
                    );
                }
                Err(e) => {
                    return Err(self
                        .flag_order_failure(signal, row_id, "buy order failed", e)
                        .await);
                }
            }
        }

        Ok(ExecutionReport {
            symbol: signal.symbol.clone(),
            side: SignalSide::Open,
            mode: signal.mode,
            outcome: Outcome::Opened,
            price,
            quantity: position.quantity,
            profit: None,
        })
    }

    async fn execute_close(&self, signal: &Signal, price: Decimal) -> Result<ExecutionReport> {
        let closed = self
            .with_timeout(
                "ledger close",
                self.matcher.resolve_close(
                    self.ledger.as_ref(),
                    &signal.symbol,
                    signal.mode,
                    price,
                    Utc::now(),
                ),
            )
            .await?;

        if signal.mode == TradeMode::Live {
            // Sell exactly what the matched position holds. The account's
            // free balance may include unrelated holdings or other open
            // positions, so it is never used for sizing.
            let sell = self
                .with_timeout(
                    "sell order",
                    self.gateway
                        .place_market_sell(&signal.symbol, closed.position.quantity),
                )
                .await;
            match sell {
                Ok(fill_price) => {
                    tracing::info!(
                        symbol = %signal.symbol,
                        row_id = closed.row_id,
                        fill_price = %fill_price,
                        profit = %closed.profit,
                        "Sell order filled."
                    );
                }
                Err(e) => {
                    // The ledger already recorded the close; it stays
                    // closed and flagged rather than being reopened.
                    return Err(self
                        .flag_order_failure(signal, closed.row_id, "sell order failed", e)
                        .await);
                }
            }
        }

        Ok(ExecutionReport {
            symbol: signal.symbol.clone(),
            side: SignalSide::Close,
            mode: signal.mode,
            outcome: Outcome::Closed,
            price,
            quantity: closed.position.quantity,
            profit: Some(closed.profit),
        })
    }

    /// Annotates a row whose exchange order failed after the ledger was
    /// written, then surfaces the divergence to the caller. The row is
    /// never deleted; it is the audit evidence of the failed trade.
    async fn flag_order_failure(
        &self,
        signal: &Signal,
        row_id: RowId,
        what: &str,
        cause: Error,
    ) -> Error {
        let note = format!("{what}: {cause}");
        tracing::error!(
            symbol = %signal.symbol,
            row_id,
            error = %cause,
            "Order failed after ledger write; flagging row for reconciliation."
        );
        let annotated = self
            .with_timeout("ledger annotate", async {
                self.ledger.annotate(row_id, &note).await.map_err(Error::from)
            })
            .await;
        if let Err(annotate_err) = annotated {
            tracing::error!(
                row_id,
                error = %annotate_err,
                "Failed to annotate ledger row after order failure."
            );
        }
        Error::OrderFailedAfterLedgerWrite {
            symbol: signal.symbol.clone(),
            row_id,
            reason: cause.to_string(),
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.gateway_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::GatewayTimeout {
                operation,
                seconds: self.gateway_timeout.as_secs(),
            }),
        }
    }
}
