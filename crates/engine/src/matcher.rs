use chrono::{DateTime, Utc};
use core_types::{Position, PositionState, Symbol, TradeMode};
use ledger::{LedgerStore, RowId};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Realized profit is reported in whole quote-currency cents.
const PROFIT_DECIMALS: u32 = 2;

/// The outcome of matching a close signal: which row closed and at what
/// profit.
#[derive(Debug, Clone)]
pub struct ClosedMatch {
    pub row_id: RowId,
    pub position: Position,
    pub profit: Decimal,
}

/// The Position Matching Engine.
///
/// Given a signal and the ledger contents, decides the ledger effect:
/// either a new open position or the close of an existing one. Performs
/// no exchange calls; the executor owns those and the per-key critical
/// section both of these run inside.
#[derive(Debug, Clone)]
pub struct PositionMatcher {
    /// Lot step used when the exchange metadata has none for a symbol.
    fallback_lot_step: Decimal,
}

impl PositionMatcher {
    pub fn new(fallback_lot_step: Decimal) -> Self {
        Self { fallback_lot_step }
    }

    /// Floors a raw base quantity to the symbol's lot step.
    ///
    /// Exchanges reject orders whose quantity is not a multiple of the
    /// step, so the floor is applied before any order is sized.
    pub fn quantity_for(
        &self,
        notional: Decimal,
        price: Decimal,
        lot_step: Option<Decimal>,
    ) -> Decimal {
        let step = lot_step.unwrap_or(self.fallback_lot_step);
        let raw = notional / price;
        if step <= Decimal::ZERO {
            return raw;
        }
        (raw / step).floor() * step
    }

    /// `(close − open) × quantity`, rounded to cents.
    pub fn realized_profit(
        open_price: Decimal,
        close_price: Decimal,
        quantity: Decimal,
    ) -> Decimal {
        ((close_price - open_price) * quantity).round_dp(PROFIT_DECIMALS)
    }

    /// Creates a new open position and appends it to the ledger.
    ///
    /// No matching is involved; an open signal always creates a fresh
    /// row, even when other opens exist for the same key.
    pub async fn resolve_open(
        &self,
        ledger: &dyn LedgerStore,
        symbol: &Symbol,
        mode: TradeMode,
        notional: Decimal,
        price: Decimal,
        lot_step: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<(RowId, Position)> {
        let position = Position {
            symbol: symbol.clone(),
            state: PositionState::Open,
            mode,
            opened_at: now,
            open_price: price,
            notional,
            quantity: self.quantity_for(notional, price, lot_step),
            closed_at: None,
            close_price: None,
            realized_profit: None,
            review_note: None,
        };

        let row_id = ledger.append(&position).await?;
        tracing::info!(
            %symbol,
            ?mode,
            row_id,
            price = %price,
            quantity = %position.quantity,
            "Opened position in ledger."
        );

        Ok((row_id, position))
    }

    /// Matches and closes the most-recently-opened open position for
    /// `(symbol, mode)`.
    ///
    /// The newest open is the one the signal source almost always means:
    /// strategies emit open/close pairs in sequence, so an older open is
    /// more likely an abandoned position than the intended match. The
    /// lookup and the close write rely on the caller-held key lock to
    /// form one critical section; the store's close-once guard backstops
    /// it.
    pub async fn resolve_close(
        &self,
        ledger: &dyn LedgerStore,
        symbol: &Symbol,
        mode: TradeMode,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ClosedMatch> {
        let (row_id, mut position) = ledger
            .latest_open(symbol, mode)
            .await?
            .ok_or_else(|| Error::NoOpenPosition {
                symbol: symbol.clone(),
                mode,
            })?;

        let profit = Self::realized_profit(position.open_price, price, position.quantity);

        match ledger.close(row_id, now, price, profit).await {
            Ok(()) => {}
            // Lost a race that the key lock should have prevented; report
            // it the same way as finding no open row.
            Err(ledger::Error::AlreadyClosed(_)) => {
                return Err(Error::NoOpenPosition {
                    symbol: symbol.clone(),
                    mode,
                });
            }
            Err(e) => return Err(e.into()),
        }

        position.state = PositionState::Closed;
        position.closed_at = Some(now);
        position.close_price = Some(price);
        position.realized_profit = Some(profit);

        tracing::info!(
            %symbol,
            ?mode,
            row_id,
            close_price = %price,
            profit = %profit,
            "Closed position in ledger."
        );

        Ok(ClosedMatch {
            row_id,
            position,
            profit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use ledger::MemoryLedger;
    use rust_decimal_macros::dec;

    fn matcher() -> PositionMatcher {
        PositionMatcher::new(dec!(0.000001))
    }

    fn btc() -> Symbol {
        Symbol("BTCUSDT".to_string())
    }

    #[test]
    fn quantity_floors_to_lot_step() {
        let m = matcher();
        // 1000 / 61234.5 = 0.016330...; floored to step 0.0001.
        assert_eq!(
            m.quantity_for(dec!(1000), dec!(61234.5), Some(dec!(0.0001))),
            dec!(0.0163)
        );
    }

    #[test]
    fn quantity_uses_fallback_step_without_metadata() {
        let m = matcher();
        let quantity = m.quantity_for(dec!(1000), dec!(3), None);
        // 333.333... floored to the 1e-6 fallback step.
        assert_eq!(quantity, dec!(333.333333));
    }

    #[test]
    fn profit_is_rounded_to_cents() {
        assert_eq!(
            PositionMatcher::realized_profit(dec!(100), dec!(110), dec!(10)),
            dec!(100.00)
        );
        assert_eq!(
            PositionMatcher::realized_profit(dec!(3.117), dec!(3.119), dec!(7.5)),
            dec!(0.02)
        );
        // Losses come out negative, not clamped.
        assert_eq!(
            PositionMatcher::realized_profit(dec!(110), dec!(100), dec!(10)),
            dec!(-100.00)
        );
    }

    #[tokio::test]
    async fn resolve_open_appends_an_open_row() {
        let ledger = MemoryLedger::new();
        let (row_id, position) = matcher()
            .resolve_open(
                &ledger,
                &btc(),
                TradeMode::Live,
                dec!(1000),
                dec!(100),
                Some(dec!(0.01)),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.state, PositionState::Open);
        assert_eq!(ledger.get(row_id).unwrap(), position);
    }

    #[tokio::test]
    async fn resolve_close_matches_most_recent_open() {
        let ledger = MemoryLedger::new();
        let m = matcher();
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::seconds(30);

        let (stale_id, _) = m
            .resolve_open(&ledger, &btc(), TradeMode::Live, dec!(1000), dec!(100), None, t0)
            .await
            .unwrap();
        let (recent_id, _) = m
            .resolve_open(&ledger, &btc(), TradeMode::Live, dec!(1000), dec!(105), None, t1)
            .await
            .unwrap();

        let closed = m
            .resolve_close(&ledger, &btc(), TradeMode::Live, dec!(110), Utc::now())
            .await
            .unwrap();

        assert_eq!(closed.row_id, recent_id);
        // The older open is untouched.
        assert!(ledger.get(stale_id).unwrap().is_open());
    }

    #[tokio::test]
    async fn resolve_close_without_open_position_fails() {
        let ledger = MemoryLedger::new();
        let result = matcher()
            .resolve_close(&ledger, &btc(), TradeMode::Live, dec!(110), Utc::now())
            .await;

        assert!(matches!(result, Err(Error::NoOpenPosition { .. })));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn resolve_close_ignores_other_mode() {
        let ledger = MemoryLedger::new();
        let m = matcher();

        m.resolve_open(
            &ledger,
            &btc(),
            TradeMode::Live,
            dec!(1000),
            dec!(100),
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        // A simulated close must not touch the live position.
        let result = m
            .resolve_close(&ledger, &btc(), TradeMode::Simulated, dec!(110), Utc::now())
            .await;
        assert!(matches!(result, Err(Error::NoOpenPosition { .. })));

        let (_, live) = ledger
            .latest_open(&btc(), TradeMode::Live)
            .await
            .unwrap()
            .unwrap();
        assert!(live.is_open());
    }

    #[tokio::test]
    async fn close_sets_all_close_fields_together() {
        let ledger = MemoryLedger::new();
        let m = matcher();

        let (row_id, _) = m
            .resolve_open(
                &ledger,
                &btc(),
                TradeMode::Simulated,
                dec!(1000),
                dec!(100),
                None,
                Utc::now(),
            )
            .await
            .unwrap();

        let closed = m
            .resolve_close(&ledger, &btc(), TradeMode::Simulated, dec!(110), Utc::now())
            .await
            .unwrap();
        assert_eq!(closed.profit, dec!(100.00));

        let stored = ledger.get(row_id).unwrap();
        assert_eq!(stored.state, PositionState::Closed);
        assert!(stored.closed_at.is_some());
        assert_eq!(stored.close_price, Some(dec!(110)));
        assert_eq!(stored.realized_profit, Some(dec!(100.00)));
    }
}
