use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Position, PositionState};
use rust_decimal::Decimal;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::{LedgerStore, PositionFilter, RowId};

/// An in-process ledger backed by a `Vec`.
///
/// Used by the engine tests and anywhere a durable store is not wanted.
/// Row ids are indices into the append-only vector, so they are stable
/// for the lifetime of the instance.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<Position>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a single row, mainly for test assertions.
    pub fn get(&self, row_id: RowId) -> Option<Position> {
        let rows = self.rows.lock().unwrap();
        rows.get(row_id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(&self, position: &Position) -> Result<RowId> {
        let mut rows = self.rows.lock().unwrap();
        rows.push(position.clone());
        Ok((rows.len() - 1) as RowId)
    }

    async fn scan_newest_first(&self, filter: &PositionFilter) -> Result<Vec<(RowId, Position)>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<(RowId, Position)> = rows
            .iter()
            .enumerate()
            .filter(|(_, p)| filter.matches(p))
            .map(|(i, p)| (i as RowId, p.clone()))
            .collect();
        // Newest opened first; row id breaks ties for same-instant opens.
        matched.sort_by(|a, b| {
            b.1.opened_at
                .cmp(&a.1.opened_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(matched)
    }

    async fn close(
        &self,
        row_id: RowId,
        closed_at: DateTime<Utc>,
        close_price: Decimal,
        realized_profit: Decimal,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let position = rows
            .get_mut(row_id as usize)
            .ok_or(Error::RowNotFound(row_id))?;
        if position.state != PositionState::Open {
            return Err(Error::AlreadyClosed(row_id));
        }
        position.state = PositionState::Closed;
        position.closed_at = Some(closed_at);
        position.close_price = Some(close_price);
        position.realized_profit = Some(realized_profit);
        Ok(())
    }

    async fn annotate(&self, row_id: RowId, note: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let position = rows
            .get_mut(row_id as usize)
            .ok_or(Error::RowNotFound(row_id))?;
        position.review_note = Some(note.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use core_types::{Symbol, TradeMode};
    use rust_decimal_macros::dec;

    fn open_position(symbol: &str, mode: TradeMode, opened_at: DateTime<Utc>) -> Position {
        Position {
            symbol: Symbol(symbol.to_string()),
            state: PositionState::Open,
            mode,
            opened_at,
            open_price: dec!(100),
            notional: dec!(1000),
            quantity: dec!(10),
            closed_at: None,
            close_price: None,
            realized_profit: None,
            review_note: None,
        }
    }

    #[tokio::test]
    async fn scan_returns_newest_open_first() {
        let ledger = MemoryLedger::new();
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::seconds(60);

        ledger
            .append(&open_position("BTCUSDT", TradeMode::Live, t0))
            .await
            .unwrap();
        let newer = ledger
            .append(&open_position("BTCUSDT", TradeMode::Live, t1))
            .await
            .unwrap();

        let (row_id, _) = ledger
            .latest_open(&Symbol("BTCUSDT".to_string()), TradeMode::Live)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row_id, newer);
    }

    #[tokio::test]
    async fn modes_are_isolated() {
        let ledger = MemoryLedger::new();
        ledger
            .append(&open_position("BTCUSDT", TradeMode::Simulated, Utc::now()))
            .await
            .unwrap();

        let live = ledger
            .latest_open(&Symbol("BTCUSDT".to_string()), TradeMode::Live)
            .await
            .unwrap();
        assert!(live.is_none());
    }

    #[tokio::test]
    async fn close_is_once_only() {
        let ledger = MemoryLedger::new();
        let row_id = ledger
            .append(&open_position("ETHUSDT", TradeMode::Live, Utc::now()))
            .await
            .unwrap();

        ledger
            .close(row_id, Utc::now(), dec!(110), dec!(100))
            .await
            .unwrap();
        let second = ledger.close(row_id, Utc::now(), dec!(120), dec!(200)).await;
        assert!(matches!(second, Err(Error::AlreadyClosed(_))));

        let stored = ledger.get(row_id).unwrap();
        assert_eq!(stored.close_price, Some(dec!(110)));
        assert_eq!(stored.realized_profit, Some(dec!(100)));
    }

    #[tokio::test]
    async fn annotate_flags_the_row() {
        let ledger = MemoryLedger::new();
        let row_id = ledger
            .append(&open_position("ETHUSDT", TradeMode::Live, Utc::now()))
            .await
            .unwrap();

        ledger.annotate(row_id, "buy order failed").await.unwrap();
        assert_eq!(
            ledger.get(row_id).unwrap().review_note.as_deref(),
            Some("buy order failed")
        );
    }
}
