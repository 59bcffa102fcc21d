use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Position, PositionState, Symbol, TradeMode};
use rust_decimal::Decimal;

pub mod error;
pub mod memory;
pub mod pg;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use memory::MemoryLedger;
pub use pg::{connect, Db};

/// Opaque identifier of a ledger row, assigned at append time.
pub type RowId = i64;

/// Filter predicates for ledger scans. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub symbol: Option<Symbol>,
    pub mode: Option<TradeMode>,
    pub state: Option<PositionState>,
}

impl PositionFilter {
    /// Matches the open positions of one `(symbol, mode)` key.
    pub fn open_for(symbol: &Symbol, mode: TradeMode) -> Self {
        Self {
            symbol: Some(symbol.clone()),
            mode: Some(mode),
            state: Some(PositionState::Open),
        }
    }

    /// Matches all open positions.
    pub fn all_open() -> Self {
        Self {
            state: Some(PositionState::Open),
            ..Self::default()
        }
    }

    pub fn matches(&self, position: &Position) -> bool {
        self.symbol.as_ref().is_none_or(|s| *s == position.symbol)
            && self.mode.is_none_or(|m| m == position.mode)
            && self.state.is_none_or(|s| s == position.state)
    }
}

/// The durable table of trade rows behind the matching engine.
///
/// The engine only ever appends rows, closes a row once, or annotates a
/// row; rows are never deleted, so failed trades stay visible for
/// reconciliation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends a new position and returns its row identifier.
    async fn append(&self, position: &Position) -> Result<RowId>;

    /// Returns matching rows, most recently opened first.
    async fn scan_newest_first(&self, filter: &PositionFilter) -> Result<Vec<(RowId, Position)>>;

    /// Marks a row closed, setting the close fields together with the
    /// state flag.
    ///
    /// Fails with [`Error::AlreadyClosed`] if the row is not open, so two
    /// racing closes can never both succeed on the same row.
    async fn close(
        &self,
        row_id: RowId,
        closed_at: DateTime<Utc>,
        close_price: Decimal,
        realized_profit: Decimal,
    ) -> Result<()>;

    /// Permanently flags a row for manual reconciliation.
    async fn annotate(&self, row_id: RowId, note: &str) -> Result<()>;

    /// The most recently opened open position for `(symbol, mode)`, if any.
    async fn latest_open(
        &self,
        symbol: &Symbol,
        mode: TradeMode,
    ) -> Result<Option<(RowId, Position)>> {
        let mut rows = self
            .scan_newest_first(&PositionFilter::open_for(symbol, mode))
            .await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }
}
