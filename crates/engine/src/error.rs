use core_types::{Symbol, TradeMode};
use ledger::RowId;
use thiserror::Error;

/// Every way handling a signal can end other than a normal report.
///
/// Each variant is a distinct outcome kind for the caller: the gateway
/// maps them to individual HTTP statuses and tests match on them, so no
/// failure collapses into generic text.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid signal: {reason}")]
    InvalidSignal { reason: String },

    #[error("Price unavailable for {symbol}: {reason}")]
    PriceUnavailable { symbol: Symbol, reason: String },

    #[error("No open {mode:?} position for {symbol}")]
    NoOpenPosition { symbol: Symbol, mode: TradeMode },

    #[error("{operation} timed out after {seconds}s")]
    GatewayTimeout {
        operation: &'static str,
        seconds: u64,
    },

    /// The ledger was written but the subsequent exchange order failed.
    /// The affected row carries a review note; it is never deleted or
    /// reverted automatically.
    #[error("Order failed after ledger write for {symbol} (row {row_id}): {reason}")]
    OrderFailedAfterLedgerWrite {
        symbol: Symbol,
        row_id: RowId,
        reason: String,
    },

    #[error("Order did not fill for {symbol}")]
    OrderNotFilled { symbol: Symbol },

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(#[from] ledger::Error),

    #[error("Exchange error: {0}")]
    Exchange(#[from] api_client::Error),
}

impl From<core_types::Error> for Error {
    fn from(err: core_types::Error) -> Self {
        match err {
            core_types::Error::InvalidSignal { reason } => Error::InvalidSignal { reason },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
