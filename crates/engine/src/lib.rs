use async_trait::async_trait;
use core_types::Symbol;
use rust_decimal::Decimal;

pub mod error;
pub mod executor;
pub mod gateway;
pub mod locks;
pub mod matcher;

// Re-export public types
pub use error::{Error, Result};
pub use executor::TradeExecutor;
pub use gateway::BinanceGateway;
pub use matcher::{ClosedMatch, PositionMatcher};

/// The universal interface to the exchange.
///
/// The executor consumes this for price lookups, symbol metadata and
/// order placement; the live implementation wraps the Binance client and
/// tests substitute an in-process mock.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// The name of the gateway (e.g., "BinanceGateway").
    fn name(&self) -> &'static str;

    /// Current price for a symbol.
    async fn get_price(&self, symbol: &Symbol) -> Result<Decimal>;

    /// The minimum quantity increment for a symbol, if the exchange
    /// advertises one.
    async fn get_lot_step(&self, symbol: &Symbol) -> Result<Option<Decimal>>;

    /// Places a market buy sized by quote amount. Returns the average
    /// fill price.
    async fn place_market_buy(&self, symbol: &Symbol, quote_amount: Decimal) -> Result<Decimal>;

    /// Places a market sell for an exact base quantity. Returns the
    /// average fill price.
    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> Result<Decimal>;

    /// Free balance of a single asset.
    async fn get_free_balance(&self, asset: &str) -> Result<Decimal>;
}
