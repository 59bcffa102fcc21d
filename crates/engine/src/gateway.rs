use api_client::ApiClient;
use async_trait::async_trait;
use core_types::Symbol;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::ExchangeGateway;

/// The live gateway: forwards every call to the Binance spot client.
///
/// Order placements return the average fill price reported by the
/// exchange, which is the source of truth for what actually executed.
#[derive(Debug, Clone)]
pub struct BinanceGateway {
    api_client: ApiClient,
}

impl BinanceGateway {
    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }
}

#[async_trait]
impl ExchangeGateway for BinanceGateway {
    fn name(&self) -> &'static str {
        "BinanceGateway"
    }

    async fn get_price(&self, symbol: &Symbol) -> Result<Decimal> {
        Ok(self.api_client.get_symbol_price(symbol).await?)
    }

    async fn get_lot_step(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        Ok(self.api_client.get_lot_step(symbol).await?)
    }

    async fn place_market_buy(&self, symbol: &Symbol, quote_amount: Decimal) -> Result<Decimal> {
        let response = self
            .api_client
            .place_market_buy(symbol, quote_amount)
            .await?;
        tracing::info!(%symbol, ?response, "Market buy placed.");
        response.fill_price().ok_or_else(|| Error::OrderNotFilled {
            symbol: symbol.clone(),
        })
    }

    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> Result<Decimal> {
        let response = self
            .api_client
            .place_market_sell(symbol, quantity)
            .await?;
        tracing::info!(%symbol, ?response, "Market sell placed.");
        response.fill_price().ok_or_else(|| Error::OrderNotFilled {
            symbol: symbol.clone(),
        })
    }

    async fn get_free_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self.api_client.get_free_balance(asset).await?)
    }
}
