use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

/// The main client for interacting with the Binance Spot API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    /// The user's Binance API key.
    pub api_key: String,
    /// The user's Binance secret key.
    pub secret_key: String,
    /// The base URL for the Binance Spot API.
    pub base_url: String,
}

/// Response of `GET /api/v3/ticker/price`.
#[derive(Debug, Deserialize, Clone)]
pub struct PriceTicker {
    pub symbol: String,
    pub price: Decimal,
}

/// A subset of the `GET /api/v3/exchangeInfo` response.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// One entry of a symbol's filter list. Only the `LOT_SIZE` fields are
/// of interest; everything else deserializes with `step_size` absent.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    #[serde(default)]
    pub step_size: Option<Decimal>,
}

/// Response of `POST /api/v3/order` for market orders.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderResponse {
    pub symbol: String,
    pub order_id: i64,
    pub status: String,
    /// The actual filled base-asset quantity.
    pub executed_qty: Decimal,
    /// The cumulative quote asset transacted.
    pub cummulative_quote_qty: Decimal,
}

impl NewOrderResponse {
    /// Average fill price, derived from the quote/base totals the
    /// exchange reports. `None` when nothing filled.
    pub fn fill_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            None
        } else {
            Some(self.cummulative_quote_qty / self.executed_qty)
        }
    }
}

/// A single asset's balance in the spot account.
#[derive(Debug, Deserialize, Clone)]
pub struct Balance {
    /// The asset's symbol (e.g., "USDT").
    pub asset: String,
    /// The balance available for new orders.
    pub free: Decimal,
    /// The balance locked in open orders.
    pub locked: Decimal,
}

/// A subset of the `GET /api/v3/account` response.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountInfo {
    pub balances: Vec<Balance>,
}
