use app_config::types::BinanceSettings;
use chrono::Utc;
use core_types::Symbol;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;

impl ApiClient {
    /// Constructs a new ApiClient from BinanceSettings.
    pub fn new(settings: &BinanceSettings) -> Result<Self> {
        let http_client = reqwest::Client::new();
        let api_key = settings.api_key.clone();
        let secret_key = settings.secret_key.clone();
        let base_url = settings.rest_base_url.clone();
        Ok(ApiClient {
            http_client,
            api_key,
            secret_key,
            base_url,
        })
    }

    /// Generates an HMAC-SHA256 signature for a given query string.
    ///
    /// # Arguments
    ///
    /// * `query_string`: The URL-encoded query string to be signed.
    ///
    /// # Returns
    ///
    /// A hexadecimal string representation of the signature.
    fn sign(&self, query_string: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }

    /// Creates a signed query string including the timestamp and signature.
    fn create_signed_query(&self, params: &mut String) {
        // Get the current timestamp in milliseconds.
        let timestamp = Utc::now().timestamp_millis();

        // Append the timestamp to the parameters.
        if !params.is_empty() {
            params.push('&');
        }
        params.push_str(&format!("timestamp={}", timestamp));

        // Sign the parameters.
        let signature = self.sign(params);

        // Append the signature to the parameters.
        params.push_str(&format!("&signature={}", signature));
    }

    /// Decodes a Binance response body, surfacing the exchange's error
    /// object (`{"code": ..., "msg": ...}`) before attempting to
    /// deserialize into the target type.
    fn decode_response<T: serde::de::DeserializeOwned>(&self, body: &str) -> Result<T> {
        let value: Value = serde_json::from_str(body).map_err(Error::DeserializationFailed)?;

        // Binance returns an error object on failure, so we check for that first.
        if let Some(code) = value.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let msg = value
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                return Err(Error::ApiError { code, msg });
            }
        }

        serde_json::from_value(value).map_err(Error::DeserializationFailed)
    }

    /// Fetches the latest price for a symbol.
    ///
    /// This corresponds to the `GET /api/v3/ticker/price` endpoint.
    pub async fn get_symbol_price(&self, symbol: &Symbol) -> Result<Decimal> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url, symbol.0
        );

        let text = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;

        let ticker: PriceTicker = self.decode_response(&text)?;
        Ok(ticker.price)
    }

    /// Fetches the lot-size step for a symbol from the exchange metadata.
    ///
    /// This corresponds to the `GET /api/v3/exchangeInfo` endpoint; the
    /// step is read from the symbol's `LOT_SIZE` filter. Returns `None`
    /// when the exchange does not advertise one.
    pub async fn get_lot_step(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        let url = format!(
            "{}/api/v3/exchangeInfo?symbol={}",
            self.base_url, symbol.0
        );

        let text = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;

        let info: ExchangeInfo = self.decode_response(&text)?;

        let step = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol.0)
            .and_then(|s| {
                s.filters
                    .into_iter()
                    .find(|f| f.filter_type == "LOT_SIZE")
                    .and_then(|f| f.step_size)
            });

        Ok(step)
    }

    /// Places a market buy order sized by quote amount.
    ///
    /// Corresponds to `POST /api/v3/order` with `quoteOrderQty`, which lets
    /// the exchange compute the base quantity at the fill price.
    pub async fn place_market_buy(
        &self,
        symbol: &Symbol,
        quote_amount: Decimal,
    ) -> Result<NewOrderResponse> {
        let mut params = format!(
            "symbol={}&side=BUY&type=MARKET&quoteOrderQty={}",
            symbol.0, quote_amount
        );
        self.send_order(&mut params).await
    }

    /// Places a market sell order for an exact base-asset quantity.
    ///
    /// Corresponds to `POST /api/v3/order` with `quantity`.
    pub async fn place_market_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
    ) -> Result<NewOrderResponse> {
        let mut params = format!(
            "symbol={}&side=SELL&type=MARKET&quantity={}",
            symbol.0, quantity
        );
        self.send_order(&mut params).await
    }

    async fn send_order(&self, params: &mut String) -> Result<NewOrderResponse> {
        self.create_signed_query(params);

        let url = format!("{}/api/v3/order", self.base_url);

        let text = self
            .http_client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .body(params.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;

        self.decode_response(&text)
    }

    /// Fetches the free balance of a single asset from the spot account.
    ///
    /// This corresponds to the `GET /api/v3/account` endpoint.
    pub async fn get_free_balance(&self, asset: &str) -> Result<Decimal> {
        let mut params = String::new();
        self.create_signed_query(&mut params);

        let url = format!("{}/api/v3/account?{}", self.base_url, params);

        let text = self
            .http_client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;

        let account: AccountInfo = self.decode_response(&text)?;

        let free = account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO);

        Ok(free)
    }
}

// Free function to allow api_client::new usage
pub fn new(settings: &BinanceSettings) -> Result<ApiClient> {
    ApiClient::new(settings)
}
