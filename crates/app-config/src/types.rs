use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the Binance API.
    pub binance: BinanceSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    /// Settings for the inbound webhook server.
    pub server: ServerSettings,
    /// Settings for webhook authentication.
    pub webhook: WebhookSettings,
    /// Knobs for the trade executor.
    #[serde(default)]
    pub trading: TradingSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BinanceSettings {
    /// The API key for Binance.
    pub api_key: String,
    /// The secret key for Binance.
    pub secret_key: String,
    /// The REST API base URL for Binance.
    pub rest_base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WebhookSettings {
    /// The shared secret every inbound signal must carry.
    pub shared_secret: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TradingSettings {
    /// Upper bound on a single exchange or store call before it is
    /// abandoned with a timeout error.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    /// Lot step used when the exchange symbol metadata is unavailable.
    #[serde(default = "default_fallback_lot_step")]
    pub fallback_lot_step: Decimal,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: default_gateway_timeout_secs(),
            fallback_lot_step: default_fallback_lot_step(),
        }
    }
}

fn default_gateway_timeout_secs() -> u64 {
    5
}

fn default_fallback_lot_step() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}
