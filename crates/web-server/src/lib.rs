use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use app_config::types::ServerSettings;
use core_types::ExecutionReport;
use engine::{ExchangeGateway, TradeExecutor};
use ledger::{LedgerStore, PositionFilter};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod error;
pub mod types;

// Re-export our custom error type for convenience.
pub use error::{Error, Result};
pub use types::{ApiPosition, WebhookPayload};

/// The shared application state that is available to all API handlers.
///
/// It is wrapped in an `Arc` to allow for safe concurrent access.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<TradeExecutor>,
    pub ledger: Arc<dyn LedgerStore>,
    pub gateway: Arc<dyn ExchangeGateway>,
    pub shared_secret: String,
}

/// Creates the main application router with all routes and middleware.
///
/// # Arguments
///
/// * `app_state`: The shared `AppState` containing the executor and ledger.
///
/// # Returns
///
/// The configured `axum::Router`.
pub fn create_router(app_state: AppState) -> Router {
    // Define a CORS layer to allow requests from monitoring frontends.
    // In a production environment, you would restrict the origin.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_check_handler))
        .route("/api/positions", get(get_open_positions_handler))
        .route("/api/balance/{asset}", get(get_balance_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// A simple health check handler.
/// Responds with a 200 OK and a plain body.
async fn health_check_handler() -> &'static str {
    "OK"
}

/// The handler for `POST /webhook`.
///
/// Authenticates the shared secret, maps the alert-source payload onto a
/// `Signal` and hands it to the executor. Every executor outcome kind maps
/// to its own HTTP status (see `error.rs`), so callers can tell "nothing
/// happened" from "something happened and needs attention".
async fn webhook_handler(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<ExecutionReport>> {
    if payload.secret != state.shared_secret {
        tracing::warn!("Webhook rejected: bad shared secret.");
        return Err(Error::Unauthorized);
    }

    let signal = payload.into_signal()?;
    let report = state.executor.handle_signal(&signal).await?;
    Ok(Json(report))
}

/// Handler for `GET /api/positions`.
/// Lists currently open positions, newest first.
async fn get_open_positions_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiPosition>>> {
    let rows = state
        .ledger
        .scan_newest_first(&PositionFilter::all_open())
        .await?;

    let positions = rows
        .into_iter()
        .map(|(id, position)| ApiPosition { id, position })
        .collect();

    Ok(Json(positions))
}

/// Handler for `GET /api/balance/:asset`.
/// Reports the exchange's free balance for one asset (e.g., "USDT").
async fn get_balance_handler(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let free = state.gateway.get_free_balance(&asset).await?;
    Ok(Json(json!({ "asset": asset, "free": free })))
}

/// The main entry point for running the web server.
///
/// This function sets up the TCP listener and serves the application router.
/// It will run forever until the process is terminated.
pub async fn run(settings: ServerSettings, app_state: AppState) -> Result<()> {
    let app = create_router(app_state);

    let address = format!("{}:{}", settings.host, settings.port);
    tracing::info!("Web server listening on {}", address);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(Error::ServerBindError)?;

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(Error::ServerBindError)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use core_types::Symbol;
    use engine::PositionMatcher;
    use http_body_util::BodyExt;
    use ledger::MemoryLedger;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedPriceGateway(Decimal);

    #[async_trait::async_trait]
    impl ExchangeGateway for FixedPriceGateway {
        fn name(&self) -> &'static str {
            "FixedPriceGateway"
        }

        async fn get_price(&self, _symbol: &Symbol) -> engine::Result<Decimal> {
            Ok(self.0)
        }

        async fn get_lot_step(&self, _symbol: &Symbol) -> engine::Result<Option<Decimal>> {
            Ok(None)
        }

        async fn place_market_buy(
            &self,
            _symbol: &Symbol,
            _quote_amount: Decimal,
        ) -> engine::Result<Decimal> {
            Ok(self.0)
        }

        async fn place_market_sell(
            &self,
            _symbol: &Symbol,
            _quantity: Decimal,
        ) -> engine::Result<Decimal> {
            Ok(self.0)
        }

        async fn get_free_balance(&self, _asset: &str) -> engine::Result<Decimal> {
            Ok(dec!(42))
        }
    }

    fn router() -> Router {
        let ledger: Arc<MemoryLedger> = Arc::new(MemoryLedger::new());
        let gateway = Arc::new(FixedPriceGateway(dec!(100)));
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&gateway) as Arc<dyn ExchangeGateway>,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            PositionMatcher::new(dec!(0.000001)),
            Duration::from_secs(2),
        ));
        create_router(AppState {
            executor,
            ledger,
            gateway,
            shared_secret: "s3cret".to_string(),
        })
    }

    fn webhook_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn bad_secret_is_unauthorized() {
        let response = router()
            .oneshot(webhook_request(
                r#"{"secret":"wrong","symbol":"BTCUSDT","action":"buy","amount":1000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn simulated_buy_reports_opened() {
        let response = router()
            .oneshot(webhook_request(
                r#"{"secret":"s3cret","symbol":"BTCUSDT","action":"buy","amount":1000,"testing":"yes"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let report: ExecutionReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.outcome, core_types::Outcome::Opened);
        assert_eq!(report.quantity, dec!(10));
    }

    #[tokio::test]
    async fn sell_without_open_position_is_conflict() {
        let response = router()
            .oneshot(webhook_request(
                r#"{"secret":"s3cret","symbol":"BTCUSDT","action":"sell"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["kind"], "no_open_position");
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
