use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Engine(#[from] engine::Error),

    #[error("Ledger store unavailable: {0}")]
    Ledger(#[from] ledger::Error),

    #[error("Failed to bind/serve: {0}")]
    ServerBindError(std::io::Error),
}

impl Error {
    /// The machine-readable outcome kind carried in every error body.
    fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::Engine(e) => match e {
                engine::Error::InvalidSignal { .. } => "invalid_signal",
                engine::Error::PriceUnavailable { .. } => "price_unavailable",
                engine::Error::NoOpenPosition { .. } => "no_open_position",
                engine::Error::GatewayTimeout { .. } => "gateway_timeout",
                engine::Error::OrderFailedAfterLedgerWrite { .. } => {
                    "order_failed_after_ledger_write"
                }
                engine::Error::OrderNotFilled { .. } => "order_failed_after_ledger_write",
                engine::Error::StoreUnavailable(_) => "store_unavailable",
                engine::Error::Exchange(_) => "exchange_error",
            },
            Error::Ledger(_) => "store_unavailable",
            Error::ServerBindError(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Engine(e) => match e {
                engine::Error::InvalidSignal { .. } => StatusCode::BAD_REQUEST,
                engine::Error::NoOpenPosition { .. } => StatusCode::CONFLICT,
                engine::Error::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                engine::Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                engine::Error::PriceUnavailable { .. }
                | engine::Error::OrderFailedAfterLedgerWrite { .. }
                | engine::Error::OrderNotFilled { .. }
                | engine::Error::Exchange(_) => StatusCode::BAD_GATEWAY,
            },
            Error::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ServerBindError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed.");
        } else {
            tracing::warn!(error = %self, "Request rejected.");
        }
        let body = Json(json!({
            "kind": self.kind(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Symbol, TradeMode};

    #[test]
    fn each_outcome_kind_gets_its_own_status() {
        let no_open = Error::Engine(engine::Error::NoOpenPosition {
            symbol: Symbol("BTCUSDT".to_string()),
            mode: TradeMode::Live,
        });
        assert_eq!(no_open.status(), StatusCode::CONFLICT);
        assert_eq!(no_open.kind(), "no_open_position");

        let invalid = Error::Engine(engine::Error::InvalidSignal {
            reason: "bad".to_string(),
        });
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let timeout = Error::Engine(engine::Error::GatewayTimeout {
            operation: "price fetch",
            seconds: 5,
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let diverged = Error::Engine(engine::Error::OrderFailedAfterLedgerWrite {
            symbol: Symbol("BTCUSDT".to_string()),
            row_id: 7,
            reason: "rejected".to_string(),
        });
        assert_eq!(diverged.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(diverged.kind(), "order_failed_after_ledger_write");

        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
