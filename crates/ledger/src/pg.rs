use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use core_types::{Position, PositionState, Symbol, TradeMode};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::{LedgerStore, PositionFilter, RowId};

use app_config::types::DatabaseSettings;

/// A wrapper around the `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct Db(PgPool);

/// Establishes a connection pool to the PostgreSQL database and runs migrations.
///
/// # Arguments
///
/// * `settings`: The database configuration settings.
///
/// # Returns
///
/// A `Result` containing the `Db` wrapper on success, or an `Error` on failure.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    // Create a connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        // A stuck pool must fail the request, not starve the key lock.
        .acquire_timeout(std::time::Duration::from_secs(5))
        // The `?` operator uses the `#[from]` attribute in our error enum
        // to automatically convert the `sqlx::Error` into a `ledger::Error`.
        .connect(&settings.url)
        .await?;

    // Run database migrations. This ensures the database schema is up-to-date.
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(Error::from)?;

    Ok(Db(pool))
}

fn mode_to_str(mode: TradeMode) -> &'static str {
    match mode {
        TradeMode::Live => "live",
        TradeMode::Simulated => "simulated",
    }
}

fn mode_from_str(s: &str) -> Result<TradeMode> {
    match s {
        "live" => Ok(TradeMode::Live),
        "simulated" => Ok(TradeMode::Simulated),
        other => Err(Error::Corrupt(format!("unknown mode '{other}'"))),
    }
}

fn state_to_str(state: PositionState) -> &'static str {
    match state {
        PositionState::Open => "open",
        PositionState::Closed => "closed",
    }
}

fn state_from_str(s: &str) -> Result<PositionState> {
    match s {
        "open" => Ok(PositionState::Open),
        "closed" => Ok(PositionState::Closed),
        other => Err(Error::Corrupt(format!("unknown state '{other}'"))),
    }
}

fn to_numeric(value: Decimal) -> BigDecimal {
    BigDecimal::from_str(&value.to_string()).expect("Decimal is always a valid numeric")
}

fn from_numeric(value: BigDecimal) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .map_err(|e| Error::Corrupt(format!("numeric out of range: {e}")))
}

fn row_to_position(row: &PgRow) -> Result<(RowId, Position)> {
    let id: RowId = row.try_get("id").map_err(Error::OperationFailed)?;
    let state: String = row.try_get("state").map_err(Error::OperationFailed)?;
    let mode: String = row.try_get("mode").map_err(Error::OperationFailed)?;
    let symbol: String = row.try_get("symbol").map_err(Error::OperationFailed)?;
    let open_price: BigDecimal = row.try_get("open_price").map_err(Error::OperationFailed)?;
    let notional: BigDecimal = row.try_get("notional").map_err(Error::OperationFailed)?;
    let quantity: BigDecimal = row.try_get("quantity").map_err(Error::OperationFailed)?;
    let close_price: Option<BigDecimal> =
        row.try_get("close_price").map_err(Error::OperationFailed)?;
    let realized_profit: Option<BigDecimal> = row
        .try_get("realized_profit")
        .map_err(Error::OperationFailed)?;

    let position = Position {
        symbol: Symbol(symbol),
        state: state_from_str(&state)?,
        mode: mode_from_str(&mode)?,
        opened_at: row.try_get("opened_at").map_err(Error::OperationFailed)?,
        open_price: from_numeric(open_price)?,
        notional: from_numeric(notional)?,
        quantity: from_numeric(quantity)?,
        closed_at: row.try_get("closed_at").map_err(Error::OperationFailed)?,
        close_price: close_price.map(from_numeric).transpose()?,
        realized_profit: realized_profit.map(from_numeric).transpose()?,
        review_note: row.try_get("review_note").map_err(Error::OperationFailed)?,
    };

    Ok((id, position))
}

#[async_trait]
impl LedgerStore for Db {
    async fn append(&self, position: &Position) -> Result<RowId> {
        let row = sqlx::query(
            r#"
            INSERT INTO positions
                (symbol, state, mode, opened_at, open_price, notional, quantity,
                 closed_at, close_price, realized_profit, review_note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&position.symbol.0)
        .bind(state_to_str(position.state))
        .bind(mode_to_str(position.mode))
        .bind(position.opened_at)
        .bind(to_numeric(position.open_price))
        .bind(to_numeric(position.notional))
        .bind(to_numeric(position.quantity))
        .bind(position.closed_at)
        .bind(position.close_price.map(to_numeric))
        .bind(position.realized_profit.map(to_numeric))
        .bind(&position.review_note)
        .fetch_one(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.try_get("id").map_err(Error::OperationFailed)
    }

    async fn scan_newest_first(&self, filter: &PositionFilter) -> Result<Vec<(RowId, Position)>> {
        // NULL-tolerant predicates keep this a single statement for every
        // filter combination the engine uses.
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, state, mode, opened_at, open_price, notional,
                   quantity, closed_at, close_price, realized_profit, review_note
            FROM positions
            WHERE ($1::text IS NULL OR symbol = $1)
              AND ($2::text IS NULL OR mode = $2)
              AND ($3::text IS NULL OR state = $3)
            ORDER BY opened_at DESC, id DESC
            "#,
        )
        .bind(filter.symbol.as_ref().map(|s| s.0.clone()))
        .bind(filter.mode.map(mode_to_str))
        .bind(filter.state.map(state_to_str))
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.iter().map(row_to_position).collect()
    }

    async fn close(
        &self,
        row_id: RowId,
        closed_at: DateTime<Utc>,
        close_price: Decimal,
        realized_profit: Decimal,
    ) -> Result<()> {
        // The `state = 'open'` guard makes the close-once invariant hold
        // even if two writers ever reach this statement concurrently.
        let result = sqlx::query(
            r#"
            UPDATE positions
            SET state = 'closed', closed_at = $2, close_price = $3, realized_profit = $4
            WHERE id = $1 AND state = 'open'
            "#,
        )
        .bind(row_id)
        .bind(closed_at)
        .bind(to_numeric(close_price))
        .bind(to_numeric(realized_profit))
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM positions WHERE id = $1")
                .bind(row_id)
                .fetch_optional(&self.0)
                .await
                .map_err(Error::OperationFailed)?;
            return Err(match exists {
                Some(_) => Error::AlreadyClosed(row_id),
                None => Error::RowNotFound(row_id),
            });
        }

        Ok(())
    }

    async fn annotate(&self, row_id: RowId, note: &str) -> Result<()> {
        let result = sqlx::query("UPDATE positions SET review_note = $2 WHERE id = $1")
            .bind(row_id)
            .bind(note)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound(row_id));
        }

        Ok(())
    }
}
