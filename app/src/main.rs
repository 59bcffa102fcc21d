use anyhow::Result;
use app_config::Settings;
use clap::{Parser, Subcommand};
use engine::{BinanceGateway, PositionMatcher, TradeExecutor};
use ledger::{LedgerStore, PositionFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use web_server::AppState;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A webhook-driven Binance trading bridge.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the webhook server that receives signals and executes trades.
    Serve,

    /// Prints the currently open positions from the ledger.
    Positions,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    // --- Tracing Setup ---
    let default_level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(default_level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    // Parse command-line arguments.
    let cli = Cli::parse();

    tracing::info!(
        environment = %settings.app.environment,
        "Starting signal ledger application"
    );

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Serve => serve(settings).await?,
        Commands::Positions => list_positions(settings).await?,
    }

    Ok(())
}

/// Wires settings -> database -> exchange client -> executor -> server.
async fn serve(settings: Settings) -> Result<()> {
    let db = ledger::connect(&settings.database).await?;
    tracing::info!("Connected to the ledger database.");

    let api_client = api_client::ApiClient::new(&settings.binance)?;
    let gateway = Arc::new(BinanceGateway::new(api_client));

    let matcher = PositionMatcher::new(settings.trading.fallback_lot_step);
    let executor = Arc::new(TradeExecutor::new(
        Arc::clone(&gateway) as Arc<dyn engine::ExchangeGateway>,
        Arc::new(db.clone()),
        matcher,
        Duration::from_secs(settings.trading.gateway_timeout_secs),
    ));

    let app_state = AppState {
        executor,
        ledger: Arc::new(db),
        gateway,
        shared_secret: settings.webhook.shared_secret.clone(),
    };

    web_server::run(settings.server, app_state).await?;
    Ok(())
}

async fn list_positions(settings: Settings) -> Result<()> {
    let db = ledger::connect(&settings.database).await?;
    let rows = db.scan_newest_first(&PositionFilter::all_open()).await?;

    if rows.is_empty() {
        println!("No open positions.");
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<10} {:<24} {:>14} {:>16}",
        "row", "symbol", "mode", "opened at", "open price", "quantity"
    );
    for (id, position) in rows {
        println!(
            "{:<6} {:<12} {:<10} {:<24} {:>14} {:>16}",
            id,
            position.symbol.0,
            format!("{:?}", position.mode),
            position.opened_at.format("%Y-%m-%d %H:%M:%S"),
            position.open_price,
            position.quantity
        );
    }

    Ok(())
}
