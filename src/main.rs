//! Binance Straddle Bot - Main Entry Point

use anyhow::{Context, Result};
use binance_straddle::config::Config;
use binance_straddle::exchange::{BinanceClient, ExchangeGateway, MarketKind};
use binance_straddle::risk::FeeGuard;
use binance_straddle::strategy::{initial_lot, SessionController, SessionSummary, TracingSink};
use clap::{Parser, Subcommand};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Binance Straddle Bot CLI
#[derive(Parser)]
#[command(name = "straddle-bot")]
#[command(version, about = "Two-sided straddle entry with martingale sizing on Binance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run straddle rounds until stopped
    Run {
        /// Symbol to trade (overrides config)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Market to trade: futures or spot (overrides config)
        #[arg(short, long)]
        market: Option<MarketKind>,

        /// Stop after the first round
        #[arg(long)]
        once: bool,
    },

    /// Show balance, spread, fee and the initial lot for a symbol
    Status {
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Cancel every open order on a symbol
    CancelAll {
        #[arg(short, long)]
        symbol: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let mut config = Config::load()?;

    match cli.command {
        Some(Commands::Status { symbol }) => {
            apply_symbol(&mut config, symbol);
            show_status(&config).await
        }
        Some(Commands::CancelAll { symbol }) => {
            apply_symbol(&mut config, symbol);
            cancel_all(&config).await
        }
        Some(Commands::Run {
            symbol,
            market,
            once,
        }) => {
            apply_symbol(&mut config, symbol);
            if let Some(market) = market {
                config.binance.market = market;
            }
            if once {
                config.session.auto_stop = true;
            }
            run_session(config).await
        }
        None => run_session(config).await,
    }
}

fn apply_symbol(config: &mut Config, symbol: Option<String>) {
    if let Some(symbol) = symbol {
        config.trading.symbol = symbol.to_uppercase();
    }
}

async fn run_session(config: Config) -> Result<()> {
    config.validate()?;

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║           Binance Straddle Bot v{}                      ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    if config.binance.testnet {
        info!("🧪 TESTNET - fee ceiling check disabled");
    } else {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
    }
    log_config(&config);

    let client = BinanceClient::new(&config.binance).context("Failed to create Binance client")?;
    let controller = SessionController::new(Arc::new(client), Arc::new(TracingSink), config.params());

    // Ctrl-C ends the session at the next round boundary
    let auto_stop = controller.auto_stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Stop requested, finishing the current round");
        auto_stop.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting session...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = controller.run().await?;
    log_summary(&summary);

    match summary.halt {
        Some(reason) => Err(reason.into()),
        None => Ok(()),
    }
}

async fn show_status(config: &Config) -> Result<()> {
    let client = BinanceClient::new(&config.binance).context("Failed to create Binance client")?;
    let symbol = config.trading.symbol.as_str();

    let info = client.get_symbol_info(symbol).await?;
    let balance = client.get_balance(&info.quote_asset).await?;
    let top = client.get_order_book_top(symbol).await?;
    let fee = client.get_fee_rate(symbol).await?;
    let params = config.params();
    let guard = FeeGuard::from_params(&params);

    info!("📋 Status for {} ({})", symbol, client.market());
    info!("   Balance: {} {}", balance, info.quote_asset);
    info!(
        "   Spread: {} (bid {} / ask {})",
        top.spread(),
        top.best_bid,
        top.best_ask
    );
    info!(
        "   Maker fee: {} (ceiling {}, checked: {}) -> {:?}",
        fee,
        guard.ceiling(),
        guard.is_enabled(),
        guard.evaluate(fee)
    );
    info!(
        "   Initial lot: {} {}",
        initial_lot(params.initial_lot_percent, balance, params.min_lot),
        info.quote_asset
    );

    Ok(())
}

async fn cancel_all(config: &Config) -> Result<()> {
    let client = BinanceClient::new(&config.binance).context("Failed to create Binance client")?;
    let symbol = config.trading.symbol.as_str();

    match client.cancel_all_open_orders(symbol).await {
        Ok(()) => {
            info!(%symbol, "🧹 All open orders canceled");
            Ok(())
        }
        Err(e) => {
            error!(%symbol, error = %e, "Failed to cancel open orders");
            Err(e.into())
        }
    }
}

/// Initialize logging to stdout and a daily rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "straddle-bot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("binance_straddle=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Symbol: {} ({})", config.trading.symbol, config.binance.market);
    info!(
        "   Initial Lot: {}% of balance, min {}",
        config.trading.initial_lot_percent, config.trading.min_lot
    );
    info!(
        "   Take Profit: +{} pts, Stop Loss: -{} pts",
        config.trading.take_profit_points, config.trading.stop_loss_points
    );
    if config.trailing.enabled {
        info!(
            "   Trailing Stop: {}% callback, {}% activation",
            config.trailing.callback_rate_percent, config.trailing.activation_percent
        );
    }
    if config.martingale.enabled {
        info!("   Martingale: x{}", config.martingale.lot_multiplier);
    }
    info!("   Fee Ceiling: {}", config.trading.fee_ceiling);
    info!(
        "   Poll Interval: {}s, Auto-stop: {}",
        config.session.poll_interval_secs, config.session.auto_stop
    );
}

fn log_summary(summary: &SessionSummary) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 Session summary for {}", summary.symbol);
    info!("   Rounds: {}", summary.rounds_completed);
    info!(
        "   Balance: {} -> {} {}",
        summary.start_balance, summary.final_balance, summary.quote_currency
    );
    info!(
        "   Total Profit: {} {} ({:.2}%)",
        summary.total_profit, summary.quote_currency, summary.total_profit_percent
    );
    if let Some(pnl) = summary.pnl_excluding_fees {
        info!("   PnL excluding fees: {} {}", pnl, summary.quote_currency);
    }
    info!("   Final Lot: {}", summary.final_lot);
    if let Some(reason) = &summary.halt {
        error!("   Halted: {}", reason);
    }
}
