//! Virtual Ledger - Main Entry Point
//!
//! Paper session runner: several fixed-weight strategies share one paper
//! account through the netting broker.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use virtual_ledger::config::{Config, LoggingConfig};
use virtual_ledger::context::{RunContext, RunMode};
use virtual_ledger::host::{Host, PaperHost};
use virtual_ledger::strategy::{PerformanceRow, StrategyManager, TargetWeights};

/// Virtual Ledger CLI
#[derive(Parser)]
#[command(name = "virtual-ledger")]
#[command(version, about = "Per-strategy virtual ledgers over one brokerage account")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a paced paper trading session
    Run {
        /// Number of bars to simulate (overrides config)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Milliseconds between bars (overrides config)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate and print the effective configuration
    CheckConfig,
}

/// Per-bar price moves in percent, cycled per symbol.
const PRICE_STEPS: [Decimal; 6] = [
    dec!(0.8),
    dec!(-0.5),
    dec!(1.2),
    dec!(-1.0),
    dec!(0.3),
    dec!(-0.4),
];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Some(Commands::Run {
            ticks,
            interval_ms,
            json,
        }) => {
            init_logging(&config.logging)?;
            run_session(config, ticks, interval_ms, json).await
        }
        None => {
            init_logging(&config.logging)?;
            run_session(config, None, None, false).await
        }
    }
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all(&logging.directory)
        .with_context(|| format!("Failed to create log directory {}", logging.directory))?;

    let file_appender = tracing_appender::rolling::hourly(&logging.directory, &logging.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("virtual_ledger=debug".parse()?)
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

/// Build the paper account described by the configuration.
fn build_host(config: &Config) -> PaperHost {
    let mut host =
        PaperHost::with_quote_currency(config.allocation.initial_cash, &config.broker.quote_currency);
    host.set_default_fee_schedule(config.fees.schedule());
    for symbol in &config.simulation.symbols {
        host.set_price(&symbol.symbol, symbol.price);
        host.set_lot_size(&symbol.symbol, symbol.lot_size);
    }
    host
}

/// Move every configured symbol one deterministic step.
fn advance_prices(host: &mut PaperHost, config: &Config, tick: u64) {
    for (i, symbol) in config.simulation.symbols.iter().enumerate() {
        let Some(price) = host.price(&symbol.symbol) else {
            continue;
        };
        let step = PRICE_STEPS[(tick as usize + i) % PRICE_STEPS.len()];
        let next = (price * (Decimal::ONE + step / dec!(100))).round_dp(2);
        host.set_price(&symbol.symbol, next);
    }
}

/// Deliver every pending paper fill to the manager.
fn deliver_fills(host: &mut PaperHost, manager: &mut StrategyManager) -> Result<usize> {
    let mut delivered = 0;
    for event in host.fill_open_orders() {
        if manager.on_order_event(&event)? {
            delivered += 1;
        }
    }
    Ok(delivered)
}

async fn run_session(
    config: Config,
    ticks: Option<u64>,
    interval_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let ticks = ticks.unwrap_or(config.simulation.ticks);
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.simulation.tick_interval_ms));
    let ticks_per_day = config.simulation.ticks_per_day;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ticks,
        interval_ms = interval.as_millis() as u64,
        strategies = config.allocation.strategies.len(),
        initial_cash = %config.allocation.initial_cash,
        "Starting paper session"
    );

    let mut host = build_host(&config);
    let mut manager = StrategyManager::new(
        config.broker.clone(),
        RunContext::new(RunMode::Backtest),
        config.allocation.initial_cash,
    );

    let symbols: Vec<String> = config
        .simulation
        .symbols
        .iter()
        .map(|s| s.symbol.clone())
        .collect();
    for (i, allocation) in config.allocation.strategies.iter().enumerate() {
        let strategy = TargetWeights::tilted(
            &allocation.name,
            &symbols,
            i % symbols.len().max(1),
            dec!(0.6),
            dec!(0.3),
        )
        .with_rebalance_every(ticks_per_day as u32);
        manager.register(Box::new(strategy), allocation.fraction, &host)?;
    }
    if let Some(first) = symbols.first() {
        manager.add_benchmark(first);
    }

    manager.on_warm_up_finished(&host)?;

    let start = Utc::now();
    let bar_length = ChronoDuration::minutes(24 * 60 / ticks_per_day as i64);
    let mut clock = tokio::time::interval(interval);

    for tick in 0..ticks {
        tokio::select! {
            _ = clock.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                warn!(tick, "Shutdown signal received, ending session early");
                break;
            }
        }

        if tick > 0 {
            advance_prices(&mut host, &config, tick);
        }
        host.set_time(start + bar_length * tick as i32);
        manager.context_mut().update_time(host.now());

        let summary = manager.on_data(&mut host)?;
        let fills = deliver_fills(&mut host, &mut manager)?;
        if summary.is_empty() && fills == 0 {
            debug!(tick, "Bar processed, nothing traded");
        } else {
            info!(
                tick,
                internal = summary.internal_fills,
                forwarded = summary.forwarded,
                fills,
                "Bar processed"
            );
        }

        if (tick + 1) % ticks_per_day == 0 {
            manager.on_end_of_day(&mut host)?;
            deliver_fills(&mut host, &mut manager)?;
        }
    }

    manager.on_end_of_algorithm(&mut host)?;
    deliver_fills(&mut host, &mut manager)?;
    manager.broker().self_check(&host)?;

    let report = manager.performance_report(&host);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(rows: &[PerformanceRow]) {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              PAPER SESSION PERFORMANCE                     ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    for row in rows {
        match row.total_value {
            Some(value) => println!(
                "   {:<16} ${:>14.2}   {:>8.2}%",
                row.name, value, row.performance
            ),
            None => println!(
                "   {:<16} {:>15}   {:>8.2}%",
                row.name, "(benchmark)", row.performance
            ),
        }
    }
}
