// ===============================
// src/main.rs
// ===============================
/*
 # metrics
 curl -s localhost:9898/metrics | egrep '^(inventory_|model_|orders_total)'

 # rekam lalu putar ulang
 RECORD_FILE=./data/events.jsonl cargo run --release
 cargo run --release -- --replay ./data/events.jsonl
*/
/*
=============================================================================
Project : mm_bot_rust — single-instrument market-making agent in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Builds a fair price from VWAP history, momentum, RSI and a linear
          trend fit, keeps at most one bid and one ask resting around it
          within a position limit, hedges every fill, exposes Prometheus
          metrics, and records/replays JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod domain;
mod config;
mod metrics;
mod recorder;
mod replay;
mod feed;
mod history;
mod signals;
mod quote;
mod risk;
mod trader;
mod gateway;          // mock venue (rest -> fill saat touch menyeberang)
mod positions;

use clap::Parser;
use tokio::{
    select,
    sync::{broadcast, mpsc},
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::domain::{Command, Event, MarketEvent};
use crate::trader::{AutoTrader, ChannelGateway};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let (args, params) = match config::load(config::Cli::parse()) {
        Ok(v) => v,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(2);
        }
    };

    // ---- Offline replay ----
    if let Some(path) = args.replay_file.as_deref() {
        if let Err(e) = replay::replay_file(path, params) {
            error!(%e, "replay failed");
            std::process::exit(1);
        }
        return;
    }

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    info!(
        feed_mode = args.feed_mode.label(),
        symbol = %args.symbol,
        instrument = params.instrument,
        lot_size = params.lot_size,
        position_limit = params.position_limit,
        tick_size = params.tick_size,
        hedge_sell_px = params.min_bid_nearest_tick(),
        hedge_buy_px = params.max_ask_nearest_tick(),
        "startup config"
    );
    crate::metrics::CONFIG_FEED_MODE
        .with_label_values(&[args.feed_mode.label()])
        .set(1);
    for (name, v) in [
        ("lot_size", params.lot_size),
        ("position_limit", params.position_limit),
        ("tick_size", params.tick_size),
    ] {
        crate::metrics::CONFIG_LIMITS.with_label_values(&[name]).set(v);
    }

    // ---- Buses ----
    // md: feed -> (trader queue, venue); ev: satu queue untuk semua event trader
    let (md_tx, _md_rx) = broadcast::channel::<MarketEvent>(4096);
    let (ev_tx, ev_rx) = mpsc::channel::<MarketEvent>(8192);
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(1024);

    // ---- Recorder (optional) ----
    let rec_tx = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Event>(8192);
            tokio::spawn(recorder::run(rx, path));
            Some(tx)
        }
        None => None,
    };

    // ---- Market data -> trader queue ----
    tokio::spawn({
        let mut rx = md_tx.subscribe();
        let tx = ev_tx.clone();
        async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        if tx.send(ev).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(n, "trader lagged behind market data")
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    // ---- Venue ----
    tokio::spawn(gateway::run_venue(
        cmd_rx,
        md_tx.subscribe(),
        ev_tx.clone(),
        args.gateway_latency_ms,
    ));

    // ---- Trader (single consumer) ----
    let auto_trader = AutoTrader::new(params.clone(), ChannelGateway::new(cmd_tx, rec_tx.clone()));
    tokio::spawn(trader::run(ev_rx, auto_trader, rec_tx.clone()));
    drop(ev_tx);

    // ---- FEED (Market Data) ----
    match args.feed_mode {
        config::MarketMode::Mock => {
            tokio::spawn(feed::run_mock(
                md_tx.clone(),
                params.instrument,
                params.tick_size,
                args.feed_interval_ms,
            ));
        }
        config::MarketMode::BinanceSandbox | config::MarketMode::BinanceMainnet => {
            tokio::spawn(feed::run_binance(
                md_tx.clone(),
                args.symbol.clone(),
                args.binance_ws_url.clone(),
                params.instrument,
            ));
        }
    }

    // ---- Heartbeat ----
    let mut md_rx_metrics = md_tx.subscribe();
    let mut book_count: u64 = 0;
    let mut hb = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        select! {
            Ok(ev) = md_rx_metrics.recv() => {
                if matches!(ev, MarketEvent::Book(_)) {
                    book_count += 1;
                }
            },
            _ = hb.tick() => {
                info!(books = book_count, "heartbeat");
                book_count = 0;
            }
            _ = &mut ctrl_c => {
                info!("ctrl-c, shutting down");
                if let Some(tx) = &rec_tx {
                    let _ = tx.try_send(Event::Note("shutdown".into()));
                }
                break;
            }
        }
    }
}
