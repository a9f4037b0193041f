// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : mm_bot_rust — single-instrument market-making agent in Rust
Module  : config.rs
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
use std::{env, str::FromStr};

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;

/// Mode sumber market data
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarketMode {
    Mock,
    BinanceSandbox,
    BinanceMainnet,
}

impl MarketMode {
    pub fn parse(s: &str) -> Option<MarketMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock"             => Some(MarketMode::Mock),
            "binance_sandbox"  => Some(MarketMode::BinanceSandbox),
            "binance_mainnet"  => Some(MarketMode::BinanceMainnet),
            _ => None,
        }
    }

    pub fn from_env(key: &str, default_mode: MarketMode) -> MarketMode {
        env::var(key).ok().and_then(|v| Self::parse(&v)).unwrap_or(default_mode)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketMode::Mock           => "mock",
            MarketMode::BinanceSandbox => "binance_sandbox",
            MarketMode::BinanceMainnet => "binance_mainnet",
        }
    }

    pub fn default_ws_url(&self) -> &'static str {
        match self {
            MarketMode::Mock            => "wss://testnet.binance.vision/ws", // tidak dipakai saat mock
            MarketMode::BinanceSandbox  => "wss://testnet.binance.vision/ws",
            MarketMode::BinanceMainnet  => "wss://stream.binance.com:9443/ws",
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "mm_bot_rust", about = "Single-instrument market-making agent")]
pub struct Cli {
    /// Replay a recorded JSONL file through a fresh trader and exit
    #[arg(long, value_name = "FILE")]
    pub replay: Option<String>,
    /// Record events to this JSONL file (overrides RECORD_FILE)
    #[arg(long, value_name = "FILE")]
    pub record: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Args {
    pub symbol: String,
    pub record_file: Option<String>,
    pub replay_file: Option<String>,
    pub metrics_port: u16,

    pub feed_mode: MarketMode,
    pub binance_ws_url: String,
    pub feed_interval_ms: u64,
    pub gateway_latency_ms: u64,
}

/// Trading constants consumed by the decision core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraderParams {
    pub instrument: u32,
    pub lot_size: i64,
    pub position_limit: i64,
    pub tick_size: i64,
    /// Lowest valid price on the exchange.
    pub min_bid: i64,
    /// Highest valid price on the exchange.
    pub max_ask: i64,
}

impl Default for TraderParams {
    fn default() -> Self {
        Self {
            instrument: 0,
            lot_size: 10,
            position_limit: 93,
            tick_size: 100,
            min_bid: 1,
            max_ask: i32::MAX as i64,
        }
    }
}

impl TraderParams {
    /// Safety price for sell hedges: lowest tick strictly above the minimum bid.
    pub fn min_bid_nearest_tick(&self) -> i64 {
        (self.min_bid + self.tick_size) / self.tick_size * self.tick_size
    }

    /// Safety price for buy hedges.
    pub fn max_ask_nearest_tick(&self) -> i64 {
        self.max_ask / self.tick_size * self.tick_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lot_size <= 0 {
            return Err(ConfigError::NonPositive("LOT_SIZE", self.lot_size));
        }
        if self.tick_size <= 0 {
            return Err(ConfigError::NonPositive("TICK_SIZE", self.tick_size));
        }
        if self.position_limit < self.lot_size {
            return Err(ConfigError::LimitBelowLot { limit: self.position_limit, lot: self.lot_size });
        }
        if self.min_bid >= self.max_ask {
            return Err(ConfigError::PriceRange { min: self.min_bid, max: self.max_ask });
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be positive (got {1})")]
    NonPositive(&'static str, i64),
    #[error("POSITION_LIMIT {limit} cannot hold a single lot of {lot}")]
    LimitBelowLot { limit: i64, lot: i64 },
    #[error("MINIMUM_BID {min} must be below MAXIMUM_ASK {max}")]
    PriceRange { min: i64, max: i64 },
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

pub fn load(cli: Cli) -> Result<(Args, TraderParams), ConfigError> {
    // Pastikan .env dibaca (agar RECORD_FILE, LOT_SIZE, dll ter-load)
    let _ = dotenv();

    let symbol = env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
    let record_file = cli.record.or_else(|| env::var("RECORD_FILE").ok());
    let metrics_port = env_or("METRICS_PORT", 9898);

    let feed_mode = MarketMode::from_env("FEED_MODE", MarketMode::Mock);
    let binance_ws_url = env::var("BINANCE_WS_URL")
        .unwrap_or_else(|_| feed_mode.default_ws_url().to_string());

    let args = Args {
        symbol,
        record_file,
        replay_file: cli.replay,
        metrics_port,
        feed_mode,
        binance_ws_url,
        feed_interval_ms: env_or("FEED_INTERVAL_MS", 50),
        gateway_latency_ms: env_or("GATEWAY_LATENCY_MS", 5),
    };

    let d = TraderParams::default();
    let params = TraderParams {
        instrument: env_or("INSTRUMENT", d.instrument),
        lot_size: env_or("LOT_SIZE", d.lot_size),
        position_limit: env_or("POSITION_LIMIT", d.position_limit),
        tick_size: env_or("TICK_SIZE", d.tick_size),
        min_bid: env_or("MINIMUM_BID", d.min_bid),
        max_ask: env_or("MAXIMUM_ASK", d.max_ask),
    };
    params.validate()?;
    Ok((args, params))
}
