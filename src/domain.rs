// ===============================
// src/domain.rs
// ===============================
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub fn now_ns() -> i128 { Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128 }

/// Jumlah level harga per sisi pada order book / trade ticks.
pub const TOP_LEVELS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn sign(&self) -> i64 { match self { Side::Buy => 1, Side::Sell => -1 } }
    pub fn opposite(&self) -> Side { match self { Side::Buy => Side::Sell, Side::Sell => Side::Buy } }
    pub fn label(&self) -> &'static str { match self { Side::Buy => "bid", Side::Sell => "ask" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifespan { GoodForDay }

/// Top-of-book snapshot. Index 0 is the touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub instrument: u32,
    pub seq: u64,
    pub ask_prices: [i64; TOP_LEVELS],
    pub ask_volumes: [i64; TOP_LEVELS],
    pub bid_prices: [i64; TOP_LEVELS],
    pub bid_volumes: [i64; TOP_LEVELS],
}
impl OrderBook {
    pub fn best_bid(&self) -> i64 { self.bid_prices[0] }
    pub fn best_ask(&self) -> i64 { self.ask_prices[0] }
}

/// Aggregated traded volume per price level since the last report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeTicks {
    pub instrument: u32,
    pub seq: u64,
    pub ask_prices: [i64; TOP_LEVELS],
    pub ask_volumes: [i64; TOP_LEVELS],
    pub bid_prices: [i64; TOP_LEVELS],
    pub bid_volumes: [i64; TOP_LEVELS],
}

/// One volume-weighted observation appended per valid book update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample { pub vbid: i64, pub vask: i64, pub mid: i64 }

/// Inbound events from the market gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Book(OrderBook),
    Ticks(TradeTicks),
    Filled { id: u64, px: i64, qty: i64 },
    Status { id: u64, filled_qty: i64, remaining_qty: i64, fees: i64 },
    HedgeFilled { id: u64, avg_px: i64, qty: i64 },
    Error { id: u64, msg: String },
}

/// Outbound commands to the market gateway (fire-and-forget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Insert { id: u64, side: Side, px: i64, qty: i64, lifespan: Lifespan },
    Cancel { id: u64 },
    Hedge { id: u64, side: Side, px: i64, qty: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { In { ts_ns: i128, ev: MarketEvent }, Out { ts_ns: i128, cmd: Command }, Note(String) }
