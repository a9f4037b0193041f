// ===============================
// src/gateway.rs (mock venue)
// ===============================
//
// Mock market gateway:
// - Insert -> rest di buku; fill penuh saat touch lawan menyeberangi limit
// - Cancel -> status remaining 0 (atau error kalau id tidak dikenal)
// - Hedge  -> langsung fill di touch
// Semua jawaban dikirim ke queue event trader yang sama dengan market data.
//
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use tokio::{
    sync::{broadcast, mpsc},
    time::{sleep, Duration},
};
use tracing::{debug, info, warn};

use crate::domain::{Command, MarketEvent, OrderBook, Side};

#[derive(Debug, Clone, Copy)]
struct Resting { side: Side, px: i64, qty: i64 }

/// Maker rebate, 1 bp of notional (negative fee).
fn maker_fee(px: i64, qty: i64) -> i64 { -(px * qty / 10_000) }

#[derive(Debug, Default)]
pub struct MockVenue {
    resting: HashMap<u64, Resting>,
    seen: HashSet<u64>,
    last_book: Option<OrderBook>,
}

impl MockVenue {
    pub fn new() -> Self { Self::default() }

    #[cfg(test)]
    pub fn resting_count(&self) -> usize { self.resting.len() }

    fn fill(id: u64, px: i64, qty: i64) -> [MarketEvent; 2] {
        [
            MarketEvent::Filled { id, px, qty },
            MarketEvent::Status { id, filled_qty: qty, remaining_qty: 0, fees: maker_fee(px, qty) },
        ]
    }

    fn crosses(side: Side, px: i64, book: &OrderBook) -> bool {
        match side {
            Side::Buy => book.best_ask() != 0 && px >= book.best_ask(),
            Side::Sell => book.best_bid() != 0 && px <= book.best_bid(),
        }
    }

    pub fn on_command(&mut self, cmd: Command) -> Vec<MarketEvent> {
        match cmd {
            Command::Insert { id, side, px, qty, .. } => {
                if !self.seen.insert(id) {
                    return vec![MarketEvent::Error { id, msg: "duplicate order id".into() }];
                }
                if px <= 0 || qty <= 0 {
                    return vec![MarketEvent::Error { id, msg: "invalid price or volume".into() }];
                }
                if let Some(book) = &self.last_book {
                    if Self::crosses(side, px, book) {
                        let touch = match side { Side::Buy => book.best_ask(), Side::Sell => book.best_bid() };
                        return Self::fill(id, touch, qty).to_vec();
                    }
                }
                self.resting.insert(id, Resting { side, px, qty });
                vec![MarketEvent::Status { id, filled_qty: 0, remaining_qty: qty, fees: 0 }]
            }
            Command::Cancel { id } => match self.resting.remove(&id) {
                Some(_) => vec![MarketEvent::Status { id, filled_qty: 0, remaining_qty: 0, fees: 0 }],
                None => vec![MarketEvent::Error { id, msg: "order not found".into() }],
            },
            Command::Hedge { id, side, px, qty } => {
                let touch = self.last_book.as_ref().map(|b| match side {
                    Side::Buy => b.best_ask(),
                    Side::Sell => b.best_bid(),
                });
                match touch {
                    Some(t) if t != 0 && ((side == Side::Buy && px >= t) || (side == Side::Sell && px <= t)) => {
                        vec![MarketEvent::HedgeFilled { id, avg_px: t, qty }]
                    }
                    _ => vec![MarketEvent::Error { id, msg: "hedge not marketable".into() }],
                }
            }
        }
    }

    pub fn on_book(&mut self, book: &OrderBook) -> Vec<MarketEvent> {
        let crossed: Vec<u64> = self
            .resting
            .iter()
            .filter(|(_, r)| Self::crosses(r.side, r.px, book))
            .map(|(id, _)| *id)
            .collect();
        self.last_book = Some(book.clone());

        let mut out = Vec::with_capacity(crossed.len() * 2);
        for id in crossed {
            if let Some(r) = self.resting.remove(&id) {
                out.extend(Self::fill(id, r.px, r.qty));
            }
        }
        out
    }
}

pub async fn run_venue(
    mut cmd_rx: mpsc::Receiver<Command>,
    mut md_rx: broadcast::Receiver<MarketEvent>,
    ev_tx: mpsc::Sender<MarketEvent>,
    latency_ms: u64,
) {
    let mut venue = MockVenue::new();
    info!(latency_ms, "mock venue started");
    loop {
        let out = tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => {
                    sleep(Duration::from_millis(latency_ms)).await;
                    debug!(?cmd, "venue command");
                    venue.on_command(cmd)
                }
                None => break,
            },
            md = md_rx.recv() => match md {
                Ok(MarketEvent::Book(book)) => venue.on_book(&book),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(n, "venue lagged behind market data");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };
        for ev in out {
            if ev_tx.send(ev).await.is_err() {
                warn!("event queue closed, venue stopping");
                return;
            }
        }
    }
    info!("mock venue stopped");
}
