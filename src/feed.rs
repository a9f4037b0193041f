// ===============================
// src/feed.rs
// ===============================
//
// Market Data adapters:
// - run_mock      : random-walk 5-level book + trade ticks sesekali
// - run_binance   : Binance WS partial book `depth5@100ms` (Sandbox & Mainnet)
//
// Notes:
// - Domain price scale: 2 decimals (px * 100), volume in 0.001 lots.
//   For production, derive tickSize/stepSize from exchangeInfo and scale properly.
//
use futures_util::StreamExt; // for .next()
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::broadcast, time::sleep};
use tokio_tungstenite::connect_async;
use tracing::{error, info, warn};
use url::Url;

use crate::domain::{MarketEvent, OrderBook, TradeTicks, TOP_LEVELS};
use crate::metrics::{FEED_WS_CONNECTED, FEED_WS_RECONNECTS};

const PX_SCALE: f64 = 100.0;
const QTY_SCALE: f64 = 1000.0;

/// Book generator (random walk on the bid touch, one tick wide spread).
pub async fn run_mock(
    md_tx: broadcast::Sender<MarketEvent>,
    instrument: u32,
    tick: i64,
    interval_ms: u64,
) {
    let mut px_bid: i64 = 1_000 * tick;
    let mut seq: u64 = 0;
    loop {
        // jangan simpan ThreadRng melewati .await
        let (book, ticks) = {
            let mut rng = rand::thread_rng();
            px_bid = (px_bid + rng.gen_range(-1..=1) * tick).max(10 * tick);
            seq += 1;
            let mut b = OrderBook { instrument, seq, ..OrderBook::default() };
            for i in 0..TOP_LEVELS {
                b.bid_prices[i] = px_bid - i as i64 * tick;
                b.ask_prices[i] = px_bid + (i as i64 + 1) * tick;
                b.bid_volumes[i] = rng.gen_range(1..=50);
                b.ask_volumes[i] = rng.gen_range(1..=50);
            }
            let ticks = (seq % 10 == 0).then(|| {
                let mut t = TradeTicks { instrument, seq, ..TradeTicks::default() };
                t.bid_prices[0] = b.bid_prices[0];
                t.bid_volumes[0] = rng.gen_range(1..=20);
                t.ask_prices[0] = b.ask_prices[0];
                t.ask_volumes[0] = rng.gen_range(1..=20);
                t
            });
            (b, ticks)
        };
        let _ = md_tx.send(MarketEvent::Book(book));
        if let Some(t) = ticks {
            let _ = md_tx.send(MarketEvent::Ticks(t));
        }
        sleep(Duration::from_millis(interval_ms)).await;
    }
}

#[derive(Debug, Deserialize)]
struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

fn scaled(s: &str, scale: f64) -> Option<i64> {
    let v = s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)?;
    Some((v * scale).round() as i64)
}

/// Decode one `depth5` payload. Missing levels stay zero; a malformed level rejects the frame.
pub fn parse_depth(txt: &str, instrument: u32) -> Option<OrderBook> {
    let snap: DepthSnapshot = serde_json::from_str(txt).ok()?;
    let mut b = OrderBook { instrument, seq: snap.last_update_id, ..OrderBook::default() };
    for (i, [p, q]) in snap.bids.iter().take(TOP_LEVELS).enumerate() {
        b.bid_prices[i] = scaled(p, PX_SCALE)?;
        b.bid_volumes[i] = scaled(q, QTY_SCALE)?;
    }
    for (i, [p, q]) in snap.asks.iter().take(TOP_LEVELS).enumerate() {
        b.ask_prices[i] = scaled(p, PX_SCALE)?;
        b.ask_volumes[i] = scaled(q, QTY_SCALE)?;
    }
    Some(b)
}

/// Adapter ke Binance WS (read-only) untuk partial book depth 5.
///
/// - `ws_base` diteruskan dari config:
///     * Sandbox: wss://testnet.binance.vision/ws
///     * Mainnet: wss://stream.binance.com:9443/ws
pub async fn run_binance(
    md_tx: broadcast::Sender<MarketEvent>,
    symbol: String,
    ws_base: String,
    instrument: u32,
) {
    let topic = format!("{}@depth5@100ms", symbol.to_lowercase());
    let ws_url = format!("{}/{}", ws_base.trim_end_matches('/'), topic);

    let mut attempt: u32 = 0;
    loop {
        let url = match Url::parse(&ws_url) {
            Ok(u) => u,
            Err(e) => {
                error!(?e, %ws_url, "bad ws url");
                return;
            }
        };

        info!(%ws_url, "connecting binance depth5");
        match connect_async(url).await {
            Ok((mut ws, _resp)) => {
                info!(%symbol, "connected to depth5");
                FEED_WS_CONNECTED.set(1);
                attempt = 0; // reset backoff

                while let Some(frame) = ws.next().await {
                    match frame {
                        Ok(m) if m.is_text() => {
                            let txt = match m.into_text() {
                                Ok(t) => t,
                                Err(e) => {
                                    warn!(?e, "failed to read text frame");
                                    continue;
                                }
                            };
                            match parse_depth(&txt, instrument) {
                                Some(book) => {
                                    let _ = md_tx.send(MarketEvent::Book(book));
                                }
                                None => warn!(len = txt.len(), "unparseable depth frame"),
                            }
                        }
                        Ok(_) => {
                            // ignore non-text frames
                        }
                        Err(e) => {
                            error!(?e, "ws read error");
                            break;
                        }
                    }
                }
                FEED_WS_CONNECTED.set(0);
                info!("depth5 disconnected, will reconnect…");
            }
            Err(e) => {
                error!(?e, "connect failed");
            }
        }

        // Exponential backoff + jitter
        FEED_WS_RECONNECTS.inc();
        attempt = attempt.saturating_add(1);
        let factor = 1u64 << attempt.min(6);         // 2,4,...,64
        let base_ms = 500u64.saturating_mul(factor);
        let jitter = rand::thread_rng().gen_range(0..=250);
        sleep(Duration::from_millis(base_ms + jitter)).await;
    }
}
