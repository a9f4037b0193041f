// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Market data --------
pub static BOOK_UPDATES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("book_updates_total", "order book updates received").unwrap());

pub static TRADE_TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("trade_ticks_total", "trade tick reports received").unwrap());

pub static SAMPLES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("samples_skipped_total", "book updates that produced no price sample").unwrap()
});

// -------- Model output --------
pub static RSI: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("model_rsi", "latest RSI over mid (-1 while unknown)").unwrap());

pub static TARGET_PX: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("model_target_px", "target quote price"), &["side"]).unwrap()
});

// -------- Orders & executions --------
pub static ORDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_total", "outbound commands (labels: action, side)"),
        &["action", "side"],
    )
    .unwrap()
});

pub static RISK_REJECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("risk_rejects_total", "inserts vetoed before sending"), &["reason"])
        .unwrap()
});

pub static EXECS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("exec_events_total", "inbound execution events"), &["kind"]).unwrap()
});

// -------- Inventory & PnL --------
pub static POSITION: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("inventory_position", "net position (lots)").unwrap());

pub static PENDING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("inventory_pending", "unconfirmed order volume"), &["side"]).unwrap()
});

pub static INV_QTY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("inventory_leg_qty", "net qty per leg"), &["leg"]).unwrap()
});

pub static PNL_REALIZED: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("pnl_realized", "realized PnL (price units x lots)").unwrap());

pub static PNL_UNREALIZED: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("pnl_unrealized", "unrealized PnL (price units x lots)").unwrap());

// -------- Feed health --------
pub static FEED_WS_CONNECTED: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("feed_ws_connected", "1 if depth WS connected").unwrap());

pub static FEED_WS_RECONNECTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("feed_ws_reconnects_total", "depth WS reconnect attempts").unwrap());

// ---- Config visibility ----
pub static CONFIG_FEED_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_feed_mode", "feed mode (label: mode)"), &["mode"]).unwrap()
});

pub static CONFIG_LIMITS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_limit", "trader constants (label: name)"),
        &["name"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(BOOK_UPDATES.clone())),
        REGISTRY.register(Box::new(TRADE_TICKS.clone())),
        REGISTRY.register(Box::new(SAMPLES_SKIPPED.clone())),
        REGISTRY.register(Box::new(RSI.clone())),
        REGISTRY.register(Box::new(TARGET_PX.clone())),
        REGISTRY.register(Box::new(ORDERS.clone())),
        REGISTRY.register(Box::new(RISK_REJECTS.clone())),
        REGISTRY.register(Box::new(EXECS.clone())),
        REGISTRY.register(Box::new(POSITION.clone())),
        REGISTRY.register(Box::new(PENDING.clone())),
        REGISTRY.register(Box::new(INV_QTY.clone())),
        REGISTRY.register(Box::new(PNL_REALIZED.clone())),
        REGISTRY.register(Box::new(PNL_UNREALIZED.clone())),
        REGISTRY.register(Box::new(FEED_WS_CONNECTED.clone())),
        REGISTRY.register(Box::new(FEED_WS_RECONNECTS.clone())),
        REGISTRY.register(Box::new(CONFIG_FEED_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_LIMITS.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics)
fn handle_client(mut stream: TcpStream) {
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, ?e, "metrics bind failed, exporter disabled");
                return;
            }
        };
        tracing::info!(%addr, "metrics listening (/ and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(?e, "metrics accept error"),
            }
        }
    });
}
