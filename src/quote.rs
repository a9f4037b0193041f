// ===============================
// src/quote.rs
// ===============================
//
// Quote model: gabungkan rata-rata pendek + sinyal menjadi target bid/ask.
//   - trend kuat (|r| >= 0.8) -> ekstrapolasi garis regresi satu langkah
//   - selain itu             -> short avg * (1 + gradient * momentum factor)
// Hasil dibulatkan ke bawah ke tick, lalu dijepit maks 1 tick menembus touch.
//
use crate::domain::OrderBook;
use crate::history::HistoryBuffer;
use crate::signals::{short_avg, stdev_last, Signals, RSI_OVERBOUGHT, RSI_OVERSOLD};

pub const SHORT_WINDOW: usize = 7;
pub const QUOTE_TREND_MIN_R: f64 = 0.8;
pub const DEVIATION_TREND_MIN_R: f64 = 0.55;
const RSI_DAMPING: f64 = 0.8;

/// Target prices for one update. A zero price means "do not quote that side".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub bid: i64,
    pub ask: i64,
    /// Bid target sits above the expected mid band.
    pub deviation_bid: bool,
    /// Ask target sits below the expected mid band.
    pub deviation_ask: bool,
}

#[derive(Debug, Clone)]
pub struct QuoteModel {
    tick: i64,
}

impl QuoteModel {
    pub fn new(tick: i64) -> Self { Self { tick } }

    fn floor_to_tick(&self, px: f64) -> i64 {
        ((px / self.tick as f64).floor() as i64 * self.tick).max(0)
    }

    pub fn compute(&self, h: &HistoryBuffer, sig: &Signals, book: &OrderBook) -> Quote {
        let avg_bid = short_avg(h.bids(), SHORT_WINDOW);
        let avg_ask = short_avg(h.asks(), SHORT_WINDOW);

        let raw_bid = if sig.bid_trend.is_strong(QUOTE_TREND_MIN_R) {
            sig.bid_trend.next_value()
        } else {
            // redam momentum naik saat RSI mendekati overbought
            let factor = sig.rsi.map_or(1.0, |rsi| 1.0 + (RSI_OVERBOUGHT - rsi) / 100.0 * RSI_DAMPING);
            avg_bid * (1.0 + sig.grad_bid * factor)
        };
        let raw_ask = if sig.ask_trend.is_strong(QUOTE_TREND_MIN_R) {
            sig.ask_trend.next_value()
        } else {
            let factor = sig.rsi.map_or(1.0, |rsi| 1.0 + (rsi - RSI_OVERSOLD) / 100.0 * RSI_DAMPING);
            avg_ask * (1.0 + sig.grad_ask * factor)
        };

        let bid = match book.best_bid() {
            0 => 0,
            touch => self.floor_to_tick(raw_bid).min(touch + self.tick),
        };
        let ask = match book.best_ask() {
            0 => 0,
            touch => self.floor_to_tick(raw_ask).max(touch - self.tick),
        };

        let mut q = Quote { bid, ask, deviation_bid: false, deviation_ask: false };
        if h.len() < 2 {
            return q;
        }

        let mid = &sig.mid_trend;
        if mid.r.abs() > DEVIATION_TREND_MIN_R {
            let predicted = mid.next_value();
            let band = mid.std_err.abs();
            q.deviation_bid = predicted + band <= bid as f64;
            q.deviation_ask = ask as f64 <= predicted - band;
        } else {
            if let Some(sd) = stdev_last(h.bids(), SHORT_WINDOW) {
                q.deviation_bid = avg_bid + sd <= bid as f64;
            }
            if let Some(sd) = stdev_last(h.asks(), SHORT_WINDOW) {
                q.deviation_ask = ask as f64 <= avg_ask - sd;
            }
        }
        q
    }
}
