// ===============================
// src/history.rs
// ===============================
//
// History buffer: VWAP bid/ask/mid per book update, maks 15 sampel terakhir.
//
use std::collections::VecDeque;

use crate::domain::{OrderBook, PriceSample};

pub const HISTORY_CAP: usize = 15;

/// Volume-weighted price over levels 1..=3 (the touch is excluded).
/// `None` when those levels carry no volume.
pub fn vwap(prices: &[i64], volumes: &[i64]) -> Option<i64> {
    let (num, den) = prices[1..4]
        .iter()
        .zip(&volumes[1..4])
        .fold((0_i64, 0_i64), |(n, d), (&p, &v)| (n + p * v, d + v));
    if den > 0 { Some(num / den) } else { None }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    vbid: VecDeque<i64>,
    vask: VecDeque<i64>,
    mid: VecDeque<i64>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            vbid: VecDeque::with_capacity(HISTORY_CAP + 1),
            vask: VecDeque::with_capacity(HISTORY_CAP + 1),
            mid: VecDeque::with_capacity(HISTORY_CAP + 1),
        }
    }

    /// Append one sample from the book. Returns `None` (nothing appended) when the
    /// bid touch is zero (market closed) or either side has no volume on levels 1..=3.
    pub fn append(&mut self, book: &OrderBook) -> Option<PriceSample> {
        if book.best_bid() == 0 {
            return None;
        }
        let vbid = vwap(&book.bid_prices, &book.bid_volumes)?;
        let vask = vwap(&book.ask_prices, &book.ask_volumes)?;
        let sample = PriceSample { vbid, vask, mid: (vbid + vask) / 2 };
        self.push(sample);
        Some(sample)
    }

    pub fn push(&mut self, s: PriceSample) {
        for (series, v) in [(&mut self.vbid, s.vbid), (&mut self.vask, s.vask), (&mut self.mid, s.mid)] {
            series.push_back(v);
            while series.len() > HISTORY_CAP {
                series.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize { self.mid.len() }
    #[cfg(test)]
    pub fn is_empty(&self) -> bool { self.mid.is_empty() }

    pub fn bids(&self) -> &VecDeque<i64> { &self.vbid }
    pub fn asks(&self) -> &VecDeque<i64> { &self.vask }
    pub fn mids(&self) -> &VecDeque<i64> { &self.mid }
}
