// ===============================
// src/positions.rs (PnL & Inventory tracker)
// ===============================
//
// Dua leg: "quote" (order kita yang ter-fill) dan "hedge" (order hedge lawan arah).
// Informational saja, keputusan order tetap di trader.
//
use serde::{Deserialize, Serialize};

use crate::domain::Side;
use crate::metrics::{INV_QTY, PNL_REALIZED, PNL_UNREALIZED};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegPosition { pub qty: i64, pub avg_cost_px: i64, pub realized_pnl: i64 }

impl LegPosition {
    fn apply(&mut self, side: Side, px: i64, qty: i64) {
        let signed_qty = side.sign() * qty;
        let prev_qty = self.qty;
        let new_qty = prev_qty + signed_qty;

        if prev_qty == 0 || prev_qty.signum() == signed_qty.signum() {
            // arah sama -> update avg cost
            self.avg_cost_px = if prev_qty == 0 {
                px
            } else {
                (self.avg_cost_px * prev_qty.abs() + px * qty) / (prev_qty.abs() + qty)
            };
        } else {
            // arah berlawanan -> realize PnL
            let qty_closed = qty.min(prev_qty.abs());
            self.realized_pnl += (px - self.avg_cost_px) * prev_qty.signum() * qty_closed;
            if new_qty == 0 {
                self.avg_cost_px = 0;
            } else if new_qty.signum() != prev_qty.signum() {
                self.avg_cost_px = px;
            }
        }
        self.qty = new_qty;
    }

    fn unrealized(&self, mid: i64) -> i64 {
        if self.qty != 0 && self.avg_cost_px != 0 { (mid - self.avg_cost_px) * self.qty } else { 0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionsTracker {
    pub quote: LegPosition,
    pub hedge: LegPosition,
    pub last_mid: i64,
    pub unrealized_pnl: i64,
}

impl PositionsTracker {
    pub fn new() -> Self { Self::default() }

    pub fn on_fill(&mut self, side: Side, px: i64, qty: i64) {
        self.quote.apply(side, px, qty);
        INV_QTY.with_label_values(&["quote"]).set(self.quote.qty);
        PNL_REALIZED.set(self.realized_pnl());
    }

    pub fn on_hedge_fill(&mut self, side: Side, px: i64, qty: i64) {
        self.hedge.apply(side, px, qty);
        INV_QTY.with_label_values(&["hedge"]).set(self.hedge.qty);
        PNL_REALIZED.set(self.realized_pnl());
    }

    pub fn mark_to_market(&mut self, mid: i64) {
        self.last_mid = mid;
        self.unrealized_pnl = self.quote.unrealized(mid) + self.hedge.unrealized(mid);
        PNL_UNREALIZED.set(self.unrealized_pnl);
    }

    pub fn realized_pnl(&self) -> i64 { self.quote.realized_pnl + self.hedge.realized_pnl }

    /// Net exposure across both legs.
    pub fn net_qty(&self) -> i64 { self.quote.qty + self.hedge.qty }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_realizes_pnl() {
        let mut t = PositionsTracker::new();
        t.on_fill(Side::Buy, 10000, 10);
        t.on_fill(Side::Sell, 10200, 10);
        assert_eq!(t.quote.qty, 0);
        assert_eq!(t.quote.avg_cost_px, 0);
        assert_eq!(t.realized_pnl(), 2000);
    }

    #[test]
    fn test_avg_cost_weighted() {
        let mut t = PositionsTracker::new();
        t.on_fill(Side::Buy, 10000, 10);
        t.on_fill(Side::Buy, 10300, 20);
        assert_eq!(t.quote.avg_cost_px, 10200);
        assert_eq!(t.quote.qty, 30);
    }

    #[test]
    fn test_flip_resets_cost() {
        let mut t = PositionsTracker::new();
        t.on_fill(Side::Sell, 10000, 10);
        t.on_fill(Side::Buy, 9900, 30);
        assert_eq!(t.quote.realized_pnl, 1000);
        assert_eq!(t.quote.qty, 20);
        assert_eq!(t.quote.avg_cost_px, 9900);
    }

    #[test]
    fn test_hedge_neutralizes_exposure() {
        let mut t = PositionsTracker::new();
        t.on_fill(Side::Buy, 10000, 10);
        t.on_hedge_fill(Side::Sell, 10050, 10);
        assert_eq!(t.net_qty(), 0);
        t.mark_to_market(11000);
        // +10000 on quote leg, -9500 on hedge leg
        assert_eq!(t.unrealized_pnl, 500);
    }
}
