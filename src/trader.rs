// ===============================
// src/trader.rs
// ===============================
//
// Order & inventory controller. Satu order bid + satu order ask maksimal yang "Working".
//
// Per book update:
//   history.append -> signals -> quote -> reconcile (replace lalu insert)
// Event eksekusi (fill/status/error/hedge) masuk lewat queue yang sama,
// jadi semua event diproses berurutan (single consumer, tanpa lock).
//
// Reservasi volume: setiap order yang belum terkonfirmasi (termasuk yang sedang
// di-cancel) tetap dihitung di pending sisi-nya sampai fill / status akhir.
//
use ahash::AHashMap as HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::TraderParams;
use crate::domain::{now_ns, Command, Event, Lifespan, MarketEvent, OrderBook, Side, TradeTicks};
use crate::history::HistoryBuffer;
use crate::metrics::{
    BOOK_UPDATES, EXECS, ORDERS, PENDING, POSITION, RISK_REJECTS, RSI, SAMPLES_SKIPPED,
    TARGET_PX, TRADE_TICKS,
};
use crate::positions::PositionsTracker;
use crate::quote::{Quote, QuoteModel};
use crate::risk;
use crate::signals::{is_overbought, is_oversold, SignalEngine, Signals};

/// Outbound side of the market gateway. Every call is fire-and-forget.
pub trait Gateway {
    fn submit(&mut self, cmd: Command);

    fn send_insert_order(&mut self, id: u64, side: Side, px: i64, qty: i64, lifespan: Lifespan) {
        self.submit(Command::Insert { id, side, px, qty, lifespan });
    }
    fn send_cancel_order(&mut self, id: u64) {
        self.submit(Command::Cancel { id });
    }
    fn send_hedge_order(&mut self, id: u64, side: Side, px: i64, qty: i64) {
        self.submit(Command::Hedge { id, side, px, qty });
    }
}

impl Gateway for Vec<Command> {
    fn submit(&mut self, cmd: Command) { self.push(cmd); }
}

/// Gateway backed by the command channel, optionally mirroring commands to the recorder.
pub struct ChannelGateway {
    tx: mpsc::Sender<Command>,
    rec_tx: Option<mpsc::Sender<Event>>,
}

impl ChannelGateway {
    pub fn new(tx: mpsc::Sender<Command>, rec_tx: Option<mpsc::Sender<Event>>) -> Self {
        Self { tx, rec_tx }
    }
}

impl Gateway for ChannelGateway {
    fn submit(&mut self, cmd: Command) {
        if let Some(rec) = &self.rec_tx {
            let _ = rec.try_send(Event::Out { ts_ns: now_ns(), cmd: cmd.clone() });
        }
        if let Err(e) = self.tx.try_send(cmd) {
            error!(?e, "command send failed");
        }
    }
}

/// One callback per inbound event kind.
pub trait EventHandler {
    fn on_order_book_update(&mut self, book: &OrderBook);
    fn on_trade_ticks(&mut self, ticks: &TradeTicks);
    fn on_order_filled(&mut self, id: u64, px: i64, qty: i64);
    fn on_order_status(&mut self, id: u64, filled_qty: i64, remaining_qty: i64, fees: i64);
    fn on_hedge_filled(&mut self, id: u64, avg_px: i64, qty: i64);
    fn on_error(&mut self, id: u64, msg: &str);

    fn handle(&mut self, ev: &MarketEvent) {
        match ev {
            MarketEvent::Book(b) => self.on_order_book_update(b),
            MarketEvent::Ticks(t) => self.on_trade_ticks(t),
            MarketEvent::Filled { id, px, qty } => self.on_order_filled(*id, *px, *qty),
            MarketEvent::Status { id, filled_qty, remaining_qty, fees } => {
                self.on_order_status(*id, *filled_qty, *remaining_qty, *fees)
            }
            MarketEvent::HedgeFilled { id, avg_px, qty } => self.on_hedge_filled(*id, *avg_px, *qty),
            MarketEvent::Error { id, msg } => self.on_error(*id, msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Working,
    /// Cancel sent, waiting for the terminal status.
    Cancelling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    pub side: Side,
    pub px: i64,
    pub qty: i64,
    /// Volume still reserved in the side's pending counter.
    pub unfilled: i64,
    pub state: OrderState,
}

/// Live quote per side; id 0 = idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot { pub id: u64, pub px: i64 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    pub position: i64,
    pub pending_bid: i64,
    pub pending_ask: i64,
}

impl Inventory {
    pub fn pending(&self, side: Side) -> i64 {
        match side { Side::Buy => self.pending_bid, Side::Sell => self.pending_ask }
    }
    fn pending_mut(&mut self, side: Side) -> &mut i64 {
        match side { Side::Buy => &mut self.pending_bid, Side::Sell => &mut self.pending_ask }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingHedge { side: Side, remaining: i64 }

pub struct AutoTrader<G: Gateway> {
    params: TraderParams,
    gateway: G,
    history: HistoryBuffer,
    engine: SignalEngine,
    model: QuoteModel,
    orders: HashMap<u64, TrackedOrder>,
    hedges: HashMap<u64, PendingHedge>,
    bid: Slot,
    ask: Slot,
    inv: Inventory,
    next_id: u64,
    positions: PositionsTracker,
}

impl<G: Gateway> AutoTrader<G> {
    pub fn new(params: TraderParams, gateway: G) -> Self {
        let model = QuoteModel::new(params.tick_size);
        Self {
            params,
            gateway,
            history: HistoryBuffer::new(),
            engine: SignalEngine::new(),
            model,
            orders: HashMap::new(),
            hedges: HashMap::new(),
            bid: Slot::default(),
            ask: Slot::default(),
            inv: Inventory::default(),
            next_id: 0,
            positions: PositionsTracker::new(),
        }
    }

    pub fn gateway(&self) -> &G { &self.gateway }
    pub fn inventory(&self) -> Inventory { self.inv }
    pub fn positions(&self) -> &PositionsTracker { &self.positions }
    pub fn slot(&self, side: Side) -> Slot {
        match side { Side::Buy => self.bid, Side::Sell => self.ask }
    }
    #[cfg(test)]
    pub fn orders(&self) -> impl Iterator<Item = (&u64, &TrackedOrder)> { self.orders.iter() }
    pub fn working_count(&self, side: Side) -> usize {
        self.orders.values().filter(|o| o.side == side && o.state == OrderState::Working).count()
    }

    fn slot_mut(&mut self, side: Side) -> &mut Slot {
        match side { Side::Buy => &mut self.bid, Side::Sell => &mut self.ask }
    }

    fn next_order_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn publish_inventory(&self) {
        POSITION.set(self.inv.position);
        PENDING.with_label_values(&["bid"]).set(self.inv.pending_bid);
        PENDING.with_label_values(&["ask"]).set(self.inv.pending_ask);
    }

    /// Replace pass then insert pass, once per sample.
    pub(crate) fn reconcile(&mut self, q: &Quote, sig: &Signals) {
        self.maybe_replace(Side::Buy, q.bid, sig.grad_bid);
        self.maybe_replace(Side::Sell, q.ask, sig.grad_ask);

        let veto_bid = q.deviation_bid && is_overbought(sig.rsi);
        let veto_ask = q.deviation_ask && is_oversold(sig.rsi);
        self.maybe_insert(Side::Buy, q.bid, veto_bid);
        self.maybe_insert(Side::Sell, q.ask, veto_ask);
        debug_assert!(self.working_count(Side::Buy) <= 1 && self.working_count(Side::Sell) <= 1);
        self.publish_inventory();
    }

    fn maybe_replace(&mut self, side: Side, target: i64, gradient: f64) {
        let slot = self.slot(side);
        if slot.id == 0 || target == 0 {
            return;
        }
        // gradient bertanda: saat negatif, band kosong dan order selalu di-requote
        let resting = slot.px as f64;
        let t = target as f64;
        if !(t > resting * (1.0 + gradient) || t < resting * (1.0 - gradient)) {
            return;
        }

        info!(side = side.label(), id = slot.id, resting = slot.px, target, "replace: cancel");
        self.gateway.send_cancel_order(slot.id);
        ORDERS.with_label_values(&["cancel", side.label()]).inc();
        if let Some(o) = self.orders.get_mut(&slot.id) {
            o.state = OrderState::Cancelling;
        }
        *self.slot_mut(side) = Slot::default();
    }

    fn maybe_insert(&mut self, side: Side, target: i64, veto: bool) {
        if self.slot(side).id != 0 || target == 0 {
            return;
        }
        if veto {
            debug!(side = side.label(), target, "insert skipped: deviation at RSI extreme");
            return;
        }
        let lot = self.params.lot_size;
        if let Err(e) = risk::check_insert(
            side,
            target,
            lot,
            self.inv.position,
            self.inv.pending(side),
            &self.params,
        ) {
            RISK_REJECTS.with_label_values(&[e.reason()]).inc();
            debug!(side = side.label(), target, %e, "insert skipped");
            return;
        }

        let id = self.next_order_id();
        self.orders.insert(
            id,
            TrackedOrder { side, px: target, qty: lot, unfilled: lot, state: OrderState::Working },
        );
        *self.inv.pending_mut(side) += lot;
        *self.slot_mut(side) = Slot { id, px: target };
        info!(side = side.label(), id, px = target, qty = lot, "insert");
        self.gateway.send_insert_order(id, side, target, lot, Lifespan::GoodForDay);
        ORDERS.with_label_values(&["insert", side.label()]).inc();
    }

    fn close_order(&mut self, id: u64) {
        let Some(order) = self.orders.remove(&id) else { return };
        *self.inv.pending_mut(order.side) -= order.unfilled;
        if self.slot(order.side).id == id {
            *self.slot_mut(order.side) = Slot::default();
        }
        debug!(id, side = order.side.label(), released = order.unfilled, "order closed");
        self.publish_inventory();
    }
}

impl<G: Gateway> EventHandler for AutoTrader<G> {
    fn on_order_book_update(&mut self, book: &OrderBook) {
        BOOK_UPDATES.inc();
        if book.instrument != self.params.instrument {
            return;
        }
        let Some(sample) = self.history.append(book) else {
            SAMPLES_SKIPPED.inc();
            debug!(seq = book.seq, best_bid = book.best_bid(), "no sample from book");
            return;
        };

        let sig = self.engine.compute(&self.history);
        let quote = self.model.compute(&self.history, &sig, book);

        RSI.set(sig.rsi.unwrap_or(-1.0));
        TARGET_PX.with_label_values(&["bid"]).set(quote.bid);
        TARGET_PX.with_label_values(&["ask"]).set(quote.ask);
        self.positions.mark_to_market(sample.mid);
        debug!(
            seq = book.seq,
            vbid = sample.vbid,
            vask = sample.vask,
            rsi = ?sig.rsi,
            bid = quote.bid,
            ask = quote.ask,
            "quote"
        );

        self.reconcile(&quote, &sig);
    }

    fn on_trade_ticks(&mut self, ticks: &TradeTicks) {
        TRADE_TICKS.inc();
        debug!(instrument = ticks.instrument, seq = ticks.seq, "trade ticks");
    }

    fn on_order_filled(&mut self, id: u64, px: i64, qty: i64) {
        EXECS.with_label_values(&["filled"]).inc();
        let Some(order) = self.orders.get_mut(&id) else {
            debug!(id, "fill for unknown order ignored");
            return;
        };
        let side = order.side;
        let released = qty.min(order.unfilled);
        order.unfilled -= released;

        self.inv.position += side.sign() * qty;
        *self.inv.pending_mut(side) -= released;
        self.positions.on_fill(side, px, qty);

        let hedge_side = side.opposite();
        let hedge_px = match hedge_side {
            Side::Sell => self.params.min_bid_nearest_tick(),
            Side::Buy => self.params.max_ask_nearest_tick(),
        };
        let hedge_id = self.next_order_id();
        self.hedges.insert(hedge_id, PendingHedge { side: hedge_side, remaining: qty });
        info!(id, side = side.label(), px, qty, position = self.inv.position, hedge_id, "filled, hedging");
        self.gateway.send_hedge_order(hedge_id, hedge_side, hedge_px, qty);
        ORDERS.with_label_values(&["hedge", hedge_side.label()]).inc();
        self.publish_inventory();
    }

    fn on_order_status(&mut self, id: u64, filled_qty: i64, remaining_qty: i64, fees: i64) {
        EXECS.with_label_values(&["status"]).inc();
        debug!(id, filled_qty, remaining_qty, fees, "order status");
        if remaining_qty == 0 {
            self.close_order(id);
        }
    }

    fn on_hedge_filled(&mut self, id: u64, avg_px: i64, qty: i64) {
        EXECS.with_label_values(&["hedge_filled"]).inc();
        let Some(h) = self.hedges.get_mut(&id) else {
            info!(id, avg_px, qty, "hedge filled (untracked id)");
            return;
        };
        h.remaining -= qty;
        let side = h.side;
        if h.remaining <= 0 {
            self.hedges.remove(&id);
        }
        self.positions.on_hedge_fill(side, avg_px, qty);
        info!(id, avg_px, qty, net_qty = self.positions.net_qty(), "hedge filled");
    }

    fn on_error(&mut self, id: u64, msg: &str) {
        EXECS.with_label_values(&["error"]).inc();
        warn!(id, %msg, "gateway error");
        if id == 0 {
            return;
        }
        if self.orders.contains_key(&id) {
            self.on_order_status(id, 0, 0, 0);
        } else if self.hedges.remove(&id).is_some() {
            warn!(id, "hedge order rejected");
        }
    }
}

/// Single consumer: every event is handled to completion before the next one.
pub async fn run<G: Gateway>(
    mut rx: mpsc::Receiver<MarketEvent>,
    mut trader: AutoTrader<G>,
    rec_tx: Option<mpsc::Sender<Event>>,
) -> AutoTrader<G> {
    while let Some(ev) = rx.recv().await {
        if let Some(rec) = &rec_tx {
            let _ = rec.try_send(Event::In { ts_ns: now_ns(), ev: ev.clone() });
        }
        trader.handle(&ev);
    }
    info!(position = trader.inv.position, "event queue closed, trader stopped");
    trader
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn book(vbid: i64, vask: i64, best_bid: i64, best_ask: i64) -> OrderBook {
        OrderBook {
            instrument: 0,
            seq: 0,
            ask_prices: [best_ask, vask, vask, vask, 0],
            ask_volumes: [10, 5, 5, 5, 0],
            bid_prices: [best_bid, vbid, vbid, vbid, 0],
            bid_volumes: [10, 5, 5, 5, 0],
        }
    }

    fn trader_with(params: TraderParams) -> AutoTrader<Vec<Command>> {
        AutoTrader::new(params, Vec::new())
    }

    fn trader() -> AutoTrader<Vec<Command>> { trader_with(TraderParams::default()) }

    fn insert(id: u64, side: Side, px: i64) -> Command {
        Command::Insert { id, side, px, qty: 10, lifespan: Lifespan::GoodForDay }
    }

    #[test]
    fn test_first_book_quotes_both_sides() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        assert_eq!(t.gateway(), &vec![insert(1, Side::Buy, 10000), insert(2, Side::Sell, 10100)]);
        assert_eq!(t.slot(Side::Buy), Slot { id: 1, px: 10000 });
        assert_eq!(t.inventory().pending_bid, 10);
        assert_eq!(t.inventory().pending_ask, 10);
    }

    #[test]
    fn test_replace_then_insert_keeps_one_working_order() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        // bid jumps: extrapolated 11000, clamped to touch + tick
        t.on_order_book_update(&book(10500, 10100, 10600, 10150));

        assert_eq!(t.gateway()[2..], [Command::Cancel { id: 1 }, insert(3, Side::Buy, 10700)]);
        assert_eq!(t.working_count(Side::Buy), 1);
        assert_eq!(t.orders().filter(|(_, o)| o.side == Side::Buy).count(), 2);
        // old order still reserved until its cancel is confirmed
        assert_eq!(t.inventory().pending_bid, 20);
        assert_eq!(t.slot(Side::Sell).id, 2);

        t.on_order_status(1, 0, 0, 0);
        assert_eq!(t.inventory().pending_bid, 10);
        assert_eq!(t.slot(Side::Buy), Slot { id: 3, px: 10700 });
    }

    #[test]
    fn test_fill_updates_position_and_hedges() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        t.on_order_filled(1, 10000, 10);

        let inv = t.inventory();
        assert_eq!(inv.position, 10);
        assert_eq!(inv.pending_bid, 0);
        assert_eq!(
            t.gateway().last(),
            Some(&Command::Hedge { id: 3, side: Side::Sell, px: 100, qty: 10 })
        );

        t.on_order_status(1, 10, 0, -2);
        assert_eq!(t.slot(Side::Buy), Slot::default());
        assert_eq!(t.orders().count(), 1);
    }

    #[test]
    fn test_partial_ask_fill_hedges_at_max_tick() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        t.on_order_filled(2, 10100, 4);

        assert_eq!(t.inventory().position, -4);
        assert_eq!(t.inventory().pending_ask, 6);
        assert_eq!(
            t.gateway().last(),
            Some(&Command::Hedge { id: 3, side: Side::Buy, px: 2_147_483_600, qty: 4 })
        );
        // still working, remaining 6
        assert_eq!(t.slot(Side::Sell).id, 2);
    }

    #[test]
    fn test_late_fill_on_cancelling_order_still_counts() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        t.on_order_book_update(&book(10500, 10100, 10600, 10150));
        t.on_order_filled(1, 10000, 10);

        assert_eq!(t.inventory().position, 10);
        assert_eq!(t.inventory().pending_bid, 10);
        assert!(matches!(t.gateway().last(), Some(Command::Hedge { side: Side::Sell, qty: 10, .. })));
    }

    #[test]
    fn test_position_limit_blocks_insert() {
        let mut t = trader_with(TraderParams { position_limit: 15, ..TraderParams::default() });
        let b = book(10000, 10100, 10050, 10150);
        t.on_order_book_update(&b);
        t.on_order_filled(1, 10000, 10);
        t.on_order_status(1, 10, 0, 0);
        let sent = t.gateway().len();

        t.on_order_book_update(&b);
        assert_eq!(t.gateway().len(), sent);
        assert_eq!(t.slot(Side::Buy).id, 0);
        assert_eq!(t.slot(Side::Sell).id, 2);
    }

    #[test]
    fn test_error_on_tracked_order_closes_it() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        t.on_error(2, "invalid price");
        assert_eq!(t.slot(Side::Sell), Slot::default());
        assert_eq!(t.inventory().pending_ask, 0);

        t.on_error(99, "no such order");
        t.on_error(0, "session warning");
        assert_eq!(t.orders().count(), 1);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut t = trader();
        t.on_order_filled(42, 10000, 10);
        t.on_order_status(42, 0, 0, 0);
        t.on_hedge_filled(42, 100, 10);
        assert!(t.gateway().is_empty());
        assert_eq!(t.inventory(), Inventory::default());
    }

    #[test]
    fn test_other_instrument_and_closed_market_skipped() {
        let mut t = trader();
        let mut other = book(10000, 10100, 10050, 10150);
        other.instrument = 1;
        t.on_order_book_update(&other);
        t.on_order_book_update(&book(10000, 10100, 0, 10150));
        assert!(t.gateway().is_empty());
    }

    #[test]
    fn test_hedge_fill_tracked() {
        let mut t = trader();
        t.on_order_book_update(&book(10000, 10100, 10050, 10150));
        t.on_order_filled(1, 10000, 10);
        t.on_hedge_filled(3, 9990, 10);
        assert_eq!(t.positions().hedge.qty, -10);
        assert_eq!(t.positions().net_qty(), 0);
        assert!(t.hedges.is_empty());
    }

    #[test]
    fn test_insert_vetoed_on_deviation_at_rsi_extreme() {
        let mut t = trader();
        let q = Quote { bid: 10000, ask: 10100, deviation_bid: true, deviation_ask: false };
        let sig = Signals { rsi: Some(80.0), ..Signals::default() };
        t.reconcile(&q, &sig);
        assert_eq!(t.gateway(), &vec![insert(1, Side::Sell, 10100)]);

        // deviation alone does not veto
        let mut t = trader();
        let sig = Signals { rsi: Some(50.0), ..Signals::default() };
        t.reconcile(&q, &sig);
        assert_eq!(t.gateway().len(), 2);
    }

    #[test]
    fn test_replace_band_follows_own_gradient() {
        let mut t = trader();
        let sig = Signals { grad_bid: 0.01, grad_ask: 0.0, ..Signals::default() };
        t.reconcile(&Quote { bid: 10000, ask: 10100, ..Quote::default() }, &sig);
        assert_eq!(t.gateway().len(), 2);

        // bid inside its 1% band, ask unchanged: nothing to do
        t.reconcile(&Quote { bid: 10050, ask: 10100, ..Quote::default() }, &sig);
        assert_eq!(t.gateway().len(), 2);

        // bid leaves its band, ask stays
        t.reconcile(&Quote { bid: 10200, ask: 10100, ..Quote::default() }, &sig);
        assert_eq!(t.gateway()[2..], [Command::Cancel { id: 1 }, insert(3, Side::Buy, 10200)]);
    }

    #[test]
    fn test_negative_gradient_always_requotes() {
        let mut t = trader();
        let sig = Signals { grad_ask: -0.01, ..Signals::default() };
        t.reconcile(&Quote { bid: 10000, ask: 10100, ..Quote::default() }, &sig);
        assert_eq!(t.gateway().len(), 2);

        // 10050 > 10100 * 0.99: outside the (empty) band
        t.reconcile(&Quote { bid: 10000, ask: 10050, ..Quote::default() }, &sig);
        assert_eq!(t.gateway()[2..], [Command::Cancel { id: 2 }, insert(3, Side::Sell, 10050)]);
        assert_eq!(t.slot(Side::Buy).id, 1);

        // even an unchanged target is cancelled again
        t.reconcile(&Quote { bid: 10000, ask: 10050, ..Quote::default() }, &sig);
        assert_eq!(t.gateway()[4..], [Command::Cancel { id: 3 }, insert(4, Side::Sell, 10050)]);
        assert_eq!(t.working_count(Side::Sell), 1);
        assert_eq!(t.inventory().pending_ask, 30);
    }

    #[tokio::test]
    async fn test_run_drains_queue_in_order() {
        let (tx, rx) = mpsc::channel(16);
        let (rec_tx, mut rec_rx) = mpsc::channel(16);
        let h = tokio::spawn(run(rx, trader(), Some(rec_tx)));

        tx.send(MarketEvent::Book(book(10000, 10100, 10050, 10150))).await.unwrap();
        tx.send(MarketEvent::Filled { id: 1, px: 10000, qty: 10 }).await.unwrap();
        tx.send(MarketEvent::Status { id: 1, filled_qty: 10, remaining_qty: 0, fees: 0 }).await.unwrap();
        drop(tx);

        let t = h.await.unwrap();
        assert_eq!(t.inventory().position, 10);
        assert_eq!(t.slot(Side::Buy), Slot::default());
        assert_eq!(t.gateway().len(), 3);

        let mut inbound = 0;
        while let Ok(ev) = rec_rx.try_recv() {
            assert!(matches!(ev, Event::In { .. }));
            inbound += 1;
        }
        assert_eq!(inbound, 3);
    }

    #[test]
    fn test_random_flow_respects_limits() {
        let params = TraderParams { position_limit: 35, ..TraderParams::default() };
        let limit = params.position_limit;
        let mut t = trader_with(params);
        let mut rng = StdRng::seed_from_u64(7);
        let mut mid = 10_000_i64;
        let mut fills = 0;

        for step in 0..2_000 {
            mid = (mid + rng.gen_range(-150..=150)).max(1_000);
            let spread = rng.gen_range(1..=3) * 100;
            t.on_order_book_update(&book(mid - spread, mid + spread, mid - 50, mid + 50));

            let ids: Vec<(u64, TrackedOrder)> = t.orders().map(|(id, o)| (*id, o.clone())).collect();
            for (id, o) in ids {
                match rng.gen_range(0..4) {
                    0 if o.unfilled > 0 => {
                        let q = rng.gen_range(1..=o.unfilled);
                        t.on_order_filled(id, o.px, q);
                        fills += 1;
                        if q == o.unfilled {
                            t.on_order_status(id, o.qty, 0, 0);
                        }
                    }
                    1 if o.state == OrderState::Cancelling => t.on_order_status(id, 0, 0, 0),
                    2 if step % 97 == 0 => t.on_error(id, "rejected"),
                    _ => {}
                }

                let inv = t.inventory();
                assert!(inv.position.abs() <= limit, "position {}", inv.position);
                assert!(inv.position + inv.pending_bid <= limit);
                assert!(inv.position - inv.pending_ask >= -limit);
                assert!(inv.pending_bid >= 0 && inv.pending_ask >= 0);
                assert!(t.working_count(Side::Buy) <= 1);
                assert!(t.working_count(Side::Sell) <= 1);
            }
        }

        let hedges: Vec<&Command> =
            t.gateway().iter().filter(|c| matches!(c, Command::Hedge { .. })).collect();
        assert_eq!(hedges.len(), fills);
        assert!(fills > 0);
    }
}
