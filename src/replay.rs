// ===============================
// src/replay.rs
// ===============================
//
// Putar ulang file JSONL hasil recorder ke trader baru (tanpa venue).
// Command yang dihasilkan dibandingkan dengan command yang terekam.
//
use std::fs::File;
use std::io::{BufRead, BufReader};

use thiserror::Error;
use tracing::info;

use crate::config::TraderParams;
use crate::domain::{Command, Event, MarketEvent};
use crate::trader::{AutoTrader, EventHandler};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay io: {0}")]
    Io(#[from] std::io::Error),
    #[error("replay line {line}: {source}")]
    Decode { line: usize, source: serde_json::Error },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub books: usize,
    pub fills: usize,
    pub inserts: usize,
    pub cancels: usize,
    pub hedges: usize,
    pub final_position: i64,
    pub realized_pnl: i64,
    /// Replayed command stream equals the recorded one.
    pub matches_recording: bool,
}

pub fn replay_reader<R: BufRead>(reader: R, params: TraderParams) -> Result<ReplaySummary, ReplayError> {
    let mut trader = AutoTrader::new(params, Vec::<Command>::new());
    let mut recorded: Vec<Command> = Vec::new();
    let mut s = ReplaySummary::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let ev: Event =
            serde_json::from_str(&line).map_err(|source| ReplayError::Decode { line: i + 1, source })?;
        match ev {
            Event::In { ev, .. } => {
                s.events += 1;
                match &ev {
                    MarketEvent::Book(_) => s.books += 1,
                    MarketEvent::Filled { .. } => s.fills += 1,
                    _ => {}
                }
                trader.handle(&ev);
            }
            Event::Out { cmd, .. } => recorded.push(cmd),
            Event::Note(_) => {}
        }
    }

    for cmd in trader.gateway() {
        match cmd {
            Command::Insert { .. } => s.inserts += 1,
            Command::Cancel { .. } => s.cancels += 1,
            Command::Hedge { .. } => s.hedges += 1,
        }
    }
    s.final_position = trader.inventory().position;
    s.realized_pnl = trader.positions().realized_pnl();
    s.matches_recording = recorded.is_empty() || recorded == *trader.gateway();
    Ok(s)
}

pub fn replay_file(path: &str, params: TraderParams) -> Result<ReplaySummary, ReplayError> {
    info!(%path, "replay: start");
    let s = replay_reader(BufReader::new(File::open(path)?), params)?;
    info!(
        events = s.events,
        books = s.books,
        fills = s.fills,
        inserts = s.inserts,
        cancels = s.cancels,
        hedges = s.hedges,
        position = s.final_position,
        realized_pnl = s.realized_pnl,
        matches_recording = s.matches_recording,
        "replay: done"
    );
    Ok(s)
}
