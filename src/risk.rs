// ===============================
// src/risk.rs
// ===============================
use thiserror::Error;

use crate::config::TraderParams;
use crate::domain::Side;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskError {
    #[error("Zero price")]
    ZeroPrice,
    #[error("Position limit: projected {projected} outside ±{limit}")]
    PositionLimit { projected: i64, limit: i64 },
    #[error("Price {px} out of band [{min}, {max}]")]
    PriceBand { px: i64, min: i64, max: i64 },
}

impl RiskError {
    pub fn reason(&self) -> &'static str {
        match self {
            RiskError::ZeroPrice => "zero_price",
            RiskError::PositionLimit { .. } => "position_limit",
            RiskError::PriceBand { .. } => "price_band",
        }
    }
}

/// Pre-insert checks. `pending` is the unconfirmed volume already reserved on `side`.
pub fn check_insert(
    side: Side,
    px: i64,
    qty: i64,
    position: i64,
    pending: i64,
    p: &TraderParams,
) -> Result<(), RiskError> {
    // 1) Harga nol = sisi tidak di-quote
    if px == 0 {
        return Err(RiskError::ZeroPrice);
    }

    // 2) Price band
    if px < p.min_bid || px > p.max_ask {
        return Err(RiskError::PriceBand { px, min: p.min_bid, max: p.max_ask });
    }

    // 3) Position limit, asumsikan semua volume pending + order baru ter-fill
    let projected = position + side.sign() * (pending + qty);
    if projected.abs() > p.position_limit {
        return Err(RiskError::PositionLimit { projected, limit: p.position_limit });
    }
    Ok(())
}
