// ===============================
// src/signals.rs
// ===============================
//
// Signal engine, dihitung ulang setiap kali history bertambah:
// 1) Momentum gradient per sisi (rate of change, bukan harga)
// 2) RSI periode 10 atas perubahan mid (seed lalu smoothing Wilder)
// 3) OLS trend (slope, intercept, r, std error) untuk bid/ask/mid
//
use std::collections::VecDeque;

use crate::history::HistoryBuffer;

pub const MOMENTUM_WINDOW: usize = 5;
pub const RSI_PERIOD: usize = 10;
pub const RSI_OVERBOUGHT: f64 = 75.0;
pub const RSI_OVERSOLD: f64 = 25.0;

/// Fractional rate of change per sample over the last (at most) 5 steps.
pub fn momentum_gradient(series: &VecDeque<i64>) -> f64 {
    let Some(&cur) = series.back() else { return 0.0 };
    let start = series[(series.len() - 1).saturating_sub(MOMENTUM_WINDOW)];
    let n = series.len().min(MOMENTUM_WINDOW) as f64;
    (cur - start) as f64 / n / start.max(1) as f64
}

/// Mean of the last `k` samples (fewer if the series is shorter).
pub fn short_avg(series: &VecDeque<i64>, k: usize) -> f64 {
    let n = series.len().min(k);
    if n == 0 {
        return 0.0;
    }
    series.iter().skip(series.len() - n).sum::<i64>() as f64 / n as f64
}

/// Sample standard deviation (n - 1) of the last `k` samples. Needs at least two.
pub fn stdev_last(series: &VecDeque<i64>, k: usize) -> Option<f64> {
    let n = series.len().min(k);
    if n < 2 {
        return None;
    }
    let mean = short_avg(series, k);
    let ss: f64 = series
        .iter()
        .skip(series.len() - n)
        .map(|&v| (v as f64 - mean).powi(2))
        .sum();
    Some((ss / (n - 1) as f64).sqrt())
}

// -----------------------------------------------------------------------------
// RSI
// -----------------------------------------------------------------------------

/// Smoothed average gain/loss. `None` until the first 11 mid samples are seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsiState {
    avg: Option<(f64, f64)>,
}

impl RsiState {
    pub fn new() -> Self { Self::default() }

    /// Feed the mid series after a new sample was appended.
    pub fn update(&mut self, mids: &VecDeque<i64>) -> Option<f64> {
        let len = mids.len();
        if len < RSI_PERIOD + 1 {
            return None;
        }
        let p = RSI_PERIOD as f64;
        let (gain, loss) = match self.avg {
            None => {
                let (g, l) = (len - RSI_PERIOD - 1..len - 1)
                    .map(|i| mids[i + 1] - mids[i])
                    .fold((0_i64, 0_i64), |(g, l), d| if d > 0 { (g + d, l) } else { (g, l - d) });
                (g as f64 / p, l as f64 / p)
            }
            Some((g, l)) => {
                let d = mids[len - 1] - mids[len - 2];
                let (up, down) = if d > 0 { (d as f64, 0.0) } else { (0.0, -d as f64) };
                ((g * (p - 1.0) + up) / p, (l * (p - 1.0) + down) / p)
            }
        };
        self.avg = Some((gain, loss));
        Some(rsi_value(gain, loss))
    }
}

/// avg_loss == 0 => 100 (or 50 when there was no movement at all).
pub fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

pub fn is_overbought(rsi: Option<f64>) -> bool { rsi.is_some_and(|v| v > RSI_OVERBOUGHT) }
pub fn is_oversold(rsi: Option<f64>) -> bool { rsi.is_some_and(|v| v < RSI_OVERSOLD) }

// -----------------------------------------------------------------------------
// OLS trend
// -----------------------------------------------------------------------------

/// Least-squares line through (i, series[i]). All zero when fewer than two points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub n: usize,
}

impl Trend {
    pub fn fit(series: &VecDeque<i64>) -> Self {
        let n = series.len();
        if n < 2 {
            return Self { n, ..Self::default() };
        }
        let nf = n as f64;
        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = series.iter().sum::<i64>() as f64 / nf;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (i, &y) in series.iter().enumerate() {
            let dx = i as f64 - x_mean;
            let dy = y as f64 - y_mean;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;
        let den = (sxx * syy).sqrt();
        let r = if den == 0.0 { 0.0 } else { (sxy / den).clamp(-1.0, 1.0) };
        let std_err = if n > 2 {
            ((1.0 - r * r).max(0.0) * syy / sxx / (nf - 2.0)).sqrt()
        } else {
            0.0
        };
        Self { slope, intercept, r, std_err, n }
    }

    /// Extrapolate one step past the last sample.
    pub fn next_value(&self) -> f64 { self.intercept + self.slope * self.n as f64 }

    pub fn is_strong(&self, min_abs_r: f64) -> bool { self.r.abs() >= min_abs_r }
}

// -----------------------------------------------------------------------------
// Engine
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub grad_bid: f64,
    pub grad_ask: f64,
    pub rsi: Option<f64>,
    pub bid_trend: Trend,
    pub ask_trend: Trend,
    pub mid_trend: Trend,
}

/// Owns the only piece of signal state that survives between updates (RSI averages).
#[derive(Debug, Default)]
pub struct SignalEngine {
    rsi: RsiState,
}

impl SignalEngine {
    pub fn new() -> Self { Self { rsi: RsiState::new() } }

    /// Call exactly once per appended sample.
    pub fn compute(&mut self, h: &HistoryBuffer) -> Signals {
        Signals {
            grad_bid: momentum_gradient(h.bids()),
            grad_ask: momentum_gradient(h.asks()),
            rsi: self.rsi.update(h.mids()),
            bid_trend: Trend::fit(h.bids()),
            ask_trend: Trend::fit(h.asks()),
            mid_trend: Trend::fit(h.mids()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceSample;

    fn dq(v: &[i64]) -> VecDeque<i64> { v.iter().copied().collect() }

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    /// Textbook Wilder RSI over the whole series (no window cap).
    fn reference_rsi(series: &[i64]) -> f64 {
        let deltas: Vec<i64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let p = RSI_PERIOD as f64;
        let mut g = deltas[..RSI_PERIOD].iter().filter(|d| **d > 0).sum::<i64>() as f64 / p;
        let mut l = -deltas[..RSI_PERIOD].iter().filter(|d| **d < 0).sum::<i64>() as f64 / p;
        for d in &deltas[RSI_PERIOD..] {
            g = (g * (p - 1.0) + (*d).max(0) as f64) / p;
            l = (l * (p - 1.0) + (-*d).max(0) as f64) / p;
        }
        100.0 - 100.0 / (1.0 + g / l)
    }

    #[test]
    fn test_gradient_full_window() {
        let s = dq(&[1000, 1100, 1200, 1300, 1400, 1500, 1600]);
        // start = 1100, 5 steps
        assert!(close(momentum_gradient(&s), 500.0 / 5.0 / 1100.0));
    }

    #[test]
    fn test_gradient_short_series() {
        assert!(close(momentum_gradient(&dq(&[1000, 1200])), 200.0 / 2.0 / 1000.0));
        assert!(close(momentum_gradient(&dq(&[1000])), 0.0));
        assert!(close(momentum_gradient(&dq(&[])), 0.0));
    }

    #[test]
    fn test_gradient_zero_start_guard() {
        assert!(close(momentum_gradient(&dq(&[0, 300])), 150.0));
    }

    #[test]
    fn test_short_avg_and_stdev() {
        let s = dq(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(close(short_avg(&s, 7), 4.0));
        assert!(close(stdev_last(&s, 7).unwrap(), (28.0_f64 / 6.0).sqrt()));
        assert!(stdev_last(&dq(&[5]), 7).is_none());
    }

    #[test]
    fn test_rsi_unknown_before_eleven_samples() {
        let mut st = RsiState::new();
        let mut s = VecDeque::new();
        for i in 0..10 {
            s.push_back(100 + i);
            assert!(st.update(&s).is_none());
        }
        s.push_back(200);
        assert!(st.update(&s).is_some());
    }

    #[test]
    fn test_rsi_matches_wilder_reference() {
        let series: Vec<i64> = vec![
            10000, 10100, 10050, 10200, 10150, 10300, 10250, 10100, 10200, 10350, 10300,
            10250, 10400, 10380, 10500, 10450, 10300, 10320, 10600, 10550, 10500,
        ];
        let mut h = HistoryBuffer::new();
        let mut st = RsiState::new();
        let mut last = None;
        for &m in &series {
            h.push(PriceSample { vbid: m, vask: m, mid: m });
            last = st.update(h.mids());
        }
        assert!(close(last.unwrap(), reference_rsi(&series)));
    }

    #[test]
    fn test_rsi_zero_loss_policy() {
        assert!(close(rsi_value(5.0, 0.0), 100.0));
        assert!(close(rsi_value(0.0, 0.0), 50.0));
        assert!(close(rsi_value(1.0, 1.0), 50.0));
        assert!(is_overbought(Some(80.0)));
        assert!(!is_overbought(None));
        assert!(is_oversold(Some(10.0)));
    }

    #[test]
    fn test_trend_perfect_line() {
        let s: VecDeque<i64> = (0..15).map(|i| 500 + 100 * i).collect();
        let t = Trend::fit(&s);
        assert!(close(t.slope, 100.0));
        assert!(close(t.intercept, 500.0));
        assert!(close(t.r, 1.0));
        assert!(t.std_err.abs() < 1e-6);
        assert!(t.is_strong(0.8));
        assert!(close(t.next_value(), 2000.0));
    }

    #[test]
    fn test_trend_slope_std_err_on_noisy_series() {
        // sxx = 5, sxy = 4, syy = 5 -> slope 0.8, r 0.8, stderr sqrt(0.36 * 5 / 5 / 2)
        let t = Trend::fit(&dq(&[0, 2, 1, 3]));
        assert!(close(t.slope, 0.8));
        assert!(close(t.intercept, 0.3));
        assert!(close(t.r, 0.8));
        assert!(close(t.std_err, 0.18_f64.sqrt()));

        let two = Trend::fit(&dq(&[100, 300]));
        assert!(close(two.slope, 200.0));
        assert!(close(two.r, 1.0));
        assert_eq!(two.std_err, 0.0);
    }

    #[test]
    fn test_trend_falling_line_negative_r() {
        let s: VecDeque<i64> = (0..10).map(|i| 9000 - 50 * i).collect();
        let t = Trend::fit(&s);
        assert!(close(t.r, -1.0));
        assert!(t.is_strong(0.8));
    }

    #[test]
    fn test_trend_flat_and_degenerate() {
        let t = Trend::fit(&dq(&[10050; 15]));
        assert!(close(t.r, 0.0));
        assert!(close(t.slope, 0.0));
        assert!(!t.is_strong(0.8));

        let one = Trend::fit(&dq(&[10050]));
        assert_eq!(one.slope, 0.0);
        assert_eq!(one.r, 0.0);
        assert_eq!(one.n, 1);
    }

    #[test]
    fn test_engine_compute_flat() {
        let mut h = HistoryBuffer::new();
        let mut eng = SignalEngine::new();
        for i in 0..15 {
            h.push(PriceSample { vbid: 10000, vask: 10100, mid: 10050 });
            let sig = eng.compute(&h);
            assert_eq!(sig.rsi.is_some(), i >= 10);
            assert!(close(sig.grad_bid, 0.0));
        }
    }
}
