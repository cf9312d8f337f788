//! Online technical indicators over a streaming price series.
//!
//! Every update is O(1) amortized in the bar index: SMA/VWAP keep rolling
//! sums over bounded FIFOs, EMA and RSI carry recursive state. The engine
//! owns one instance of each indicator per tracked window; the orchestrator
//! calls [`IndicatorEngine::add_price`] exactly once per bar, after which
//! all queries borrow immutably.

use std::collections::{BTreeMap, VecDeque};

/// Storage cap for the log-return FIFO, independent of the query window.
const VOL_STORAGE_CAP: usize = 20;

/// Trading minutes per session, used to scale per-bar variance to daily.
const MINUTES_PER_SESSION: f64 = 390.0;

/// Trading days per year, used to annualize daily volatility.
const DAYS_PER_YEAR: f64 = 252.0;

/// Simple moving average with fixed window.
#[derive(Debug, Clone)]
pub struct Sma {
    window: VecDeque<f64>,
    period: usize,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { window: VecDeque::with_capacity(period), period, sum: 0.0 }
    }

    pub fn update(&mut self, price: f64) -> f64 {
        self.sum += price;
        self.window.push_back(price);
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap_or(0.0);
        }
        self.get()
    }

    /// Mean of the last `min(seen, period)` prices; 0.0 while empty.
    pub fn get(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum / self.window.len() as f64
        }
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.period
    }
}

/// Exponential moving average seeded by the first observation.
#[derive(Debug, Clone)]
pub struct Ema {
    value: f64,
    alpha: f64,
    initialized: bool,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { value: 0.0, alpha: 2.0 / (period as f64 + 1.0), initialized: false }
    }

    pub fn update(&mut self, price: f64) -> f64 {
        if !self.initialized {
            self.value = price;
            self.initialized = true;
        } else {
            self.value = self.alpha * price + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    pub fn get(&self) -> f64 {
        self.value
    }
}

/// Relative Strength Index with Wilder smoothing.
///
/// The change buffer holds `window + 1` entries, the first being a zero seed
/// from the opening bar, so the averages initialize after `window + 1` bars
/// with exactly `window` real changes. Reports the neutral 50.0 until
/// initialized and whenever the average loss is zero.
#[derive(Debug, Clone)]
pub struct Rsi {
    window: usize,
    changes: VecDeque<f64>,
    prev_price: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    initialized: bool,
}

impl Rsi {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            changes: VecDeque::with_capacity(window + 1),
            prev_price: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            initialized: false,
        }
    }

    pub fn update(&mut self, price: f64) {
        let change = match self.prev_price {
            None => 0.0,
            Some(prev) => price - prev,
        };
        self.prev_price = Some(price);
        self.changes.push_back(change);
        if self.changes.len() > self.window + 1 {
            self.changes.pop_front();
        }

        if self.initialized {
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            let w = self.window as f64;
            self.avg_gain = (self.avg_gain * (w - 1.0) + gain) / w;
            self.avg_loss = (self.avg_loss * (w - 1.0) + loss) / w;
        } else if self.changes.len() == self.window + 1 {
            let mut gains = 0.0;
            let mut losses = 0.0;
            for &c in self.changes.iter().skip(1) {
                if c > 0.0 {
                    gains += c;
                } else {
                    losses += -c;
                }
            }
            self.avg_gain = gains / self.window as f64;
            self.avg_loss = losses / self.window as f64;
            self.initialized = true;
        }
    }

    pub fn get(&self) -> f64 {
        if !self.initialized || self.avg_loss == 0.0 {
            return 50.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Volume-weighted average price over a fixed window.
#[derive(Debug, Clone)]
pub struct Vwap {
    window: VecDeque<(f64, u64)>,
    period: usize,
    sum_pv: f64,
    sum_v: u64,
}

impl Vwap {
    pub fn new(period: usize) -> Self {
        Self { window: VecDeque::with_capacity(period), period, sum_pv: 0.0, sum_v: 0 }
    }

    pub fn update(&mut self, price: f64, volume: u64) {
        self.window.push_back((price, volume));
        self.sum_pv += price * volume as f64;
        self.sum_v += volume;
        if self.window.len() > self.period {
            if let Some((p, v)) = self.window.pop_front() {
                self.sum_pv -= p * v as f64;
                self.sum_v -= v;
            }
        }
    }

    pub fn get(&self) -> f64 {
        if self.sum_v == 0 {
            0.0
        } else {
            self.sum_pv / self.sum_v as f64
        }
    }
}

/// Window-keyed indicator family fed once per bar.
pub struct IndicatorEngine {
    latest_price: f64,
    latest_volume: u64,
    smas: BTreeMap<usize, Sma>,
    emas: BTreeMap<usize, Ema>,
    vwaps: BTreeMap<usize, Vwap>,
    rsi: Rsi,
    returns: VecDeque<f64>,
    prev_close: Option<f64>,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            latest_price: 0.0,
            latest_volume: 0,
            smas: BTreeMap::new(),
            emas: BTreeMap::new(),
            vwaps: BTreeMap::new(),
            rsi: Rsi::new(14),
            returns: VecDeque::with_capacity(VOL_STORAGE_CAP),
            prev_close: None,
        }
    }

    pub fn track_sma(&mut self, window: usize) {
        self.smas.entry(window).or_insert_with(|| Sma::new(window));
    }

    pub fn track_ema(&mut self, window: usize) {
        self.emas.entry(window).or_insert_with(|| Ema::new(window));
    }

    pub fn track_vwap(&mut self, window: usize) {
        self.vwaps.entry(window).or_insert_with(|| Vwap::new(window));
    }

    /// Replace the RSI window. Any change discards the accumulated state.
    pub fn set_rsi_window(&mut self, window: usize) {
        if window != self.rsi.window() {
            self.rsi = Rsi::new(window);
        }
    }

    /// Advance every tracked indicator. Must be called exactly once per bar,
    /// before any query for that bar.
    pub fn add_price(&mut self, price: f64, volume: u64) {
        for sma in self.smas.values_mut() {
            sma.update(price);
        }
        for ema in self.emas.values_mut() {
            ema.update(price);
        }
        for vwap in self.vwaps.values_mut() {
            vwap.update(price, volume);
        }
        self.rsi.update(price);
        if let Some(prev) = self.prev_close {
            if prev > 0.0 {
                self.returns.push_back((price / prev).ln());
                if self.returns.len() > VOL_STORAGE_CAP {
                    self.returns.pop_front();
                }
            }
        }
        self.prev_close = Some(price);
        self.latest_price = price;
        self.latest_volume = volume;
    }

    /// SMA for a tracked window; 0.0 for untracked windows or before data.
    pub fn sma(&self, window: usize) -> f64 {
        self.smas.get(&window).map_or(0.0, Sma::get)
    }

    pub fn ema(&self, window: usize) -> f64 {
        self.emas.get(&window).map_or(0.0, Ema::get)
    }

    pub fn rsi(&self) -> f64 {
        self.rsi.get()
    }

    /// Annualized realized volatility over the tail `min(stored, window)`
    /// log-returns. 0.0 with fewer than two returns.
    pub fn realized_vol(&self, window: usize) -> f64 {
        let k = self.returns.len().min(window);
        if k < 2 {
            return 0.0;
        }
        let tail = self.returns.iter().skip(self.returns.len() - k);
        let mean: f64 = tail.clone().sum::<f64>() / k as f64;
        let variance: f64 =
            tail.map(|r| (r - mean) * (r - mean)).sum::<f64>() / (k as f64 - 1.0);
        let daily_vol = (variance * MINUTES_PER_SESSION).sqrt();
        daily_vol * DAYS_PER_YEAR.sqrt()
    }

    pub fn vwap(&self, window: usize) -> f64 {
        self.vwaps.get(&window).map_or(0.0, Vwap::get)
    }

    pub fn latest_price(&self) -> f64 {
        self.latest_price
    }

    /// Drop all accumulated state, keeping the tracked windows.
    pub fn reset(&mut self) {
        let sma_windows: Vec<usize> = self.smas.keys().copied().collect();
        let ema_windows: Vec<usize> = self.emas.keys().copied().collect();
        let vwap_windows: Vec<usize> = self.vwaps.keys().copied().collect();
        let rsi_window = self.rsi.window();
        *self = Self::new();
        for w in sma_windows {
            self.track_sma(w);
        }
        for w in ema_windows {
            self.track_ema(w);
        }
        for w in vwap_windows {
            self.track_vwap(w);
        }
        self.set_rsi_window(rsi_window);
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}
