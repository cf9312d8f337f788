//! Market regime classification over a rolling lookback.
//!
//! Each bar is labeled TREND, VOLATILE, or SIDEWAYS from three features of
//! the trailing window: log-return volatility, a volume z-score, and the
//! mean bar range. Until half the lookback has been seen the classifier
//! stays SIDEWAYS.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

use crate::bars::Bar;

pub const DEFAULT_LOOKBACK: usize = 20;

const VOL_THRESHOLD_HIGH: f64 = 0.02;
const VOL_THRESHOLD_LOW: f64 = 0.005;
const VOLUME_ZSCORE_THRESHOLD: f64 = 1.5;

/// Ordering is fixed and used for every regime-keyed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Trend,
    Volatile,
    Sideways,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Trend, Regime::Volatile, Regime::Sideways];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trend => "TREND",
            Regime::Volatile => "VOLATILE",
            Regime::Sideways => "SIDEWAYS",
        }
    }

    /// Stable index into regime-keyed arrays.
    pub fn index(&self) -> usize {
        match self {
            Regime::Trend => 0,
            Regime::Volatile => 1,
            Regime::Sideways => 2,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RegimeClassifier {
    lookback: usize,
    closes: VecDeque<f64>,
    volumes: VecDeque<f64>,
    ranges: VecDeque<f64>,
    current: Regime,
}

impl RegimeClassifier {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            closes: VecDeque::with_capacity(lookback),
            volumes: VecDeque::with_capacity(lookback),
            ranges: VecDeque::with_capacity(lookback),
            current: Regime::Sideways,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Regime {
        self.closes.push_back(bar.close);
        self.volumes.push_back(bar.volume as f64);
        self.ranges.push_back(bar.range());
        if self.closes.len() > self.lookback {
            self.closes.pop_front();
            self.volumes.pop_front();
            self.ranges.pop_front();
        }

        if self.closes.len() < self.lookback / 2 {
            return Regime::Sideways;
        }

        let vol = self.return_vol();
        let vol_z = self.volume_zscore();
        let range_mean = self.range_mean();
        self.current = classify(vol, vol_z, range_mean);
        self.current
    }

    pub fn current(&self) -> Regime {
        self.current
    }

    pub fn reset(&mut self) {
        self.closes.clear();
        self.volumes.clear();
        self.ranges.clear();
        self.current = Regime::Sideways;
    }

    /// Sample standard deviation of log-returns over the buffer.
    fn return_vol(&self) -> f64 {
        if self.closes.len() < 2 {
            return 0.0;
        }
        let mut returns = Vec::with_capacity(self.closes.len() - 1);
        let mut prev: Option<f64> = None;
        for &c in &self.closes {
            if let Some(p) = prev {
                if p > 0.0 {
                    returns.push((c / p).ln());
                }
            }
            prev = Some(c);
        }
        if returns.len() < 2 {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    }

    /// Z-score of the newest volume against the buffer (population stddev).
    fn volume_zscore(&self) -> f64 {
        if self.volumes.len() < 2 {
            return 0.0;
        }
        let n = self.volumes.len() as f64;
        let mean = self.volumes.iter().sum::<f64>() / n;
        let variance = self.volumes.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return 0.0;
        }
        let current = *self.volumes.back().unwrap_or(&0.0);
        (current - mean) / stddev
    }

    fn range_mean(&self) -> f64 {
        if self.ranges.is_empty() {
            return 0.0;
        }
        self.ranges.iter().sum::<f64>() / self.ranges.len() as f64
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK)
    }
}

fn classify(vol: f64, vol_z: f64, range_mean: f64) -> Regime {
    if vol > VOL_THRESHOLD_HIGH && vol_z.abs() > VOLUME_ZSCORE_THRESHOLD {
        return Regime::Volatile;
    }
    // The range band is self-referential and holds whenever range_mean is
    // positive, so this arm reduces to the vol floor. Kept for output parity
    // with downstream consumers of the regime labels.
    if vol > VOL_THRESHOLD_LOW
        && range_mean > range_mean * 0.5
        && range_mean < range_mean * 1.5
    {
        return Regime::Trend;
    }
    Regime::Sideways
}
