//! SMA-crossover strategy state machine.
//!
//! One position slot: long, short, or flat. Entries fire on fast/slow SMA
//! crossovers (optionally filtered by RSI and realized volatility), exits on
//! stop-loss, take-profit, or the reverse crossover. Crossovers compare the
//! current SMAs against the values from the previous bar, so no decision
//! ever reads data the bar has not yet produced. At most one order is
//! emitted per bar, and a bar that exits never also enters.

use crate::bars::Bar;
use crate::config::StrategyConfig;
use crate::indicators::IndicatorEngine;

/// Window for the realized-vol gate and the execution slippage model.
pub const VOL_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Immutable order record. `price` is the close at signal time; the
/// execution simulator decides the actual fill price.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: Side,
    pub size: u32,
    pub price: f64,
    pub timestamp: String,
}

pub struct StrategyEngine {
    cfg: StrategyConfig,
    current_position: i64,
    entry_price: f64,
    prev_fast: f64,
    prev_slow: f64,
    sma_initialized: bool,
}

impl StrategyEngine {
    pub fn new(cfg: StrategyConfig) -> Self {
        Self {
            cfg,
            current_position: 0,
            entry_price: 0.0,
            prev_fast: 0.0,
            prev_slow: 0.0,
            sma_initialized: false,
        }
    }

    pub fn position(&self) -> i64 {
        self.current_position
    }

    pub fn is_flat(&self) -> bool {
        self.current_position == 0
    }

    pub fn reset(&mut self) {
        self.current_position = 0;
        self.entry_price = 0.0;
        self.prev_fast = 0.0;
        self.prev_slow = 0.0;
        self.sma_initialized = false;
    }

    /// Evaluate one bar. Indicators must already be updated for this bar.
    pub fn on_bar(&mut self, bar: &Bar, ie: &IndicatorEngine) -> Option<Order> {
        let fast = ie.sma(self.cfg.fast_sma);
        let slow = ie.sma(self.cfg.slow_sma);
        let realized_vol = ie.realized_vol(VOL_WINDOW);

        // Volatility gate: pause trading, but keep the crossover state
        // rolling so it is not stale when the gate reopens.
        if self.cfg.use_vol_filter && realized_vol > self.cfg.vol_threshold {
            self.roll_sma_state(fast, slow);
            return None;
        }

        if self.current_position != 0
            && (self.stop_loss_hit(bar)
                || self.take_profit_hit(bar)
                || self.reverse_crossover(fast, slow))
        {
            let order = Order {
                side: if self.current_position > 0 { Side::Sell } else { Side::Buy },
                size: self.current_position.unsigned_abs() as u32,
                price: bar.close,
                timestamp: bar.timestamp.clone(),
            };
            self.current_position = 0;
            self.entry_price = 0.0;
            self.roll_sma_state(fast, slow);
            return Some(order);
        }

        let mut order = None;
        if self.current_position == 0 && self.sma_initialized {
            if self.long_entry(fast, slow, ie) {
                order = Some(Order {
                    side: Side::Buy,
                    size: self.cfg.position_size,
                    price: bar.close,
                    timestamp: bar.timestamp.clone(),
                });
                self.current_position = self.cfg.position_size as i64;
                self.entry_price = bar.close;
            } else if self.short_entry(fast, slow, ie) {
                order = Some(Order {
                    side: Side::Sell,
                    size: self.cfg.position_size,
                    price: bar.close,
                    timestamp: bar.timestamp.clone(),
                });
                self.current_position = -(self.cfg.position_size as i64);
                self.entry_price = bar.close;
            }
        }

        self.roll_sma_state(fast, slow);
        order
    }

    fn roll_sma_state(&mut self, fast: f64, slow: f64) {
        if fast > 0.0 && slow > 0.0 {
            self.prev_fast = fast;
            self.prev_slow = slow;
            self.sma_initialized = true;
        }
    }

    fn long_entry(&self, fast: f64, slow: f64, ie: &IndicatorEngine) -> bool {
        if fast <= 0.0 || slow <= 0.0 || self.prev_fast <= 0.0 || self.prev_slow <= 0.0 {
            return false;
        }
        let crossover = self.prev_fast <= self.prev_slow && fast > slow;
        if !crossover {
            return false;
        }
        if self.cfg.use_rsi_filter && ie.rsi() > self.cfg.rsi_overbought {
            return false;
        }
        true
    }

    fn short_entry(&self, fast: f64, slow: f64, ie: &IndicatorEngine) -> bool {
        if fast <= 0.0 || slow <= 0.0 || self.prev_fast <= 0.0 || self.prev_slow <= 0.0 {
            return false;
        }
        let crossover = self.prev_fast >= self.prev_slow && fast < slow;
        if !crossover {
            return false;
        }
        if self.cfg.use_rsi_filter && ie.rsi() < self.cfg.rsi_oversold {
            return false;
        }
        true
    }

    /// Stop trigger against the intra-bar extreme; the fill happens at the
    /// close.
    fn stop_loss_hit(&self, bar: &Bar) -> bool {
        if self.entry_price <= 0.0 {
            return false;
        }
        if self.current_position > 0 {
            bar.low <= self.entry_price * (1.0 - self.cfg.stop_loss_pct / 100.0)
        } else if self.current_position < 0 {
            bar.high >= self.entry_price * (1.0 + self.cfg.stop_loss_pct / 100.0)
        } else {
            false
        }
    }

    fn take_profit_hit(&self, bar: &Bar) -> bool {
        if self.entry_price <= 0.0 {
            return false;
        }
        if self.current_position > 0 {
            bar.high >= self.entry_price * (1.0 + self.cfg.take_profit_pct / 100.0)
        } else if self.current_position < 0 {
            bar.low <= self.entry_price * (1.0 - self.cfg.take_profit_pct / 100.0)
        } else {
            false
        }
    }

    fn reverse_crossover(&self, fast: f64, slow: f64) -> bool {
        if fast <= 0.0 || slow <= 0.0 || self.prev_fast <= 0.0 || self.prev_slow <= 0.0 {
            return false;
        }
        if self.current_position > 0 {
            self.prev_fast >= self.prev_slow && fast < slow
        } else if self.current_position < 0 {
            self.prev_fast <= self.prev_slow && fast > slow
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bar(ts: &str, close: f64) -> Bar {
        Bar { timestamp: ts.into(), open: close, high: close, low: close, close, volume: 1000 }
    }

    fn cfg(fast: usize, slow: usize) -> StrategyConfig {
        StrategyConfig {
            name: "test".into(),
            fast_sma: fast,
            slow_sma: slow,
            position_size: 10,
            stop_loss_pct: 50.0,
            take_profit_pct: 1000.0,
            ..StrategyConfig::default()
        }
    }

    fn engine_for(cfg: &StrategyConfig) -> IndicatorEngine {
        let mut ie = IndicatorEngine::new();
        ie.track_sma(cfg.fast_sma);
        ie.track_sma(cfg.slow_sma);
        ie
    }

    fn drive(strategy: &mut StrategyEngine, ie: &mut IndicatorEngine, closes: &[f64]) -> Vec<Order> {
        let mut orders = Vec::new();
        for (i, &c) in closes.iter().enumerate() {
            let bar = flat_bar(&format!("t{}", i), c);
            ie.add_price(bar.close, bar.volume);
            if let Some(o) = strategy.on_bar(&bar, ie) {
                orders.push(o);
            }
        }
        orders
    }

    #[test]
    fn no_orders_on_constant_prices() {
        let cfg = cfg(2, 5);
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes = vec![100.0; 100];
        assert!(drive(&mut s, &mut ie, &closes).is_empty());
        assert!(s.is_flat());
    }

    #[test]
    fn uptrend_enters_long_once() {
        let cfg = cfg(2, 5);
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let orders = drive(&mut s, &mut ie, &closes);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].size, 10);
        // first bar where the 2-SMA pulls above the 5-SMA
        assert_eq!(orders[0].timestamp, "t2");
        assert_eq!(orders[0].price, 102.0);
        assert_eq!(s.position(), 10);
    }

    #[test]
    fn round_trip_on_reverse_crossover() {
        let cfg = StrategyConfig {
            stop_loss_pct: 100.0,
            take_profit_pct: 100.0,
            position_size: 1,
            ..cfg(2, 3)
        };
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0, 9.0, 8.0];
        let orders = drive(&mut s, &mut ie, &closes);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].timestamp, "t5");
        assert_eq!(orders[1].side, Side::Sell);
        assert_eq!(orders[1].timestamp, "t9");
        assert!(s.is_flat());
    }

    #[test]
    fn stop_loss_exits_at_close() {
        let cfg = StrategyConfig { stop_loss_pct: 1.0, position_size: 1, ..cfg(2, 3) };
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        for (i, &c) in [100.0, 100.0, 100.0].iter().enumerate() {
            let bar = flat_bar(&format!("w{}", i), c);
            ie.add_price(bar.close, bar.volume);
            assert!(s.on_bar(&bar, &ie).is_none());
        }
        // crossover bar: enter long at 101
        let entry = flat_bar("t3", 101.0);
        ie.add_price(entry.close, entry.volume);
        let order = s.on_bar(&entry, &ie).expect("entry order");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(s.position(), 1);

        // next bar dips below the 1% stop intra-bar but closes higher
        let dip = Bar {
            timestamp: "t4".into(),
            open: 100.5,
            high: 100.8,
            low: 99.0,
            close: 100.2,
            volume: 1000,
        };
        ie.add_price(dip.close, dip.volume);
        let exit = s.on_bar(&dip, &ie).expect("stop exit");
        assert_eq!(exit.side, Side::Sell);
        assert_eq!(exit.price, 100.2);
        assert!(s.is_flat());
    }

    #[test]
    fn exit_and_entry_never_share_a_bar() {
        // a stop-loss bar that would also satisfy an entry crossover still
        // produces only the exit order
        let cfg = StrategyConfig { stop_loss_pct: 0.1, position_size: 1, ..cfg(2, 3) };
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes = [100.0, 100.0, 100.0, 101.0, 99.0, 103.0];
        let orders = drive(&mut s, &mut ie, &closes);
        for pair in orders.windows(2) {
            assert_ne!(pair[0].timestamp, pair[1].timestamp);
        }
    }

    #[test]
    fn vol_gate_suppresses_orders() {
        let cfg = StrategyConfig { use_vol_filter: true, vol_threshold: 0.0, ..cfg(2, 5) };
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert!(drive(&mut s, &mut ie, &closes).is_empty());
    }

    #[test]
    fn rsi_filter_blocks_overbought_longs() {
        let base = cfg(2, 5);
        // flat shelf, then a surge that triggers the long crossover
        let mut closes = vec![100.0; 6];
        closes.extend((0..10).map(|i| 103.0 + i as f64 * 3.0));

        // unfiltered: the surge produces exactly one long entry
        let mut ie = engine_for(&base);
        let mut s = StrategyEngine::new(base.clone());
        let unfiltered = drive(&mut s, &mut ie, &closes);
        assert_eq!(unfiltered.len(), 1);
        assert_eq!(unfiltered[0].side, Side::Buy);

        // an overbought bound below the neutral reading suppresses it
        let filtered_cfg = StrategyConfig {
            use_rsi_filter: true,
            rsi_overbought: 40.0,
            ..base
        };
        let mut ie = engine_for(&filtered_cfg);
        let mut s = StrategyEngine::new(filtered_cfg);
        let filtered = drive(&mut s, &mut ie, &closes);
        assert!(filtered.is_empty());
    }

    #[test]
    fn short_entry_on_downward_crossover() {
        let cfg = StrategyConfig {
            stop_loss_pct: 100.0,
            take_profit_pct: 1000.0,
            position_size: 5,
            ..cfg(2, 3)
        };
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes = [10.0, 10.0, 10.0, 9.0, 8.0, 7.0];
        let orders = drive(&mut s, &mut ie, &closes);
        assert!(!orders.is_empty());
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(s.position(), -5);
    }

    #[test]
    fn position_never_exceeds_configured_size() {
        let cfg = cfg(2, 5);
        let max = cfg.position_size as i64;
        let mut ie = engine_for(&cfg);
        let mut s = StrategyEngine::new(cfg);
        let closes: Vec<f64> =
            (0..200).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        for (i, &c) in closes.iter().enumerate() {
            let bar = flat_bar(&format!("t{}", i), c);
            ie.add_price(bar.close, bar.volume);
            s.on_bar(&bar, &ie);
            assert!(s.position().abs() <= max, "bar {}", i);
        }
    }
}
