//! Trade reconciliation, equity tracking, and summary metrics.
//!
//! Fills arrive one at a time. The first fill opens a round-trip trade; the
//! next opposite-side fill closes it. Equity points and drawdown update on
//! every fill. All regime-keyed tallies live in fixed arrays indexed by the
//! regime enum, so exported output never depends on map iteration order.

use crate::execution::Fill;
use crate::regime::Regime;
use crate::strategy::Side;

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;

/// Fixed one-month horizon for return annualization; callers that know the
/// real span override it via [`Analytics::set_time_span_years`].
const DEFAULT_TIME_SPAN_YEARS: f64 = 1.0 / 12.0;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A matched round trip on the single position slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_timestamp: String,
    pub exit_timestamp: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: u32,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub entry_regime: Regime,
    pub exit_regime: Regime,
    pub is_win: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: String,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestSummary {
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    /// Average winning PnL in cash units; the percent name is kept for
    /// compatibility with existing report consumers.
    pub avg_win_pct: f64,
    /// Average losing PnL magnitude in cash units, same naming caveat.
    pub avg_loss_pct: f64,
    pub profit_factor: f64,
    pub initial_cash: f64,
    pub final_cash: f64,
    /// Indexed by [`Regime::index`], keyed by the entry regime.
    pub trades_by_regime: [usize; 3],
    pub pnl_by_regime: [f64; 3],
}

struct OpenTrade {
    entry_fill: Fill,
    entry_regime: Regime,
}

pub struct Analytics {
    fills: Vec<Fill>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    initial_cash: f64,
    current_cash: f64,
    peak_equity: f64,
    max_drawdown_pct: f64,
    open_trade: Option<OpenTrade>,
    time_span_years: f64,
}

impl Analytics {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            fills: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            initial_cash,
            current_cash: initial_cash,
            peak_equity: initial_cash,
            max_drawdown_pct: 0.0,
            open_trade: None,
            time_span_years: DEFAULT_TIME_SPAN_YEARS,
        }
    }

    /// Override the annualization horizon (in years).
    pub fn set_time_span_years(&mut self, years: f64) {
        if years > 0.0 {
            self.time_span_years = years;
        }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn reset(&mut self, initial_cash: f64) {
        *self = Self::new(initial_cash);
    }

    pub fn record_fill(
        &mut self,
        fill: &Fill,
        regime: Regime,
        cash_after: f64,
        position_value_after: f64,
    ) {
        self.fills.push(fill.clone());
        self.current_cash = cash_after;

        let equity = cash_after + position_value_after;
        self.equity_curve.push(EquityPoint { timestamp: fill.timestamp.clone(), equity });
        self.update_drawdown(equity);

        match self.open_trade.as_ref().map(|o| o.entry_fill.order.side) {
            None => {
                if fill.filled_size > 0 {
                    self.open_trade =
                        Some(OpenTrade { entry_fill: fill.clone(), entry_regime: regime });
                }
            }
            Some(entry_side) => {
                // A same-side fill while a trade is open is recorded above
                // but does not re-pair; only the opposite side closes.
                if fill.order.side == entry_side.opposite() {
                    self.close_trade(fill, regime);
                }
            }
        }
    }

    fn close_trade(&mut self, exit_fill: &Fill, exit_regime: Regime) {
        let Some(open) = self.open_trade.take() else {
            return;
        };
        let entry = &open.entry_fill;
        let size = entry.filled_size;
        let (pnl, pnl_pct) = match entry.order.side {
            Side::Buy => (
                (exit_fill.fill_price - entry.fill_price) * size as f64,
                (exit_fill.fill_price - entry.fill_price) / entry.fill_price * 100.0,
            ),
            Side::Sell => (
                (entry.fill_price - exit_fill.fill_price) * size as f64,
                (entry.fill_price - exit_fill.fill_price) / entry.fill_price * 100.0,
            ),
        };
        self.trades.push(Trade {
            entry_timestamp: entry.timestamp.clone(),
            exit_timestamp: exit_fill.timestamp.clone(),
            entry_price: entry.fill_price,
            exit_price: exit_fill.fill_price,
            size,
            pnl,
            pnl_pct,
            entry_regime: open.entry_regime,
            exit_regime,
            is_win: pnl > 0.0,
        });
    }

    fn update_drawdown(&mut self, equity: f64) {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let drawdown = (self.peak_equity - equity) / self.peak_equity * 100.0;
        if drawdown > self.max_drawdown_pct {
            self.max_drawdown_pct = drawdown;
        }
    }

    pub fn summary(&self) -> BacktestSummary {
        let final_cash = self
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_cash);
        let total_return_pct = (final_cash - self.initial_cash) / self.initial_cash * 100.0;
        let annualized_return_pct =
            ((final_cash / self.initial_cash).powf(1.0 / self.time_span_years) - 1.0) * 100.0;

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_win = 0.0;
        let mut total_loss = 0.0;
        let mut trades_by_regime = [0usize; 3];
        let mut pnl_by_regime = [0.0f64; 3];
        for trade in &self.trades {
            if trade.is_win {
                winning_trades += 1;
                total_win += trade.pnl;
            } else {
                losing_trades += 1;
                total_loss += trade.pnl.abs();
            }
            trades_by_regime[trade.entry_regime.index()] += 1;
            pnl_by_regime[trade.entry_regime.index()] += trade.pnl;
        }

        let total_trades = self.trades.len();
        let win_rate_pct = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_win_pct =
            if winning_trades > 0 { total_win / winning_trades as f64 } else { 0.0 };
        let avg_loss_pct =
            if losing_trades > 0 { total_loss / losing_trades as f64 } else { 0.0 };
        let profit_factor =
            if losing_trades > 0 && total_loss > 0.0 { total_win / total_loss } else { 0.0 };

        BacktestSummary {
            total_return_pct,
            annualized_return_pct,
            sharpe_ratio: self.sharpe_ratio(),
            max_drawdown_pct: self.max_drawdown_pct,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate_pct,
            avg_win_pct,
            avg_loss_pct,
            profit_factor,
            initial_cash: self.initial_cash,
            final_cash,
            trades_by_regime,
            pnl_by_regime,
        }
    }

    /// Annualized Sharpe over per-fill equity returns, zero risk-free rate.
    fn sharpe_ratio(&self) -> f64 {
        if self.equity_curve.len() < 2 {
            return 0.0;
        }
        let mut returns = Vec::with_capacity(self.equity_curve.len() - 1);
        for pair in self.equity_curve.windows(2) {
            if pair[0].equity > 0.0 {
                returns.push((pair[1].equity - pair[0].equity) / pair[0].equity);
            }
        }
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return 0.0;
        }
        (mean / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CASH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Order;

    fn fill(side: Side, size: u32, price: f64, ts: &str) -> Fill {
        Fill {
            order: Order { side, size, price, timestamp: ts.into() },
            fill_price: price,
            filled_size: size,
            timestamp: ts.into(),
            slippage: 0.0,
        }
    }

    #[test]
    fn long_round_trip_pnl() {
        let mut a = Analytics::default();
        let entry = fill(Side::Buy, 10, 100.0, "t0");
        a.record_fill(&entry, Regime::Trend, 99_000.0, 1_000.0);
        let exit = fill(Side::Sell, 10, 110.0, "t1");
        a.record_fill(&exit, Regime::Sideways, 100_100.0, 0.0);

        assert_eq!(a.trades().len(), 1);
        let t = &a.trades()[0];
        assert!((t.pnl - 100.0).abs() < 1e-9);
        assert!((t.pnl_pct - 10.0).abs() < 1e-9);
        assert!(t.is_win);
        assert_eq!(t.entry_regime, Regime::Trend);
        assert_eq!(t.exit_regime, Regime::Sideways);
    }

    #[test]
    fn short_round_trip_pnl() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Sell, 5, 100.0, "t0"), Regime::Sideways, 100_500.0, -500.0);
        a.record_fill(&fill(Side::Buy, 5, 90.0, "t1"), Regime::Sideways, 100_050.0, 0.0);
        let t = &a.trades()[0];
        assert!((t.pnl - 50.0).abs() < 1e-9);
        assert!((t.pnl_pct - 10.0).abs() < 1e-9);
        assert!(t.is_win);
    }

    #[test]
    fn zero_pnl_trade_counts_as_loss() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 99_900.0, 100.0);
        a.record_fill(&fill(Side::Sell, 1, 100.0, "t1"), Regime::Sideways, 100_000.0, 0.0);
        let s = a.summary();
        assert_eq!(s.total_trades, 1);
        assert_eq!(s.winning_trades, 0);
        assert_eq!(s.losing_trades, 1);
        assert_eq!(s.winning_trades + s.losing_trades, s.total_trades);
    }

    #[test]
    fn same_side_fill_does_not_repair() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 10, 100.0, "t0"), Regime::Sideways, 99_000.0, 1_000.0);
        a.record_fill(&fill(Side::Buy, 10, 105.0, "t1"), Regime::Sideways, 97_950.0, 2_100.0);
        assert_eq!(a.fills().len(), 2);
        assert!(a.trades().is_empty());
        // the first entry still closes against the next sell
        a.record_fill(&fill(Side::Sell, 10, 110.0, "t2"), Regime::Sideways, 99_050.0, 1_100.0);
        assert_eq!(a.trades().len(), 1);
        assert_eq!(a.trades()[0].entry_price, 100.0);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 110_000.0, 0.0);
        a.record_fill(&fill(Side::Sell, 1, 100.0, "t1"), Regime::Sideways, 99_000.0, 0.0);
        // peak 110000, trough 99000: dd = 10%
        assert!((a.summary().max_drawdown_pct - 10.0).abs() < 1e-9);
        assert!(a.summary().max_drawdown_pct >= 0.0);
    }

    #[test]
    fn empty_run_summary_is_all_zeroes() {
        let a = Analytics::default();
        let s = a.summary();
        assert_eq!(s.total_trades, 0);
        assert_eq!(s.total_return_pct, 0.0);
        assert_eq!(s.sharpe_ratio, 0.0);
        assert_eq!(s.max_drawdown_pct, 0.0);
        assert_eq!(s.final_cash, DEFAULT_INITIAL_CASH);
    }

    #[test]
    fn sharpe_zero_on_flat_curve() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 100_000.0, 0.0);
        a.record_fill(&fill(Side::Sell, 1, 100.0, "t1"), Regime::Sideways, 100_000.0, 0.0);
        assert_eq!(a.summary().sharpe_ratio, 0.0);
    }

    #[test]
    fn regime_tallies_key_on_entry_regime() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Trend, 99_900.0, 100.0);
        a.record_fill(&fill(Side::Sell, 1, 110.0, "t1"), Regime::Volatile, 100_010.0, 0.0);
        let s = a.summary();
        assert_eq!(s.trades_by_regime[Regime::Trend.index()], 1);
        assert_eq!(s.trades_by_regime[Regime::Volatile.index()], 0);
        assert!((s.pnl_by_regime[Regime::Trend.index()] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_and_averages() {
        let mut a = Analytics::default();
        // win +20
        a.record_fill(&fill(Side::Buy, 2, 100.0, "t0"), Regime::Sideways, 0.0, 0.0);
        a.record_fill(&fill(Side::Sell, 2, 110.0, "t1"), Regime::Sideways, 0.0, 0.0);
        // loss -10
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t2"), Regime::Sideways, 0.0, 0.0);
        a.record_fill(&fill(Side::Sell, 1, 90.0, "t3"), Regime::Sideways, 0.0, 0.0);
        let s = a.summary();
        assert!((s.avg_win_pct - 20.0).abs() < 1e-9);
        assert!((s.avg_loss_pct - 10.0).abs() < 1e-9);
        assert!((s.profit_factor - 2.0).abs() < 1e-9);
        assert!((s.win_rate_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn annualized_return_uses_one_month_default() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 101_000.0, 0.0);
        let s = a.summary();
        // (1.01)^(12) - 1, up to the float horizon representation
        let expected = (1.01f64.powf(1.0 / (1.0 / 12.0)) - 1.0) * 100.0;
        assert!((s.annualized_return_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn time_span_hook_changes_annualization() {
        let mut a = Analytics::default();
        a.set_time_span_years(1.0);
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 101_000.0, 0.0);
        let s = a.summary();
        assert!((s.annualized_return_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut a = Analytics::default();
        a.record_fill(&fill(Side::Buy, 1, 100.0, "t0"), Regime::Sideways, 99_900.0, 100.0);
        a.reset(DEFAULT_INITIAL_CASH);
        assert!(a.fills().is_empty());
        assert!(a.trades().is_empty());
        assert!(a.equity_curve().is_empty());
        assert_eq!(a.summary().total_trades, 0);
    }
}
