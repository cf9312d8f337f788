//! Per-bar orchestration: indicators, regime, strategy, execution,
//! analytics, wired in a fixed order and driven to source exhaustion.

use anyhow::Result;

use crate::analytics::{Analytics, BacktestSummary, EquityPoint, Trade};
use crate::bars::BarSource;
use crate::config::StrategyConfig;
use crate::execution::ExecutionSimulator;
use crate::indicators::IndicatorEngine;
use crate::logging::{self, v_num, v_str};
use crate::regime::{Regime, RegimeClassifier};
use crate::strategy::{StrategyEngine, VOL_WINDOW};

const PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: BacktestSummary,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Signed open position left when the stream ended.
    pub final_position: i64,
    /// Cash plus mark-to-market of the open position at the last close.
    pub final_equity: f64,
    pub bars_processed: u64,
}

pub fn run_backtest(
    cfg: &StrategyConfig,
    source: &mut dyn BarSource,
    initial_cash: f64,
) -> Result<BacktestResult> {
    let mut indicators = IndicatorEngine::new();
    indicators.track_sma(cfg.fast_sma);
    indicators.track_sma(cfg.slow_sma);
    indicators.track_vwap(VOL_WINDOW);
    indicators.set_rsi_window(14);

    let mut classifier = RegimeClassifier::default();
    let mut strategy = StrategyEngine::new(cfg.clone());
    let mut executor = ExecutionSimulator::new(cfg.slippage.clone(), initial_cash);
    let mut analytics = Analytics::new(initial_cash);

    logging::info(
        "backtest_start",
        &[("strategy", v_str(&cfg.name)), ("initial_cash", v_num(initial_cash))],
    );

    let mut bars_processed = 0u64;
    let mut last_close = 0.0;

    while let Some(bar) = source.next() {
        // Invalid ticks are dropped without comment.
        if bar.close <= 0.0 {
            continue;
        }
        bars_processed += 1;
        last_close = bar.close;

        indicators.add_price(bar.close, bar.volume);
        let regime = classifier.update(&bar);

        if cfg.exclude_volatile_regime && regime == Regime::Volatile {
            continue;
        }

        if let Some(order) = strategy.on_bar(&bar, &indicators) {
            let realized_vol = indicators.realized_vol(VOL_WINDOW);
            let fill = executor.execute(&order, &bar, realized_vol);
            analytics.record_fill(
                &fill,
                regime,
                executor.cash(),
                executor.position_value(bar.close),
            );
        }

        if bars_processed % PROGRESS_EVERY == 0 {
            logging::debug(
                "backtest_progress",
                &[
                    ("bars", v_num(bars_processed as f64)),
                    ("fills", v_num(analytics.fills().len() as f64)),
                ],
            );
        }
    }

    let final_position = executor.position().size;
    let final_equity = executor.cash() + executor.position_value(last_close);
    let summary = analytics.summary();

    logging::info(
        "backtest_done",
        &[
            ("bars", v_num(bars_processed as f64)),
            ("trades", v_num(summary.total_trades as f64)),
            ("final_equity", v_num(final_equity)),
        ],
    );

    Ok(BacktestResult {
        trades: analytics.trades().to_vec(),
        equity_curve: analytics.equity_curve().to_vec(),
        final_position,
        final_equity,
        bars_processed,
        summary,
    })
}
