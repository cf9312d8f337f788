//! Result writers: trade log CSV, summary JSON, console rendering.
//!
//! Formatting is fixed-precision with a fixed field order, so identical
//! runs produce byte-identical artifacts.

use anyhow::Result;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analytics::{BacktestSummary, Trade};
use crate::regime::Regime;

pub fn write_trade_log(path: &Path, trades: &[Trade]) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(
        w,
        "entry_timestamp,exit_timestamp,entry_price,exit_price,size,pnl,pnl_pct,entry_regime,exit_regime,is_win"
    )?;
    for t in trades {
        writeln!(
            w,
            "{},{},{:.2},{:.2},{},{:.2},{:.4},{},{},{}",
            t.entry_timestamp,
            t.exit_timestamp,
            t.entry_price,
            t.exit_price,
            t.size,
            t.pnl,
            t.pnl_pct,
            t.entry_regime,
            t.exit_regime,
            if t.is_win { 1 } else { 0 },
        )?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &BacktestSummary) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    w.write_all(summary_json(summary).as_bytes())?;
    w.flush()?;
    Ok(())
}

/// Render the summary as a JSON object with 4-decimal floats.
pub fn summary_json(s: &BacktestSummary) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    let _ = writeln!(out, "  \"total_return_pct\": {:.4},", s.total_return_pct);
    let _ = writeln!(out, "  \"annualized_return_pct\": {:.4},", s.annualized_return_pct);
    let _ = writeln!(out, "  \"sharpe_ratio\": {:.4},", s.sharpe_ratio);
    let _ = writeln!(out, "  \"max_drawdown_pct\": {:.4},", s.max_drawdown_pct);
    let _ = writeln!(out, "  \"total_trades\": {},", s.total_trades);
    let _ = writeln!(out, "  \"winning_trades\": {},", s.winning_trades);
    let _ = writeln!(out, "  \"losing_trades\": {},", s.losing_trades);
    let _ = writeln!(out, "  \"win_rate_pct\": {:.4},", s.win_rate_pct);
    let _ = writeln!(out, "  \"avg_win_pct\": {:.4},", s.avg_win_pct);
    let _ = writeln!(out, "  \"avg_loss_pct\": {:.4},", s.avg_loss_pct);
    let _ = writeln!(out, "  \"profit_factor\": {:.4},", s.profit_factor);
    let _ = writeln!(out, "  \"initial_cash\": {:.4},", s.initial_cash);
    let _ = writeln!(out, "  \"final_cash\": {:.4},", s.final_cash);
    out.push_str("  \"trades_by_regime\": {");
    for (i, regime) in Regime::ALL.iter().enumerate() {
        let sep = if i == 0 { " " } else { ", " };
        let _ = write!(out, "{}\"{}\": {}", sep, regime, s.trades_by_regime[regime.index()]);
    }
    out.push_str(" },\n");
    out.push_str("  \"pnl_by_regime\": {");
    for (i, regime) in Regime::ALL.iter().enumerate() {
        let sep = if i == 0 { " " } else { ", " };
        let _ = write!(out, "{}\"{}\": {:.4}", sep, regime, s.pnl_by_regime[regime.index()]);
    }
    out.push_str(" }\n");
    out.push_str("}\n");
    out
}

/// Human-readable report for the console.
pub fn render_summary(s: &BacktestSummary) -> String {
    let mut out = String::new();
    out.push_str("\n=== Backtest Summary ===\n");
    let _ = writeln!(out, "Initial Cash:      ${:.2}", s.initial_cash);
    let _ = writeln!(out, "Final Cash:        ${:.2}", s.final_cash);
    let _ = writeln!(out, "Total Return:      {:.2}%", s.total_return_pct);
    let _ = writeln!(out, "Annualized Return: {:.2}%", s.annualized_return_pct);
    let _ = writeln!(out, "Sharpe Ratio:      {:.4}", s.sharpe_ratio);
    let _ = writeln!(out, "Max Drawdown:      {:.2}%", s.max_drawdown_pct);
    out.push_str("\n=== Trade Statistics ===\n");
    let _ = writeln!(out, "Total Trades:      {}", s.total_trades);
    let _ = writeln!(out, "Winning Trades:    {}", s.winning_trades);
    let _ = writeln!(out, "Losing Trades:     {}", s.losing_trades);
    let _ = writeln!(out, "Win Rate:          {:.2}%", s.win_rate_pct);
    let _ = writeln!(out, "Avg Win:           ${:.2}", s.avg_win_pct);
    let _ = writeln!(out, "Avg Loss:          ${:.2}", s.avg_loss_pct);
    let _ = writeln!(out, "Profit Factor:     {:.4}", s.profit_factor);
    if s.total_trades > 0 {
        out.push_str("\n=== Per-Regime Statistics ===\n");
        for regime in Regime::ALL.iter() {
            let count = s.trades_by_regime[regime.index()];
            if count > 0 {
                let _ = writeln!(
                    out,
                    "{}: {} trades, PnL: ${:.2}",
                    regime,
                    count,
                    s.pnl_by_regime[regime.index()]
                );
            }
        }
    }
    out
}

/// Trade-log path derived from the summary path: `<stem>_trades.csv`.
pub fn trade_log_path(summary_path: &Path) -> std::path::PathBuf {
    let stem = summary_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    summary_path.with_file_name(format!("{}_trades.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> BacktestSummary {
        BacktestSummary {
            total_return_pct: 1.25,
            annualized_return_pct: 15.8,
            sharpe_ratio: 0.5,
            max_drawdown_pct: 2.0,
            total_trades: 3,
            winning_trades: 2,
            losing_trades: 1,
            win_rate_pct: 66.6667,
            avg_win_pct: 50.0,
            avg_loss_pct: 25.0,
            profit_factor: 4.0,
            initial_cash: 100_000.0,
            final_cash: 101_234.56,
            trades_by_regime: [2, 0, 1],
            pnl_by_regime: [80.0, 0.0, -5.0],
        }
    }

    fn trade() -> Trade {
        Trade {
            entry_timestamp: "t0".into(),
            exit_timestamp: "t1".into(),
            entry_price: 100.1,
            exit_price: 101.5,
            size: 10,
            pnl: 14.0,
            pnl_pct: 1.3986,
            entry_regime: Regime::Trend,
            exit_regime: Regime::Sideways,
            is_win: true,
        }
    }

    #[test]
    fn trade_log_columns_and_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        write_trade_log(&path, &[trade()]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "entry_timestamp,exit_timestamp,entry_price,exit_price,size,pnl,pnl_pct,entry_regime,exit_regime,is_win"
        );
        assert_eq!(lines.next().unwrap(), "t0,t1,100.10,101.50,10,14.00,1.3986,TREND,SIDEWAYS,1");
    }

    #[test]
    fn summary_json_has_fixed_precision_and_order() {
        let json = summary_json(&summary());
        assert!(json.contains("\"total_return_pct\": 1.2500"));
        assert!(json.contains("\"trades_by_regime\": { \"TREND\": 2, \"VOLATILE\": 0, \"SIDEWAYS\": 1 }"));
        assert!(json.contains("\"pnl_by_regime\": { \"TREND\": 80.0000, \"VOLATILE\": 0.0000, \"SIDEWAYS\": -5.0000 }"));
        // valid JSON
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["total_trades"], 3);
        // key order is stable
        let tr = json.find("total_return_pct").unwrap();
        let fc = json.find("final_cash").unwrap();
        assert!(tr < fc);
    }

    #[test]
    fn summary_json_is_deterministic() {
        assert_eq!(summary_json(&summary()), summary_json(&summary()));
    }

    #[test]
    fn derived_trade_log_path() {
        assert_eq!(
            trade_log_path(Path::new("results/run1.json")),
            Path::new("results/run1_trades.csv")
        );
        assert_eq!(trade_log_path(Path::new("out")), Path::new("out_trades.csv"));
    }

    #[test]
    fn render_summary_mentions_regimes_with_trades() {
        let text = render_summary(&summary());
        assert!(text.contains("TREND: 2 trades"));
        assert!(!text.contains("VOLATILE:"));
    }
}
