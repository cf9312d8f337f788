//! Sqlite persistence for backtest results.
//!
//! One `runs` row per backtest plus its `trades` rows, written in a single
//! transaction so a run is either fully recorded or absent.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::analytics::{BacktestSummary, Trade};

pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                created_ts INTEGER NOT NULL,
                strategy_name TEXT NOT NULL,
                total_return_pct REAL NOT NULL,
                annualized_return_pct REAL NOT NULL,
                sharpe_ratio REAL NOT NULL,
                max_drawdown_pct REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                winning_trades INTEGER NOT NULL,
                losing_trades INTEGER NOT NULL,
                win_rate_pct REAL NOT NULL,
                profit_factor REAL NOT NULL,
                initial_cash REAL NOT NULL,
                final_cash REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                run_id INTEGER NOT NULL,
                entry_timestamp TEXT NOT NULL,
                exit_timestamp TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                size INTEGER NOT NULL,
                pnl REAL NOT NULL,
                pnl_pct REAL NOT NULL,
                entry_regime TEXT NOT NULL,
                exit_regime TEXT NOT NULL,
                is_win INTEGER NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    /// Persist one run and its trades; returns the run id.
    pub fn persist_run(
        &mut self,
        strategy_name: &str,
        summary: &BacktestSummary,
        trades: &[Trade],
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO runs (
                created_ts, strategy_name, total_return_pct, annualized_return_pct,
                sharpe_ratio, max_drawdown_pct, total_trades, winning_trades,
                losing_trades, win_rate_pct, profit_factor, initial_cash, final_cash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                Utc::now().timestamp(),
                strategy_name,
                summary.total_return_pct,
                summary.annualized_return_pct,
                summary.sharpe_ratio,
                summary.max_drawdown_pct,
                summary.total_trades as i64,
                summary.winning_trades as i64,
                summary.losing_trades as i64,
                summary.win_rate_pct,
                summary.profit_factor,
                summary.initial_cash,
                summary.final_cash,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        for t in trades {
            tx.execute(
                "INSERT INTO trades (
                    run_id, entry_timestamp, exit_timestamp, entry_price, exit_price,
                    size, pnl, pnl_pct, entry_regime, exit_regime, is_win
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    run_id,
                    t.entry_timestamp,
                    t.exit_timestamp,
                    t.entry_price,
                    t.exit_price,
                    t.size as i64,
                    t.pnl,
                    t.pnl_pct,
                    t.entry_regime.as_str(),
                    t.exit_regime.as_str(),
                    t.is_win as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(run_id)
    }

    pub fn trade_count(&self, run_id: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM trades WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn run_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
