//! backflux - event-driven backtesting engine for intraday strategies.
//!
//! A single-threaded simulation pipeline: each OHLCV bar advances the online
//! indicators, the regime classifier, the strategy state machine, the
//! execution simulator, and the analytics ledger, in that order. The same
//! inputs always produce byte-identical outputs.

pub mod analytics;
pub mod bars;
pub mod config;
pub mod engine;
pub mod execution;
pub mod export;
pub mod indicators;
pub mod logging;
pub mod regime;
pub mod storage;
pub mod strategy;
