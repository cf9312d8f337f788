//! Structured logging for backtest runs.
//!
//! One JSON object per line on stderr, level-gated via the `LOG_LEVEL`
//! environment variable. Exported artifacts never read these events, so the
//! wall-clock timestamps here cannot leak into deterministic output.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// Emit a structured event if `level` clears the env threshold.
pub fn json_log(level: Level, event: &str, fields: &[(&str, Value)]) {
    if level < Level::from_env() {
        return;
    }
    let mut map = Map::new();
    map.insert("ts".into(), Value::from(Utc::now().timestamp_millis()));
    map.insert("seq".into(), Value::from(next_seq()));
    map.insert("level".into(), Value::from(level.as_str()));
    map.insert("event".into(), Value::from(event));
    for (k, v) in fields {
        map.insert((*k).to_string(), v.clone());
    }
    eprintln!("{}", Value::Object(map));
}

pub fn debug(event: &str, fields: &[(&str, Value)]) {
    json_log(Level::Debug, event, fields);
}

pub fn info(event: &str, fields: &[(&str, Value)]) {
    json_log(Level::Info, event, fields);
}

pub fn warn(event: &str, fields: &[(&str, Value)]) {
    json_log(Level::Warn, event, fields);
}

pub fn v_str(s: &str) -> Value {
    Value::from(s)
}

pub fn v_num(n: f64) -> Value {
    Value::from(n)
}
