//! Strategy configuration: typed defaults, file loading, validation.
//!
//! Two formats are accepted: JSON (serde) and the flat sectioned
//! `key: value` strategy files used in the field. Every field falls back to
//! its default when unspecified; an empty strategy name after parsing is a
//! load failure.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Minimum price increment for the simulated instrument.
pub const TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlippageKind {
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub kind: SlippageKind,
    pub base_ticks: u32,
    pub vol_multiplier: f64,
    pub vol_low: f64,
    pub vol_high: f64,
    pub low_factor: f64,
    pub high_factor: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            kind: SlippageKind::Fixed,
            base_ticks: 1,
            vol_multiplier: 0.001,
            vol_low: 0.01,
            vol_high: 0.05,
            low_factor: 0.5,
            high_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub name: String,
    pub kind: String,
    pub symbol: String,
    pub timeframe: String,

    pub fast_sma: usize,
    pub slow_sma: usize,
    pub use_rsi_filter: bool,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub use_vol_filter: bool,
    /// Annualized realized-vol gate; trading pauses above it.
    pub vol_threshold: f64,

    /// Percent of entry price, not a fraction.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,

    pub position_size: u32,
    pub slippage: SlippageConfig,
    pub exclude_volatile_regime: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            symbol: String::new(),
            timeframe: String::new(),
            fast_sma: 10,
            slow_sma: 20,
            use_rsi_filter: false,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            use_vol_filter: false,
            vol_threshold: 0.05,
            stop_loss_pct: 0.5,
            take_profit_pct: 1.0,
            position_size: 100,
            slippage: SlippageConfig::default(),
            exclude_volatile_regime: false,
        }
    }
}

impl StrategyConfig {
    /// Load a strategy file, dispatching on extension.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let file = File::open(path)
                    .map_err(|e| anyhow!("cannot open config {}: {}", path.display(), e))?;
                serde_json::from_reader(BufReader::new(file))
                    .map_err(|e| anyhow!("bad config {}: {}", path.display(), e))?
            }
            _ => parse_sectioned(path)?,
        };
        if cfg.name.is_empty() {
            bail!("config {} has no strategy name", path.display());
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fast_sma == 0 || self.slow_sma == 0 {
            bail!("sma windows must be positive");
        }
        if self.fast_sma >= self.slow_sma {
            bail!(
                "fast_sma ({}) must be smaller than slow_sma ({})",
                self.fast_sma,
                self.slow_sma
            );
        }
        if self.position_size == 0 {
            bail!("position_size must be positive");
        }
        Ok(())
    }
}

fn strip_quotes(v: &str) -> &str {
    let v = v.trim();
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Parser for the sectioned `key: value` strategy format.
///
/// Sections are `strategy:`, `entry:`, `exit:`, `risk:`, `execution:`.
/// Specifying `rsi_overbought`/`rsi_oversold` enables the RSI filter and
/// `vol_threshold` enables the volatility filter, so a file never needs the
/// boolean knobs spelled out.
fn parse_sectioned(path: &Path) -> Result<StrategyConfig> {
    let file =
        File::open(path).map_err(|e| anyhow!("cannot open config {}: {}", path.display(), e))?;
    let mut cfg = StrategyConfig::default();
    let mut section = String::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(name) = trimmed.strip_suffix(':') {
            if matches!(name, "strategy" | "entry" | "exit" | "risk" | "execution") {
                section = name.to_string();
                continue;
            }
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = strip_quotes(value);

        match (section.as_str(), key) {
            ("strategy", "name") => cfg.name = value.to_string(),
            ("strategy", "type") => cfg.kind = value.to_string(),
            ("strategy", "symbol") => cfg.symbol = value.to_string(),
            ("strategy", "timeframe") => cfg.timeframe = value.to_string(),
            ("strategy", "exclude_volatile_regime") => {
                cfg.exclude_volatile_regime = matches!(value, "true" | "1");
            }
            ("entry", "fast") => cfg.fast_sma = parse_field(path, key, value)?,
            ("entry", "slow") => cfg.slow_sma = parse_field(path, key, value)?,
            ("entry", "rsi_overbought") => {
                cfg.rsi_overbought = parse_field(path, key, value)?;
                cfg.use_rsi_filter = true;
            }
            ("entry", "rsi_oversold") => {
                cfg.rsi_oversold = parse_field(path, key, value)?;
                cfg.use_rsi_filter = true;
            }
            ("entry", "vol_threshold") => {
                cfg.vol_threshold = parse_field(path, key, value)?;
                cfg.use_vol_filter = true;
            }
            ("exit", "stop_loss_pct") => cfg.stop_loss_pct = parse_field(path, key, value)?,
            ("exit", "take_profit_pct") => cfg.take_profit_pct = parse_field(path, key, value)?,
            ("risk", "position_size") => cfg.position_size = parse_field(path, key, value)?,
            ("execution", "type") => {
                cfg.slippage.kind = match value {
                    "fixed" => SlippageKind::Fixed,
                    "adaptive" => SlippageKind::Adaptive,
                    other => bail!("unknown slippage type {:?} in {}", other, path.display()),
                };
            }
            ("execution", "base_ticks") => cfg.slippage.base_ticks = parse_field(path, key, value)?,
            ("execution", "vol_multiplier") => {
                cfg.slippage.vol_multiplier = parse_field(path, key, value)?;
            }
            ("execution", "vol_low") => cfg.slippage.vol_low = parse_field(path, key, value)?,
            ("execution", "vol_high") => cfg.slippage.vol_high = parse_field(path, key, value)?,
            ("execution", "low_factor") => cfg.slippage.low_factor = parse_field(path, key, value)?,
            ("execution", "high_factor") => {
                cfg.slippage.high_factor = parse_field(path, key, value)?;
            }
            _ => {}
        }
    }
    Ok(cfg)
}

fn parse_field<T>(path: &Path, key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow!("config {} key {}: {}", path.display(), key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cfg(ext: &str, content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = StrategyConfig::default();
        assert_eq!(cfg.fast_sma, 10);
        assert_eq!(cfg.slow_sma, 20);
        assert!(!cfg.use_rsi_filter);
        assert_eq!(cfg.stop_loss_pct, 0.5);
        assert_eq!(cfg.take_profit_pct, 1.0);
        assert_eq!(cfg.position_size, 100);
        assert_eq!(cfg.slippage.base_ticks, 1);
        assert_eq!(cfg.slippage.kind, SlippageKind::Fixed);
    }

    #[test]
    fn sectioned_file_round_trip() {
        let f = write_cfg(
            ".yaml",
            "strategy:\n\
             name: sma_demo\n\
             type: sma_crossover\n\
             symbol: RELIANCE\n\
             entry:\n\
             fast: 5\n\
             slow: 15\n\
             rsi_overbought: 65\n\
             exit:\n\
             stop_loss_pct: 0.75\n\
             take_profit_pct: 2.0\n\
             risk:\n\
             position_size: 50\n\
             execution:\n\
             type: adaptive\n\
             base_ticks: 2\n",
        );
        let cfg = StrategyConfig::load(f.path()).unwrap();
        assert_eq!(cfg.name, "sma_demo");
        assert_eq!(cfg.fast_sma, 5);
        assert_eq!(cfg.slow_sma, 15);
        assert!(cfg.use_rsi_filter);
        assert_eq!(cfg.rsi_overbought, 65.0);
        assert!(!cfg.use_vol_filter);
        assert_eq!(cfg.stop_loss_pct, 0.75);
        assert_eq!(cfg.position_size, 50);
        assert_eq!(cfg.slippage.kind, SlippageKind::Adaptive);
        assert_eq!(cfg.slippage.base_ticks, 2);
    }

    #[test]
    fn vol_threshold_enables_filter() {
        let f = write_cfg(".yaml", "strategy:\nname: v\nentry:\nvol_threshold: 0.02\n");
        let cfg = StrategyConfig::load(f.path()).unwrap();
        assert!(cfg.use_vol_filter);
        assert_eq!(cfg.vol_threshold, 0.02);
    }

    #[test]
    fn json_config_loads() {
        let f = write_cfg(
            ".json",
            r#"{
                "name": "json_demo",
                "fast_sma": 3,
                "slow_sma": 9,
                "use_vol_filter": true,
                "vol_threshold": 0.1,
                "slippage": { "kind": "adaptive", "base_ticks": 3 }
            }"#,
        );
        let cfg = StrategyConfig::load(f.path()).unwrap();
        assert_eq!(cfg.name, "json_demo");
        assert_eq!(cfg.fast_sma, 3);
        assert!(cfg.use_vol_filter);
        assert_eq!(cfg.slippage.kind, SlippageKind::Adaptive);
        assert_eq!(cfg.slippage.base_ticks, 3);
        // unspecified fields keep defaults
        assert_eq!(cfg.position_size, 100);
        assert_eq!(cfg.slippage.vol_low, 0.01);
    }

    #[test]
    fn missing_name_is_a_load_error() {
        let f = write_cfg(".yaml", "entry:\nfast: 2\nslow: 5\n");
        assert!(StrategyConfig::load(f.path()).is_err());
    }

    #[test]
    fn fast_not_below_slow_is_rejected() {
        let f = write_cfg(".yaml", "strategy:\nname: bad\nentry:\nfast: 20\nslow: 10\n");
        assert!(StrategyConfig::load(f.path()).is_err());
    }

    #[test]
    fn unknown_slippage_kind_is_rejected() {
        let f = write_cfg(".yaml", "strategy:\nname: bad\nexecution:\ntype: magic\n");
        assert!(StrategyConfig::load(f.path()).is_err());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        assert!(StrategyConfig::load(Path::new("/nonexistent/cfg.yaml")).is_err());
    }
}
