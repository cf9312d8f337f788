//! Seeded synthetic OHLCV generator for demos and soak runs.
//!
//! A volatility-switching random walk: the same seed always produces the
//! same CSV, so generated datasets are safe inputs for determinism checks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;

use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};

struct GenConfig {
    bars: usize,
    seed: u64,
    start_price: f64,
    out: String,
}

impl GenConfig {
    fn from_args(args: &[String]) -> Option<Self> {
        let mut cfg = GenConfig {
            bars: 2000,
            seed: 42,
            start_price: 100.0,
            out: "demo_bars.csv".to_string(),
        };
        let mut i = 1;
        while i < args.len() {
            let key = args[i].clone();
            i += 1;
            let value = args.get(i)?;
            match key.as_str() {
                "--bars" => cfg.bars = value.parse().ok()?,
                "--seed" => cfg.seed = value.parse().ok()?,
                "--start-price" => cfg.start_price = value.parse().ok()?,
                "--out" => cfg.out = value.clone(),
                _ => return None,
            }
            i += 1;
        }
        Some(cfg)
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let Some(cfg) = GenConfig::from_args(&args) else {
        eprintln!(
            "usage: gen_data [--bars N] [--seed N] [--start-price P] [--out FILE]"
        );
        return ExitCode::from(1);
    };

    let file = match File::create(&cfg.out) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("cannot create {}: {}", cfg.out, err);
            return ExitCode::from(1);
        }
    };
    let mut w = BufWriter::new(file);

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut price = cfg.start_price;
    let mut vol: f64 = 0.002;
    let session_open = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(9, 15, 0))
        .expect("valid session open");

    if writeln!(w, "timestamp,open,high,low,close,volume").is_err() {
        eprintln!("write failed: {}", cfg.out);
        return ExitCode::from(1);
    }

    for i in 0..cfg.bars {
        // occasional volatility regime flips
        let flip: f64 = rng.gen();
        if flip < 0.02 {
            vol = (vol * 1.4).min(0.02);
        } else if flip > 0.98 {
            vol = (vol * 0.7).max(0.0008);
        }
        let drift = if i % 240 < 120 { 0.0002 } else { -0.0001 };
        let noise: f64 = rng.gen_range(-1.0..1.0) * vol;
        let r4 = |x: f64| (x * 10_000.0).round() / 10_000.0;
        let open = r4(price);
        price = (price * (1.0 + drift + noise)).max(1.0);
        let close = r4(price);
        let high = r4(open.max(close) * (1.0 + vol * rng.gen_range(0.0..0.5)))
            .max(open)
            .max(close);
        let low = r4(open.min(close) * (1.0 - vol * rng.gen_range(0.0..0.5)))
            .min(open)
            .min(close);
        let volume = rng.gen_range(500..5000) as f64 * (1.0 + vol * 100.0);

        let ts = session_open + Duration::minutes(i as i64);
        if writeln!(
            w,
            "{},{:.4},{:.4},{:.4},{:.4},{}",
            ts.format("%Y-%m-%d %H:%M"),
            open,
            high,
            low,
            close,
            volume as u64
        )
        .is_err()
        {
            eprintln!("write failed: {}", cfg.out);
            return ExitCode::from(1);
        }
    }

    if w.flush().is_err() {
        eprintln!("write failed: {}", cfg.out);
        return ExitCode::from(1);
    }
    println!("wrote {} bars to {}", cfg.bars, cfg.out);
    ExitCode::SUCCESS
}
