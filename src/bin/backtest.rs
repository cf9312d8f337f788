use std::path::{Path, PathBuf};
use std::process::ExitCode;

use backflux::analytics::DEFAULT_INITIAL_CASH;
use backflux::bars::{analyze_csv, CsvBarSource};
use backflux::config::StrategyConfig;
use backflux::engine::run_backtest;
use backflux::export::{render_summary, trade_log_path, write_summary_json, write_trade_log};
use backflux::logging::{self, v_num, v_str};
use backflux::storage::ResultStore;

fn print_usage() {
    println!("backflux - regime-aware backtesting engine\n");
    println!("Usage:");
    println!("  backtest run --strategy <file> --data <csv> [--out <json>] [--db <sqlite>]");
    println!("  backtest stats --results <json>\n");
    println!("Examples:");
    println!("  backtest run --strategy config/sma_demo.yaml --data demo/bars.csv --out results/sma_demo.json");
    println!("  backtest stats --results results/sma_demo.json");
}

fn take_value(args: &[String], i: &mut usize) -> Option<String> {
    if *i + 1 < args.len() {
        *i += 1;
        Some(args[*i].clone())
    } else {
        None
    }
}

fn run(strategy_path: &Path, data_path: &Path, out: Option<&Path>, db: Option<&str>) -> ExitCode {
    let cfg = match StrategyConfig::load(strategy_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load strategy config: {}", err);
            return ExitCode::from(1);
        }
    };

    if std::env::var("VALIDATE_DATA").as_deref() == Ok("1") {
        let now_ts = chrono::Utc::now().timestamp() as u64;
        match analyze_csv(data_path, now_ts) {
            Ok((manifest, report)) => {
                eprintln!("data_quality rows={} bad_rows={}", report.rows, report.bad_rows);
                if !manifest.warnings.is_empty() {
                    eprintln!("data_warnings: {:?}", manifest.warnings);
                }
            }
            Err(err) => eprintln!("data_quality_check_failed: {}", err),
        }
    }

    let mut source = match CsvBarSource::open(data_path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(1);
        }
    };

    logging::info(
        "run_start",
        &[
            ("strategy", v_str(&cfg.name)),
            ("data", v_str(&data_path.display().to_string())),
        ],
    );

    let result = match run_backtest(&cfg, &mut source, DEFAULT_INITIAL_CASH) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("backtest failed: {}", err);
            return ExitCode::from(1);
        }
    };

    println!("Running backtest: {}", cfg.name);
    println!("Processed {} bars.", result.bars_processed);
    print!("{}", render_summary(&result.summary));

    if let Some(out_path) = out {
        if let Err(err) = write_summary_json(out_path, &result.summary) {
            eprintln!("failed to write summary: {}", err);
            return ExitCode::from(1);
        }
        let trades_path = trade_log_path(out_path);
        if let Err(err) = write_trade_log(&trades_path, &result.trades) {
            eprintln!("failed to write trade log: {}", err);
            return ExitCode::from(1);
        }
        println!("\nResults exported to:");
        println!("  Summary: {}", out_path.display());
        println!("  Trades:  {}", trades_path.display());
    }

    if let Some(db_path) = db {
        let persisted = ResultStore::open(db_path)
            .and_then(|mut store| {
                store.init()?;
                store.persist_run(&cfg.name, &result.summary, &result.trades)
            });
        match persisted {
            Ok(run_id) => {
                logging::info("run_persisted", &[("run_id", v_num(run_id as f64))]);
            }
            Err(err) => {
                eprintln!("failed to persist results: {}", err);
                return ExitCode::from(1);
            }
        }
    }

    ExitCode::SUCCESS
}

fn stats(results_path: &Path) -> ExitCode {
    match std::fs::read_to_string(results_path) {
        Ok(content) => {
            println!("Reading results from: {}", results_path.display());
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("cannot open results file {}: {}", results_path.display(), err);
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "run" => {
            let mut strategy_path: Option<PathBuf> = None;
            let mut data_path: Option<PathBuf> = None;
            let mut out_path: Option<PathBuf> = None;
            let mut db_path: Option<String> = None;
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--strategy" => strategy_path = take_value(&args, &mut i).map(PathBuf::from),
                    "--data" => data_path = take_value(&args, &mut i).map(PathBuf::from),
                    "--out" => out_path = take_value(&args, &mut i).map(PathBuf::from),
                    "--db" => db_path = take_value(&args, &mut i),
                    other => {
                        eprintln!("unknown argument: {}", other);
                        print_usage();
                        return ExitCode::from(1);
                    }
                }
                i += 1;
            }
            let (Some(strategy_path), Some(data_path)) = (strategy_path, data_path) else {
                eprintln!("--strategy and --data are required");
                print_usage();
                return ExitCode::from(1);
            };
            run(&strategy_path, &data_path, out_path.as_deref(), db_path.as_deref())
        }
        "stats" => {
            let mut results_path: Option<PathBuf> = None;
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--results" => results_path = take_value(&args, &mut i).map(PathBuf::from),
                    other => {
                        eprintln!("unknown argument: {}", other);
                        print_usage();
                        return ExitCode::from(1);
                    }
                }
                i += 1;
            }
            let Some(results_path) = results_path else {
                eprintln!("--results is required");
                print_usage();
                return ExitCode::from(1);
            };
            stats(&results_path)
        }
        other => {
            eprintln!("unknown command: {}\n", other);
            print_usage();
            ExitCode::from(1)
        }
    }
}
