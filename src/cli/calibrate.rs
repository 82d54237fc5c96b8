//! Calibrate command implementation

use super::candle_source;
use crate::calibration::{CalibrationEngine, CalibrationReport, ElapsedBucket, MoveBucket};
use crate::candles::{normalize, Candle};
use crate::config::Config;
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Days of 1-minute history to replay
    #[arg(long)]
    pub days: Option<u32>,

    /// Output path for the calibration table
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Candle cache file (JSON); read if present, written after a fetch
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Refetch even if the cache exists
    #[arg(long)]
    pub refresh: bool,
}

impl CalibrateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut cal = config.calibration.clone();
        if let Some(days) = self.days {
            cal.lookback_days = days;
        }
        let output = self.output.clone().unwrap_or_else(|| cal.output_path.clone());
        let cache = self.cache.clone().or_else(|| cal.cache_path.clone());

        let (candles, source) = match cache.as_deref().filter(|p| p.exists() && !self.refresh) {
            Some(path) => (read_cache(path)?, "cache"),
            None => {
                let (source, name) = candle_source(&cal)?;
                let end = Utc::now();
                let start = end - Duration::days(i64::from(cal.lookback_days));
                tracing::info!(source = name, days = cal.lookback_days, "Fetching 1-minute candles");

                let candles = normalize(source.fetch(60, start, end).await?);
                if let Some(path) = cache.as_deref() {
                    write_cache(path, &candles)?;
                }
                (candles, name)
            }
        };

        let report = CalibrationEngine::new(cal).calibrate(&candles, source)?;
        report
            .save(&output)
            .with_context(|| format!("failed to write {}", output.display()))?;

        print_summary(&report);
        println!("\nWrote {}", output.display());
        Ok(())
    }
}

fn read_cache(path: &Path) -> anyhow::Result<Vec<Candle>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&content).context("invalid candle cache")?;
    tracing::info!(path = %path.display(), candles = candles.len(), "Loaded candle cache");
    Ok(normalize(candles))
}

fn write_cache(path: &Path, candles: &[Candle]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(candles)?)?;
    tracing::info!(path = %path.display(), candles = candles.len(), "Wrote candle cache");
    Ok(())
}

fn print_summary(report: &CalibrationReport) {
    let pct = |r: Option<f64>| r.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0));

    println!("Candles:      {} ({})", report.candle_count, report.data_source);
    println!(
        "Intervals:    {} total, {} complete, {} skipped",
        report.intervals.total, report.intervals.complete, report.intervals.skipped
    );
    println!("Observations: {}", report.observation_count);
    println!(
        "Persistence:  baseline {} | aligned {} | opposed {}",
        pct(report.persistence.baseline),
        pct(report.persistence.aligned),
        pct(report.persistence.opposed)
    );

    println!("\nTrend-aligned table (min {} samples):", report.min_samples);
    print!("{:>10}", "move\\sec");
    for e in ElapsedBucket::ALL {
        print!("{:>16}", e.label());
    }
    println!();

    for m in MoveBucket::ALL {
        print!("{:>10}", m.label());
        for e in ElapsedBucket::ALL {
            let cell = report.tema_aligned.get(m, e).copied().unwrap_or_default();
            let trusted = cell.is_trusted(report.min_samples);
            let text = format!(
                "{} n={}{}",
                pct(cell.win_rate),
                cell.count,
                if trusted { "" } else { "*" }
            );
            print!("{:>16}", text);
        }
        println!();
    }
    println!("(* below sample threshold, not used live)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cache_round_trip_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("candles.json");

        let c = |ts| Candle {
            start_ts: ts,
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
        };
        write_cache(&path, &[c(120), c(60), c(120)]).unwrap();

        let loaded = read_cache(&path).unwrap();
        assert_eq!(loaded.iter().map(|c| c.start_ts).collect::<Vec<_>>(), vec![60, 120]);
    }
}
