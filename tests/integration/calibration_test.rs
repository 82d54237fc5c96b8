//! Calibration replay through to a live fair-value lookup

use poly_sniper::calibration::{CalibrationEngine, FairValueLookup, FairValueTable, MoveBucket};
use poly_sniper::candles::Candle;
use poly_sniper::config::CalibrationConfig;
use poly_sniper::trend::TrendConfig;
use rust_decimal_macros::dec;

const T0: i64 = 1_704_067_200;

/// `intervals` back-to-back 15-minute windows compounding 0.015% per minute
fn rising_intervals(intervals: i64) -> Vec<Candle> {
    let mut prev = dec!(50000);
    (0..intervals * 15)
        .map(|m| {
            let close = (prev * dec!(1.00015)).round_dp(8);
            let candle = Candle {
                start_ts: T0 + m * 60,
                open: prev,
                high: close,
                low: prev,
                close,
            };
            prev = close;
            candle
        })
        .collect()
}

fn engine() -> CalibrationEngine {
    CalibrationEngine::new(CalibrationConfig {
        tema: TrendConfig {
            candle_secs: 300,
            fast_period: 2,
            slow_period: 4,
        },
        min_samples: 30,
        ..CalibrationConfig::default()
    })
}

#[test]
fn test_calibrated_table_feeds_live_lookup() {
    let candles = rising_intervals(30);
    let report = engine().calibrate(&candles, "synthetic").unwrap();

    assert_eq!(report.intervals.total, 30);
    assert_eq!(report.intervals.complete, 30);
    assert_eq!(report.intervals.skipped, 0);
    assert_eq!(report.persistence.baseline, Some(1.0));
    assert_eq!(report.persistence.aligned, Some(1.0));
    assert_eq!(report.persistence.opposed, None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("calibration.json");
    report.save(&path).unwrap();

    let table = FairValueTable::load(&path, 30).unwrap();
    assert!(table.trusted_cells() > 0);

    // 0.075% at 300 s falls in the 0.05-0.10 x 180-420 cell
    let hit = table.lookup(dec!(0.075), 300).expect("trusted cell");
    assert_eq!(hit.move_bucket, MoveBucket::Moderate);
    assert_eq!(hit.probability, 1.0);
    assert!(hit.count >= 30);

    // Outside every elapsed bucket
    assert!(table.lookup(dec!(0.075), 30).is_none());
}

#[test]
fn test_gap_skips_only_its_interval() {
    let mut candles = rising_intervals(12);
    // Minute 7 of interval 5
    let missing = T0 + 5 * 900 + 7 * 60;
    candles.retain(|c| c.start_ts != missing);

    let full = engine().calibrate(&rising_intervals(12), "synthetic").unwrap();
    let gapped = engine().calibrate(&candles, "synthetic").unwrap();

    assert_eq!(gapped.intervals.total, 12);
    assert_eq!(gapped.intervals.complete, 11);
    assert_eq!(gapped.intervals.skipped, 1);
    assert!(gapped.observation_count < full.observation_count);
}

#[test]
fn test_bare_table_file_is_accepted() {
    let report = engine().calibrate(&rising_intervals(30), "synthetic").unwrap();
    let json = serde_json::to_string(&report.bot_table).unwrap();

    let table = FairValueTable::from_json(&json, 30).unwrap();
    assert_eq!(table.trusted_cells(), FairValueTable::new(report.bot_table, 30).trusted_cells());
}
