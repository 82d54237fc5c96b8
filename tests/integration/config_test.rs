//! Configuration file loading

use poly_sniper::config::{CandleSourceKind, Config, ExecutionMode, FeedSource, LogFormat};
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.feed.source, FeedSource::Chainlink);
    assert_eq!(config.market.slug_prefix, "btc-updown-15m");
    assert_eq!(config.signal.min_edge, dec!(0.02));
    assert_eq!(config.position.take_profit_pct, dec!(0.50));
    assert_eq!(config.risk.max_session_loss, dec!(15));
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.trend.slow_period, 80);
    assert_eq!(config.exit_trend.tema.candle_secs, 60);
    assert_eq!(config.calibration.source, CandleSourceKind::Coinbase);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [feed]
        source = "binance"

        [execution]
        bet_size = 10.0
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.feed.source, FeedSource::Binance);
    assert_eq!(config.execution.bet_size, dec!(10));
    assert_eq!(config.execution.max_sell_attempts, 3);
    assert_eq!(config.signal.entry_end_secs, 840);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(dir.path().join("nope.toml")).is_err());
}

#[test]
fn test_unknown_mode_is_rejected() {
    let err = toml::from_str::<Config>("[execution]\nmode = \"yolo\"\n");
    assert!(err.is_err());
}
