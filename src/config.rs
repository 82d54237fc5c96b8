//! Configuration types for poly-sniper

use crate::trend::TrendConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Entry trend: TEMA crossover on 5-minute candles
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub htf: HtfConfig,
    #[serde(default)]
    pub exit_trend: ExitTrendConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Price feed selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// Chainlink BTC/USD via Polymarket's real-time data stream
    #[default]
    Chainlink,
    /// Binance spot trades
    Binance,
}

/// Price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub source: FeedSource,

    /// Binance stream symbol
    #[serde(default = "default_binance_symbol")]
    pub symbol: String,

    /// Chainlink feed symbol
    #[serde(default = "default_chainlink_symbol")]
    pub chainlink_symbol: String,

    /// Bounded tick channel between transport and engine
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_binance_symbol() -> String {
    "btcusdt".to_string()
}
fn default_chainlink_symbol() -> String {
    "btc/usd".to_string()
}
fn default_channel_capacity() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::default(),
            symbol: default_binance_symbol(),
            chainlink_symbol: default_chainlink_symbol(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Market discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,

    #[serde(default = "default_clob_url")]
    pub clob_url: String,

    /// Slug prefix; the interval start is appended
    #[serde(default = "default_slug_prefix")]
    pub slug_prefix: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long resolved market metadata is reused
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_gamma_url() -> String {
    crate::market::GAMMA_API_URL.to_string()
}
fn default_clob_url() -> String {
    crate::market::CLOB_API_URL.to_string()
}
fn default_slug_prefix() -> String {
    "btc-updown-15m".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_cache_ttl_secs() -> u64 {
    60
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: default_gamma_url(),
            clob_url: default_clob_url(),
            slug_prefix: default_slug_prefix(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Entry gating configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Minimum |move| in percent
    #[serde(default = "default_min_move_pct")]
    pub min_move_pct: Decimal,

    /// Earliest elapsed second an entry is considered
    #[serde(default = "default_entry_start_secs")]
    pub entry_start_secs: i64,

    /// Latest elapsed second an entry is considered (inclusive)
    #[serde(default = "default_entry_end_secs")]
    pub entry_end_secs: i64,

    /// Minimum `fair_value - buy_price`
    #[serde(default = "default_min_edge")]
    pub min_edge: Decimal,

    #[serde(default = "default_max_entry_price")]
    pub max_entry_price: Decimal,

    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,

    /// At most one full evaluation per slot of this many seconds
    #[serde(default = "default_eval_throttle_secs")]
    pub eval_throttle_secs: i64,

    /// Require the 15-minute EMA to agree with the move direction
    #[serde(default = "default_true")]
    pub htf_filter: bool,

    /// Calibration output consumed at startup
    #[serde(default = "default_fair_value_path")]
    pub fair_value_path: PathBuf,

    /// Cells with fewer samples are not trusted
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

fn default_true() -> bool {
    true
}
fn default_min_move_pct() -> Decimal {
    Decimal::new(3, 2) // 0.03%
}
fn default_entry_start_secs() -> i64 {
    60
}
fn default_entry_end_secs() -> i64 {
    840
}
fn default_min_edge() -> Decimal {
    Decimal::new(2, 2)
}
fn default_max_entry_price() -> Decimal {
    Decimal::new(75, 2)
}
fn default_max_spread() -> Decimal {
    Decimal::new(6, 2)
}
fn default_eval_throttle_secs() -> i64 {
    30
}
fn default_fair_value_path() -> PathBuf {
    PathBuf::from("data/calibration.json")
}
fn default_min_samples() -> u64 {
    30
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_move_pct: default_min_move_pct(),
            entry_start_secs: default_entry_start_secs(),
            entry_end_secs: default_entry_end_secs(),
            min_edge: default_min_edge(),
            max_entry_price: default_max_entry_price(),
            max_spread: default_max_spread(),
            eval_throttle_secs: default_eval_throttle_secs(),
            htf_filter: true,
            fair_value_path: default_fair_value_path(),
            min_samples: default_min_samples(),
        }
    }
}

/// Exit thresholds for an open position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    /// Relative gain that triggers a take-profit sell
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,

    /// Relative loss that triggers a stop-loss sell
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,

    /// Forced exit at or below this many seconds remaining
    #[serde(default = "default_exit_before_end_secs")]
    pub exit_before_end_secs: i64,

    /// Price checks on an open position are at most this frequent
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

fn default_take_profit_pct() -> Decimal {
    Decimal::new(50, 2)
}
fn default_stop_loss_pct() -> Decimal {
    Decimal::new(25, 2)
}
fn default_exit_before_end_secs() -> i64 {
    60
}
fn default_monitor_interval_secs() -> u64 {
    5
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            exit_before_end_secs: default_exit_before_end_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

/// Session risk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Cumulative session loss that trips the circuit breaker
    #[serde(default = "default_max_session_loss")]
    pub max_session_loss: Decimal,

    /// Bankroll used when no snapshot exists yet
    #[serde(default = "default_initial_bankroll")]
    pub initial_bankroll: Decimal,

    /// Persisted session snapshot
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

fn default_max_session_loss() -> Decimal {
    Decimal::new(15, 0)
}
fn default_initial_bankroll() -> Decimal {
    Decimal::new(100, 0)
}
fn default_state_path() -> PathBuf {
    PathBuf::from("data/session_state.json")
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_session_loss: default_max_session_loss(),
            initial_bankroll: default_initial_bankroll(),
            state_path: default_state_path(),
        }
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Order placement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Dollars committed per entry
    #[serde(default = "default_bet_size")]
    pub bet_size: Decimal,

    #[serde(default = "default_order_timeout_secs")]
    pub entry_timeout_secs: u64,

    #[serde(default = "default_order_timeout_secs")]
    pub exit_timeout_secs: u64,

    /// Delay between order status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Sell attempts before a position is written off
    #[serde(default = "default_max_sell_attempts")]
    pub max_sell_attempts: u32,

    /// Exchange minimum notional per order
    #[serde(default = "default_min_order_value")]
    pub min_order_value: Decimal,

    /// Added to the best ask for the buy limit
    #[serde(default = "default_tick_increment")]
    pub tick_increment: Decimal,

    /// Subtracted from the best bid for the sell limit
    #[serde(default = "default_sell_offset")]
    pub sell_offset: Decimal,

    /// Hard cap on any buy limit
    #[serde(default = "default_max_buy_price")]
    pub max_buy_price: Decimal,
}

fn default_bet_size() -> Decimal {
    Decimal::new(5, 0)
}
fn default_order_timeout_secs() -> u64 {
    20
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_sell_attempts() -> u32 {
    3
}
fn default_min_order_value() -> Decimal {
    Decimal::ONE
}
fn default_tick_increment() -> Decimal {
    Decimal::new(1, 2)
}
fn default_sell_offset() -> Decimal {
    Decimal::new(2, 2)
}
fn default_max_buy_price() -> Decimal {
    Decimal::new(99, 2)
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            bet_size: default_bet_size(),
            entry_timeout_secs: default_order_timeout_secs(),
            exit_timeout_secs: default_order_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_sell_attempts: default_max_sell_attempts(),
            min_order_value: default_min_order_value(),
            tick_increment: default_tick_increment(),
            sell_offset: default_sell_offset(),
            max_buy_price: default_max_buy_price(),
        }
    }
}

/// Higher-timeframe EMA filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HtfConfig {
    #[serde(default = "default_htf_candle_secs")]
    pub candle_secs: i64,
    #[serde(default = "default_htf_period")]
    pub period: usize,
}

fn default_htf_candle_secs() -> i64 {
    900
}
fn default_htf_period() -> usize {
    5
}

impl Default for HtfConfig {
    fn default() -> Self {
        Self {
            candle_secs: default_htf_candle_secs(),
            period: default_htf_period(),
        }
    }
}

/// Trend-reversal exit monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitTrendConfig {
    #[serde(default = "default_exit_tema")]
    pub tema: TrendConfig,

    /// Reversal exits are only considered after this much of the interval
    #[serde(default = "default_active_after_secs")]
    pub active_after_secs: i64,

    /// Favourable move (percent) above which a crossing is deferred
    #[serde(default = "default_cushion_pct")]
    pub cushion_pct: Decimal,
}

fn default_exit_tema() -> TrendConfig {
    TrendConfig {
        candle_secs: 60,
        fast_period: 5,
        slow_period: 12,
    }
}
fn default_active_after_secs() -> i64 {
    600
}
fn default_cushion_pct() -> Decimal {
    Decimal::new(5, 2)
}

impl Default for ExitTrendConfig {
    fn default() -> Self {
        Self {
            tema: default_exit_tema(),
            active_after_secs: default_active_after_secs(),
            cushion_pct: default_cushion_pct(),
        }
    }
}

/// Historical candle provider for calibration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CandleSourceKind {
    #[default]
    Coinbase,
    Binance,
}

/// Offline calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub source: CandleSourceKind,

    /// Coinbase product id
    #[serde(default = "default_product")]
    pub product: String,

    /// Binance symbol
    #[serde(default = "default_binance_rest_symbol")]
    pub symbol: String,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Trend used to tag observations as aligned or misaligned
    #[serde(default)]
    pub tema: TrendConfig,

    /// Observations with a smaller |move| are dropped
    #[serde(default = "default_noise_floor_pct")]
    pub noise_floor_pct: Decimal,

    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    #[serde(default = "default_fair_value_path")]
    pub output_path: PathBuf,

    /// Optional on-disk cache of fetched 1-minute candles
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_product() -> String {
    "BTC-USD".to_string()
}
fn default_binance_rest_symbol() -> String {
    "BTCUSDT".to_string()
}
fn default_lookback_days() -> u32 {
    90
}
fn default_noise_floor_pct() -> Decimal {
    Decimal::new(1, 2)
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            source: CandleSourceKind::default(),
            product: default_product(),
            symbol: default_binance_rest_symbol(),
            lookback_days: default_lookback_days(),
            tema: TrendConfig::default(),
            noise_floor_pct: default_noise_floor_pct(),
            min_samples: default_min_samples(),
            output_path: default_fair_value_path(),
            cache_path: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus listener port; 0 disables the exporter
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
