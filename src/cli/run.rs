//! Run command implementation

use super::candle_source;
use crate::calibration::FairValueTable;
use crate::config::{Config, ExecutionMode};
use crate::engine::Engine;
use crate::execution::{OrderGateway, PaperGateway};
use crate::feed;
use crate::market::{ClobClient, GammaClient, MarketCache, MarketQuery};
use crate::position::{ControllerConfig, PositionController};
use crate::risk::SessionSnapshot;
use crate::signal::SignalEvaluator;
use anyhow::Context;
use chrono::Utc;
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Controller command queue depth
const COMMAND_CAPACITY: usize = 32;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the starting bankroll when no session state exists
    #[arg(long)]
    pub bankroll: Option<Decimal>,

    /// Skip the historical trend bootstrap
    #[arg(long)]
    pub no_bootstrap: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if config.execution.mode == ExecutionMode::Live {
            anyhow::bail!("live order signing is not available in this build; set execution.mode = \"paper\"");
        }

        let table = match FairValueTable::load(&config.signal.fair_value_path, config.signal.min_samples) {
            Ok(table) => {
                tracing::info!(
                    path = %config.signal.fair_value_path.display(),
                    trusted_cells = table.trusted_cells(),
                    "Loaded fair-value table"
                );
                table
            }
            Err(e) => {
                tracing::warn!(
                    path = %config.signal.fair_value_path.display(),
                    error = %e,
                    "No fair-value table, entries suppressed until calibrated"
                );
                FairValueTable::empty(config.signal.min_samples)
            }
        };

        let timeout = Duration::from_secs(config.market.request_timeout_secs);
        let market: Arc<dyn MarketQuery> = Arc::new(MarketCache::new(
            GammaClient::new(&config.market.gamma_url, timeout)?,
            ClobClient::new(&config.market.clob_url, timeout)?,
            Duration::from_secs(config.market.cache_ttl_secs),
        ));
        let gateway: Arc<dyn OrderGateway> = Arc::new(PaperGateway::new(market.clone()));

        let initial = self.bankroll.unwrap_or(config.risk.initial_bankroll);
        let session = SessionSnapshot::load_or_new(&config.risk.state_path, initial)
            .context("failed to load session state")?;

        let evaluator = Arc::new(SignalEvaluator::new(
            config.signal.clone(),
            &config.execution,
            Arc::new(table),
        ));
        let controller = PositionController::new(
            ControllerConfig::from_config(config),
            gateway,
            market,
            evaluator.clone(),
            session,
        )
        .spawn(COMMAND_CAPACITY);

        let mut engine = Engine::new(config, evaluator, controller);

        if !self.no_bootstrap {
            match candle_source(&config.calibration) {
                Ok((source, name)) => {
                    tracing::info!(source = name, "Bootstrapping trend trackers");
                    engine.bootstrap(source.as_ref(), Utc::now()).await;
                }
                Err(e) => tracing::warn!(error = %e, "No candle source, trend warms up from live ticks"),
            }
        }

        let ticks = feed::from_config(&config.feed).subscribe().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Ctrl-C received, finishing in-flight orders");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ctrl-C handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        });

        tracing::info!(mode = ?config.execution.mode, source = ?config.feed.source, "Trading loop started");
        let last = engine.run(ticks, shutdown_rx).await;

        println!("Session P&L: {}", last.session_pnl.round_dp(2));
        println!("Bankroll:    {}", last.bankroll.round_dp(2));
        println!("Record:      {}", last.scoreboard);
        Ok(())
    }
}
