//! Status command implementation

use crate::config::Config;
use crate::risk::SessionSnapshot;
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recent trades to list
    #[arg(short, long, default_value = "10")]
    pub trades: usize,
}

impl StatusArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = &config.risk.state_path;
        if !path.exists() {
            println!("No session state at {}", path.display());
            println!("  Bankroll: {} (initial)", config.risk.initial_bankroll);
            return Ok(());
        }

        let snapshot = SessionSnapshot::load_or_new(path, config.risk.initial_bankroll)?;
        let board = snapshot.scoreboard();

        println!("poly-sniper status ({})", path.display());
        println!("  Updated:  {}", snapshot.updated.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Bankroll: {}", snapshot.bankroll.round_dp(2));
        println!("  Record:   {}", board);
        if let Some(rate) = board.win_rate() {
            println!("  Win rate: {:.1}%", rate * 100.0);
        }
        for (reason, count) in &board.exits {
            println!("  Exit {reason}: {count}");
        }

        if !snapshot.trades.is_empty() {
            println!("\nRecent trades:");
        }
        for t in snapshot.trades.iter().rev().take(self.trades) {
            println!(
                "  {} {:<4} {} @ {} -> {:<11} pnl {}",
                t.slug,
                t.side.outcome_name(),
                t.size,
                t.entry_price,
                t.exit_reason.map_or("held", |r| r.label()),
                t.pnl
            );
        }
        Ok(())
    }
}
