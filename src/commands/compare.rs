use crate::comparison::{ComparisonMode, ComparisonSession};
use crate::context::AppContext;
use anyhow::Result;
use log::{info, warn};

pub async fn run(app: &AppContext, ids: &[String], instances: bool) -> Result<()> {
    let client = app.client()?;
    let mode = if instances {
        ComparisonMode::Instances
    } else {
        ComparisonMode::Runs
    };

    let mut session = ComparisonSession::new(mode);
    let failures = match mode {
        ComparisonMode::Runs => {
            session
                .ensure(ids, |id| {
                    let client = client.clone();
                    async move { client.fetch_run_entry(&id).await }
                })
                .await
        }
        ComparisonMode::Instances => {
            session
                .ensure(ids, |id| {
                    let client = client.clone();
                    async move { client.fetch_instance_entry(&id).await }
                })
                .await
        }
    };

    for failure in &failures {
        warn!("{}", failure);
    }
    info!(
        "Comparison loaded {} of {} entries",
        ids.len() - failures.len(),
        ids.len()
    );

    println!("\n=== COMPARISON ({} mode) ===\n", match mode {
        ComparisonMode::Runs => "run",
        ComparisonMode::Instances => "instance",
    });

    // Output keyed to the requested selection, not everything ever cached.
    for id in ids {
        let Some(entry) = session.entries().get(id) else {
            println!("{}: unavailable", id);
            continue;
        };
        println!("{}:", id);
        if let Some(run_count) = entry.run_count {
            println!("  Runs Averaged: {}", run_count);
        }
        println!("  Net Profit: {:.2}", entry.stats.net_profit);
        println!("  Win Rate: {:.2}%", entry.stats.win_rate * 100.0);
        println!("  Profit Factor: {:.4}", entry.stats.profit_factor);
        println!("  Sharpe Ratio: {:.4}", entry.stats.sharpe_ratio);
        println!("  Max Drawdown: {:.2}", entry.stats.max_drawdown);
        println!("  Total Trades: {}", entry.stats.total_trades);
        println!("  Equity Points: {}", entry.equity_curve.len());
        println!();
    }

    Ok(())
}
