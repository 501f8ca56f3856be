use crate::models::{EquityPoint, RunStats, TradeRecord};
use statrs::statistics::Statistics;

/// Cumulative net PnL over trades in exit-time order, indexed from 1.
///
/// Trades sharing an exit time keep their incoming relative order.
/// Non-finite PnL values are treated as zero so one corrupt trade cannot
/// poison the rest of the curve.
pub fn build_equity_curve(trades: &[TradeRecord]) -> Vec<EquityPoint> {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by_key(|trade| trade.exit_time);

    let mut cumulative = 0.0;
    ordered
        .iter()
        .enumerate()
        .map(|(i, trade)| {
            if trade.pnl_net.is_finite() {
                cumulative += trade.pnl_net;
            }
            EquityPoint {
                index: i + 1,
                value: cumulative,
            }
        })
        .collect()
}

/// Summary statistics for one run derived from its trades and equity curve.
pub fn compute_run_stats(trades: &[TradeRecord], curve: &[EquityPoint]) -> RunStats {
    let total_trades = trades.len() as i32;

    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut winning = 0;
    for trade in trades {
        let pnl = if trade.pnl_net.is_finite() {
            trade.pnl_net
        } else {
            0.0
        };
        if pnl > 0.0 {
            gross_profit += pnl;
            winning += 1;
        } else if pnl < 0.0 {
            gross_loss += -pnl;
        }
    }

    let win_rate = if total_trades > 0 {
        winning as f64 / total_trades as f64
    } else {
        0.0
    };

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        0.0
    };

    RunStats {
        net_profit: curve.last().map(|point| point.value).unwrap_or(0.0),
        win_rate,
        profit_factor,
        sharpe_ratio: sharpe_ratio(curve),
        max_drawdown: max_drawdown(curve),
        total_trades,
    }
}

/// Annualized Sharpe ratio over per-step equity deltas, assuming one step
/// per trading day.
fn sharpe_ratio(curve: &[EquityPoint]) -> f64 {
    if curve.len() < 2 {
        return 0.0;
    }

    let deltas: Vec<f64> = curve.windows(2).map(|w| w[1].value - w[0].value).collect();
    let mean = deltas.clone().mean();
    let std_dev = deltas.std_dev();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }

    mean / std_dev * (252.0_f64).sqrt()
}

/// Largest peak-to-trough fall of the equity curve, as a positive number.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0;
    for point in curve {
        peak = peak.max(point.value);
        let drawdown = peak - point.value;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}

/// Field-wise mean over a set of run stats, for instance-level aggregation.
/// Each sum is accumulated in full and divided once at the end.
pub fn average_stats(all: &[RunStats]) -> RunStats {
    if all.is_empty() {
        return RunStats::default();
    }

    let count = all.len() as f64;
    let mut sum = RunStats::default();
    let mut trades_sum = 0.0;
    for stats in all {
        sum.net_profit += stats.net_profit;
        sum.win_rate += stats.win_rate;
        sum.profit_factor += stats.profit_factor;
        sum.sharpe_ratio += stats.sharpe_ratio;
        sum.max_drawdown += stats.max_drawdown;
        trades_sum += stats.total_trades as f64;
    }

    RunStats {
        net_profit: sum.net_profit / count,
        win_rate: sum.win_rate / count,
        profit_factor: sum.profit_factor / count,
        sharpe_ratio: sum.sharpe_ratio / count,
        max_drawdown: sum.max_drawdown / count,
        total_trades: (trades_sum / count).round() as i32,
    }
}
