use crate::alignment::{self, NamedCurve};
use crate::equity;
use crate::models::{ComparisonEntry, EquityPoint};
use futures::future;
use log::warn;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// A fetch that failed for one id. The rest of the selection is unaffected.
#[derive(Debug, Clone, Error)]
#[error("fetch for {id} failed: {reason}")]
pub struct FetchFailure {
    pub id: String,
    pub reason: String,
}

/// Result of ensuring a selection: the cache with every reachable entry
/// present, plus the ids that could not be fetched.
#[derive(Debug, Clone)]
pub struct EnsureOutcome {
    pub entries: HashMap<String, ComparisonEntry>,
    pub failures: Vec<FetchFailure>,
}

/// Fill the gaps between `ids` and `existing` by calling `fetch_one` at most
/// once per missing id, concurrently. Entries already cached are reused as-is
/// and the incoming map is never mutated.
pub async fn ensure<F, Fut>(
    ids: &[String],
    existing: &HashMap<String, ComparisonEntry>,
    fetch_one: F,
) -> EnsureOutcome
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<ComparisonEntry>>,
{
    let mut missing: Vec<String> = Vec::new();
    for id in ids {
        if !existing.contains_key(id) && !missing.contains(id) {
            missing.push(id.clone());
        }
    }

    let mut entries = existing.clone();
    if missing.is_empty() {
        return EnsureOutcome {
            entries,
            failures: Vec::new(),
        };
    }

    let fetches = missing.into_iter().map(|id| {
        let fut = fetch_one(id.clone());
        async move { (id, fut.await) }
    });

    let mut failures = Vec::new();
    for (id, result) in future::join_all(fetches).await {
        match result {
            Ok(entry) => {
                entries.insert(id, entry);
            }
            Err(error) => {
                warn!("Failed to load comparison entry {}: {:#}", id, error);
                failures.push(FetchFailure {
                    id,
                    reason: format!("{:#}", error),
                });
            }
        }
    }

    EnsureOutcome { entries, failures }
}

/// What the ids in a comparison refer to. Entries fetched under one mode are
/// meaningless under the other, so switching modes drops the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Runs,
    Instances,
}

/// A long-lived comparison view: the current mode and the entries fetched so
/// far. Re-selecting an id that is already cached costs nothing.
#[derive(Debug, Clone)]
pub struct ComparisonSession {
    mode: ComparisonMode,
    entries: HashMap<String, ComparisonEntry>,
}

impl ComparisonSession {
    pub fn new(mode: ComparisonMode) -> Self {
        ComparisonSession {
            mode,
            entries: HashMap::new(),
        }
    }

    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    pub fn entries(&self) -> &HashMap<String, ComparisonEntry> {
        &self.entries
    }

    pub fn set_mode(&mut self, mode: ComparisonMode) {
        if self.mode != mode {
            self.mode = mode;
            self.entries.clear();
        }
    }

    /// Fetch whatever the current selection still lacks. Returns the per-id
    /// failures so the caller can surface them next to the results.
    pub async fn ensure<F, Fut>(&mut self, ids: &[String], fetch_one: F) -> Vec<FetchFailure>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = anyhow::Result<ComparisonEntry>>,
    {
        let outcome = ensure(ids, &self.entries, fetch_one).await;
        self.entries = outcome.entries;
        outcome.failures
    }
}

/// Collapse the runs of one instance into a single comparison entry.
///
/// Stats are the field-wise mean of the run stats. The equity curve is the
/// aligned average of the run curves when there are at least two, otherwise
/// the single curve passes through. Trades are pooled and re-sorted by exit
/// time.
pub fn aggregate_instance(run_entries: Vec<ComparisonEntry>) -> ComparisonEntry {
    let run_count = run_entries.len();

    let stats_list: Vec<_> = run_entries.iter().map(|entry| entry.stats.clone()).collect();
    let stats = equity::average_stats(&stats_list);

    let curves: Vec<NamedCurve> = run_entries
        .iter()
        .enumerate()
        .map(|(i, entry)| NamedCurve {
            id: i.to_string(),
            points: entry.equity_curve.clone(),
        })
        .collect();

    let equity_curve = if run_count >= 2 {
        alignment::align(&curves)
            .into_iter()
            .filter_map(|point| {
                point.average.map(|value| EquityPoint {
                    index: point.index,
                    value,
                })
            })
            .collect()
    } else {
        run_entries
            .first()
            .map(|entry| entry.equity_curve.clone())
            .unwrap_or_default()
    };

    let mut trades: Vec<_> = run_entries
        .into_iter()
        .flat_map(|entry| entry.trades)
        .collect();
    trades.sort_by_key(|trade| trade.exit_time);

    ComparisonEntry {
        stats,
        trades,
        equity_curve,
        run_count: Some(run_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStats;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(net_profit: f64) -> ComparisonEntry {
        ComparisonEntry {
            stats: RunStats {
                net_profit,
                ..RunStats::default()
            },
            trades: Vec::new(),
            equity_curve: vec![EquityPoint {
                index: 1,
                value: net_profit,
            }],
            run_count: None,
        }
    }

    #[tokio::test]
    async fn fetches_each_missing_id_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ids = vec!["r1".to_string(), "r1".to_string(), "r2".to_string()];

        let counter = Arc::clone(&calls);
        let outcome = ensure(&ids, &HashMap::new(), move |_id| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(entry(1.0))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.entries.len(), 2);
        assert!(outcome.failures.is_empty());

        // A second pass over the same selection touches nothing.
        let counter = Arc::clone(&calls);
        let again = ensure(&ids, &outcome.entries, move |_id| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(entry(1.0))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(again.entries.len(), 2);
    }

    #[tokio::test]
    async fn one_failing_id_does_not_sink_the_rest() {
        let ids = vec!["ok".to_string(), "broken".to_string()];

        let outcome = ensure(&ids, &HashMap::new(), |id| async move {
            if id == "broken" {
                Err(anyhow!("backend said no"))
            } else {
                Ok(entry(5.0))
            }
        })
        .await;

        assert_eq!(outcome.entries.len(), 1);
        assert!(outcome.entries.contains_key("ok"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id, "broken");
    }

    #[tokio::test]
    async fn existing_map_is_left_untouched() {
        let mut existing = HashMap::new();
        existing.insert("r1".to_string(), entry(1.0));
        let before = existing.clone();

        let ids = vec!["r1".to_string(), "r2".to_string()];
        let outcome = ensure(&ids, &existing, |_id| async move { Ok(entry(2.0)) }).await;

        assert_eq!(existing, before);
        assert_eq!(outcome.entries.len(), 2);
    }

    #[tokio::test]
    async fn switching_modes_clears_the_session() {
        let mut session = ComparisonSession::new(ComparisonMode::Runs);
        let ids = vec!["r1".to_string()];
        session.ensure(&ids, |_id| async move { Ok(entry(1.0)) }).await;
        assert_eq!(session.entries().len(), 1);

        session.set_mode(ComparisonMode::Instances);
        assert!(session.entries().is_empty());

        // Setting the same mode again keeps what we have.
        session.ensure(&ids, |_id| async move { Ok(entry(1.0)) }).await;
        session.set_mode(ComparisonMode::Instances);
        assert_eq!(session.entries().len(), 1);
    }

    #[test]
    fn instance_aggregation_averages_runs() {
        let mut a = entry(10.0);
        a.equity_curve = vec![
            EquityPoint { index: 1, value: 10.0 },
            EquityPoint { index: 2, value: 20.0 },
        ];
        let b = entry(20.0);

        let merged = aggregate_instance(vec![a, b]);
        assert_eq!(merged.run_count, Some(2));
        assert_eq!(merged.stats.net_profit, 15.0);
        // Second index forward-fills b's single point.
        assert_eq!(merged.equity_curve.len(), 2);
        assert_eq!(merged.equity_curve[0].value, 15.0);
        assert_eq!(merged.equity_curve[1].value, 20.0);
    }

    #[test]
    fn single_run_instance_passes_its_curve_through() {
        let a = entry(10.0);
        let curve = a.equity_curve.clone();
        let merged = aggregate_instance(vec![a]);
        assert_eq!(merged.run_count, Some(1));
        assert_eq!(merged.equity_curve, curve);
    }
}
