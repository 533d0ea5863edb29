/// Swap statistics per router
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Quotes returned successfully
    pub quotes: u64,
    pub quote_failures: u64,
    /// Times this router carried the selected route
    pub wins: u64,
    pub swaps: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SwapStats {
    pub routers: BTreeMap<String, RouterStats>,
    pub total_quotes: u64,
    pub total_swaps: u64,
    pub successful_swaps: u64,
    pub failed_swaps: u64,
    pub dry_runs: u64,
    pub split_swaps: u64,
    /// Failed swaps that spent part of their input before stopping
    pub partial_swaps: u64,
    pub average_swap_time_ms: f64,
    pub last_swap: Option<DateTime<Utc>>,
}

impl SwapStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_swaps == 0 {
            0.0
        } else {
            self.successful_swaps as f64 / self.total_swaps as f64 * 100.0
        }
    }
}

/// Shared handle; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    inner: Arc<RwLock<SwapStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_quote_round(&self, successes: &[String], failures: &[String]) {
        let mut stats = self.inner.write().await;
        stats.total_quotes += 1;
        for id in successes {
            stats.routers.entry(id.clone()).or_default().quotes += 1;
        }
        for id in failures {
            stats.routers.entry(id.clone()).or_default().quote_failures += 1;
        }
    }

    pub async fn record_win(&self, router_ids: &[String]) {
        let mut stats = self.inner.write().await;
        for id in router_ids {
            stats.routers.entry(id.clone()).or_default().wins += 1;
        }
    }

    pub async fn record_swap(&self, router_ids: &[String], success: bool, dry_run: bool, split: bool, elapsed_ms: f64) {
        let mut stats = self.inner.write().await;
        if dry_run {
            stats.dry_runs += 1;
            return;
        }
        stats.total_swaps += 1;
        if success {
            stats.successful_swaps += 1;
        } else {
            stats.failed_swaps += 1;
        }
        if split {
            stats.split_swaps += 1;
        }
        let n = stats.total_swaps as f64;
        stats.average_swap_time_ms = (stats.average_swap_time_ms * (n - 1.0) + elapsed_ms) / n;
        stats.last_swap = Some(Utc::now());
        for id in router_ids {
            let entry = stats.routers.entry(id.clone()).or_default();
            if success {
                entry.swaps += 1;
            } else {
                entry.failures += 1;
            }
        }
    }

    pub async fn record_partial(&self) {
        self.inner.write().await.partial_swaps += 1;
    }

    pub async fn snapshot(&self) -> SwapStats {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let tracker = StatsTracker::new();
        let ids = vec!["uniswap_v2".to_string()];
        tracker
            .record_quote_round(&ids, &["aggregator".to_string()])
            .await;
        tracker.record_win(&ids).await;
        tracker.record_swap(&ids, true, false, false, 100.0).await;
        tracker.record_swap(&ids, false, false, false, 300.0).await;
        tracker.record_partial().await;
        tracker.record_swap(&ids, true, true, false, 5.0).await;

        let stats = tracker.snapshot().await;
        assert_eq!(stats.total_quotes, 1);
        assert_eq!(stats.total_swaps, 2);
        assert_eq!(stats.dry_runs, 1);
        assert_eq!(stats.partial_swaps, 1);
        assert_eq!(stats.average_swap_time_ms, 200.0);
        assert_eq!(stats.success_rate(), 50.0);
        let uni = &stats.routers["uniswap_v2"];
        assert_eq!((uni.quotes, uni.wins, uni.swaps, uni.failures), (1, 1, 1, 1));
        assert_eq!(stats.routers["aggregator"].quote_failures, 1);
    }
}
