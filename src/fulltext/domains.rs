//! Per-domain failure counting.
//!
//! Each failed task adds one to its domain's count and each success resets
//! it, so the count is the number of consecutive failures. Once a domain's
//! count reaches the threshold its remaining tasks are skipped. Counts are
//! saved next to the downloads and reloaded on the next run.

use crate::error::Result;
use crate::outputs::json::{read_json, write_json};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

pub const STATE_FILE: &str = "_domain_failures.json";

#[derive(Debug)]
pub struct DomainFailures {
    counts: Mutex<HashMap<String, u32>>,
    /// 0 disables skipping.
    threshold: u32,
}

impl DomainFailures {
    pub fn new(threshold: u32) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    /// Load saved counts from `path`; a missing or unreadable file starts fresh.
    pub async fn load(path: &Path, threshold: u32) -> Self {
        let tracker = Self::new(threshold);
        if !path.exists() {
            return tracker;
        }
        match read_json::<HashMap<String, u32>>(path).await {
            Ok(saved) => {
                info!(domains = saved.len(), path = %path.display(), "Loaded domain failure counts");
                *tracker.lock() = saved;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable domain failure file"),
        }
        tracker
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn count(&self, domain: &str) -> u32 {
        self.lock().get(domain).copied().unwrap_or(0)
    }

    pub fn is_blocked(&self, domain: &str) -> bool {
        self.threshold > 0 && self.count(domain) >= self.threshold
    }

    /// Returns the domain's new count.
    pub fn record_failure(&self, domain: &str) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(domain.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if self.threshold > 0 && count == self.threshold {
            warn!(domain, count, "Domain reached failure threshold; skipping its remaining links");
        }
        count
    }

    pub fn record_success(&self, domain: &str) {
        self.lock().remove(domain);
    }

    pub fn blocked_domains(&self) -> Vec<String> {
        let mut blocked: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, c)| self.threshold > 0 && **c >= self.threshold)
            .map(|(d, _)| d.clone())
            .collect();
        blocked.sort();
        blocked
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot: BTreeMap<String, u32> = self
            .lock()
            .iter()
            .map(|(d, c)| (d.clone(), *c))
            .collect();
        write_json(path, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_at_threshold() {
        let tracker = DomainFailures::new(2);
        assert!(!tracker.is_blocked("a.com"));
        assert_eq!(tracker.record_failure("a.com"), 1);
        assert!(!tracker.is_blocked("a.com"));
        assert_eq!(tracker.record_failure("a.com"), 2);
        assert!(tracker.is_blocked("a.com"));
        assert!(!tracker.is_blocked("b.com"));
        assert_eq!(tracker.blocked_domains(), vec!["a.com"]);
    }

    #[test]
    fn test_success_resets_count() {
        let tracker = DomainFailures::new(3);
        tracker.record_failure("a.com");
        tracker.record_failure("a.com");
        tracker.record_success("a.com");
        assert_eq!(tracker.count("a.com"), 0);
        tracker.record_failure("a.com");
        assert!(!tracker.is_blocked("a.com"));
    }

    #[test]
    fn test_zero_threshold_never_blocks() {
        let tracker = DomainFailures::new(0);
        for _ in 0..100 {
            tracker.record_failure("a.com");
        }
        assert!(!tracker.is_blocked("a.com"));
        assert!(tracker.blocked_domains().is_empty());
    }

    #[tokio::test]
    async fn test_counts_survive_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(STATE_FILE);

        let tracker = DomainFailures::new(2);
        tracker.record_failure("a.com");
        tracker.record_failure("a.com");
        tracker.record_failure("b.com");
        tracker.save(&path).await.unwrap();

        let reloaded = DomainFailures::load(&path, 2).await;
        assert!(reloaded.is_blocked("a.com"));
        assert_eq!(reloaded.count("b.com"), 1);
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt_starts_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = DomainFailures::load(&tmp.path().join("nope.json"), 2).await;
        assert_eq!(missing.count("a.com"), 0);

        let corrupt_path = tmp.path().join(STATE_FILE);
        std::fs::write(&corrupt_path, "[[[").unwrap();
        let corrupt = DomainFailures::load(&corrupt_path, 2).await;
        assert_eq!(corrupt.count("a.com"), 0);
    }
}
