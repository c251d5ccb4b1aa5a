use std::{
    collections::VecDeque,
    future::Future,
    time::{Duration, Instant}
};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use parking_lot::Mutex;
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct OperationSample {
    pub operation: &'static str,
    pub duration: Duration,
    pub success: bool,
    pub recorded_at: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub count: usize,
    pub successes: usize,
    pub failures: usize,
    pub average_ms: f64,
    /// Nearest-rank 95th percentile
    pub p95_ms: f64,
    pub max_ms: f64
}

/// Keeps the most recent operation timings in a bounded ring.
///
/// Owned by the service instance; nothing here is global.
pub struct PerformanceMonitor {
    samples: Mutex<VecDeque<OperationSample>>,
    capacity: usize,
    slow_threshold: Duration
}

impl PerformanceMonitor {
    pub fn new(capacity: usize, slow_threshold: Duration) -> Self {
        let capacity = capacity.max(1);

        PerformanceMonitor {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            slow_threshold
        }
    }

    /// Times `future` and records whether it returned `Ok`.
    pub async fn track<T, E, F>(&self, operation: &'static str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>
    {
        let started = Instant::now();
        let result = future.await;
        self.record(operation, started.elapsed(), result.is_ok());

        result
    }

    pub fn record(&self, operation: &'static str, duration: Duration, success: bool) {
        if duration > self.slow_threshold {
            warn!(
                operation,
                elapsed_ms = duration.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow operation"
            );
        } else {
            debug!(operation, elapsed_us = duration.as_micros() as u64, success, "Operation recorded");
        }

        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(OperationSample {
            operation,
            duration,
            success,
            recorded_at: Utc::now()
        });
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn samples(&self) -> Vec<OperationSample> {
        self.samples.lock().iter().cloned().collect()
    }

    /// Per-operation figures over the retained samples, keyed by operation name.
    pub fn summary(&self) -> IndexMap<&'static str, OperationSummary> {
        let samples = self.samples();

        samples
            .iter()
            .into_group_map_by(|s| s.operation)
            .into_iter()
            .sorted_by_key(|(operation, _)| *operation)
            .map(|(operation, group)| (operation, summarize(&group)))
            .collect()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

fn summarize(samples: &[&OperationSample]) -> OperationSummary {
    let millis = samples
        .iter()
        .map(|s| s.duration.as_secs_f64() * 1000.0)
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec();
    let successes = samples.iter().filter(|s| s.success).count();

    let rank = ((millis.len() as f64 * 0.95).ceil() as usize).clamp(1, millis.len());

    OperationSummary {
        count: samples.len(),
        successes,
        failures: samples.len() - successes,
        average_ms: Statistics::mean(millis.iter()),
        p95_ms: millis[rank - 1],
        max_ms: millis[millis.len() - 1]
    }
}
