//! Aggregated request statistics of a load test.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;

use crate::profile::{Outcome, Task, TaskResult};

/// Statistics of all requests issued for a single task.
#[derive(Default)]
pub struct TaskStats {
    /// Response times in seconds, of successful and failed requests alike.
    pub timing: DDSketch,
    /// Number of issued requests.
    pub requests: u64,
    /// Number of failed requests.
    pub failures: u64,
}

impl TaskStats {
    /// Returns the average response time, or `None` without any requests.
    pub fn average(&self) -> Option<Duration> {
        let count = self.timing.count();
        if count == 0 {
            return None;
        }
        let sum = self.timing.sum()?;
        Some(Duration::from_secs_f64(sum / count as f64))
    }

    /// Returns the response time at quantile `q`, or `None` without any requests.
    pub fn quantile(&self, q: f64) -> Option<Duration> {
        let value = self.timing.quantile(q).ok()??;
        Some(Duration::from_secs_f64(value.max(0.0)))
    }

    /// Returns the request rate over `duration`.
    pub fn requests_per_second(&self, duration: Duration) -> f64 {
        self.requests as f64 / duration.as_secs_f64()
    }

    fn merge(&mut self, other: &TaskStats) {
        if let Err(err) = self.timing.merge(&other.timing) {
            tracing::warn!(error = ?err, "failed to merge response times");
        }
        self.requests += other.requests;
        self.failures += other.failures;
    }
}

impl fmt::Debug for TaskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStats")
            .field("requests", &self.requests)
            .field("failures", &self.failures)
            .field("average", &self.average())
            .finish_non_exhaustive()
    }
}

/// Statistics of a whole load test, grouped by task.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Per-task statistics.
    pub tasks: BTreeMap<Task, TaskStats>,
    /// Number of occurrences of each distinct failure.
    pub failures: BTreeMap<(Task, String), u64>,
}

impl Metrics {
    /// Records the result of one task.
    pub fn record(&mut self, result: TaskResult) {
        let stats = self.tasks.entry(result.task).or_default();
        stats.timing.add(result.elapsed.as_secs_f64());
        stats.requests += 1;

        if let Outcome::Failure(message) = result.outcome {
            stats.failures += 1;
            *self.failures.entry((result.task, message)).or_default() += 1;
        }
    }

    /// Returns the statistics of all tasks combined.
    pub fn total(&self) -> TaskStats {
        let mut total = TaskStats::default();
        for stats in self.tasks.values() {
            total.merge(stats);
        }
        total
    }

    /// Returns the number of requests across all tasks.
    pub fn requests(&self) -> u64 {
        self.tasks.values().map(|stats| stats.requests).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(task: Task, millis: u64, outcome: Outcome) -> TaskResult {
        TaskResult {
            task,
            elapsed: Duration::from_millis(millis),
            outcome,
        }
    }

    #[test]
    fn records_per_task() {
        let mut metrics = Metrics::default();
        metrics.record(result(Task::Put, 10, Outcome::Success));
        metrics.record(result(Task::Put, 20, Outcome::Success));
        metrics.record(result(Task::Get, 5, Outcome::Success));

        assert_eq!(metrics.tasks[&Task::Put].requests, 2);
        assert_eq!(metrics.tasks[&Task::Get].requests, 1);
        assert!(!metrics.tasks.contains_key(&Task::Delete));
        assert_eq!(metrics.requests(), 3);

        let average = metrics.tasks[&Task::Put].average().unwrap();
        assert!((average.as_secs_f64() - 0.015).abs() < 1e-9);
    }

    #[test]
    fn groups_failures() {
        let mut metrics = Metrics::default();
        let failure = || Outcome::Failure("Failed to get key: 500".into());
        metrics.record(result(Task::Get, 1, failure()));
        metrics.record(result(Task::Get, 1, failure()));
        metrics.record(result(Task::Put, 1, Outcome::Failure("other".into())));

        assert_eq!(metrics.tasks[&Task::Get].failures, 2);
        assert_eq!(metrics.failures.len(), 2);
        assert_eq!(
            metrics.failures[&(Task::Get, "Failed to get key: 500".to_owned())],
            2
        );
    }

    #[test]
    fn totals_merge_tasks() {
        let mut metrics = Metrics::default();
        for millis in 1..=50 {
            metrics.record(result(Task::Put, millis, Outcome::Success));
            metrics.record(result(Task::Get, millis, Outcome::Success));
        }
        metrics.record(result(Task::Delete, 1, Outcome::Failure("x".into())));

        let total = metrics.total();
        assert_eq!(total.requests, 101);
        assert_eq!(total.failures, 1);
        assert_eq!(total.timing.count(), 101);

        let p50 = total.quantile(0.5).unwrap();
        // DDSketch guarantees a relative error of 1%
        assert!((p50.as_secs_f64() - 0.025).abs() < 0.002, "{p50:?}");
    }

    #[test]
    fn empty_stats() {
        let stats = TaskStats::default();
        assert_eq!(stats.average(), None);
        assert_eq!(stats.quantile(0.5), None);
        assert_eq!(Metrics::default().requests(), 0);
    }
}
