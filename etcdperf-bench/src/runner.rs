//! Fan-out of benchmark operations across workers.
//!
//! A [`Benchmark`] is split into `concurrency` workers that each own a freshly created store
//! connection. Worker `w` handles the indices `w * per_worker .. (w + 1) * per_worker`, where
//! `per_worker = count / concurrency`. The remainder of that division is not executed.
//!
//! Workers do not coordinate. Once all of them have finished, their latencies and error counts
//! are merged into a [`BenchmarkResult`].

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use etcdperf_client::{BoxedStore, KvStore, StoreResult};

use crate::stats::Summary;

/// The operation performed by every iteration of a benchmark.
#[derive(Clone, Debug)]
pub enum Operation {
    /// Store the value under the iteration's key.
    Put(Bytes),
    /// Read the iteration's key. A missing key is not an error.
    Get,
}

impl Operation {
    /// Runs the operation for a single key.
    pub async fn execute(&self, store: &dyn KvStore, key: &str) -> StoreResult<()> {
        match self {
            Operation::Put(value) => store.put(key, value.clone()).await,
            Operation::Get => store.get(key).await.map(|_| ()),
        }
    }
}

/// A single benchmark: one operation repeated `count` times with `concurrency` workers.
#[derive(Clone, Debug)]
pub struct Benchmark {
    /// Name used in logs and the printed report.
    pub name: String,
    /// The operation to run.
    pub operation: Operation,
    /// Total number of operations.
    pub count: usize,
    /// Number of workers.
    pub concurrency: usize,
    /// Prefix of every key, followed by the operation index.
    pub key_prefix: String,
}

impl Benchmark {
    /// Returns the key used by the operation with the given index.
    pub fn key(&self, index: usize) -> String {
        format!("{}{index}", self.key_prefix)
    }
}

/// The merged outcome of all workers of a benchmark.
#[derive(Debug, Default)]
pub struct BenchmarkResult {
    /// Latencies of all successful operations, in no particular order.
    pub latencies: Vec<Duration>,
    /// Number of failed operations.
    pub errors: u64,
    /// Number of operations assigned to each worker.
    pub worker_operations: Vec<usize>,
    /// Wall-clock time from spawning the first worker to joining the last.
    pub elapsed: Duration,
}

impl BenchmarkResult {
    /// Computes the summary statistics, or `None` if no operation succeeded.
    pub fn summary(&self) -> Option<Summary> {
        Summary::compute(&self.latencies, self.errors, self.elapsed)
    }
}

/// Per-worker results before merging.
#[derive(Debug, Default)]
struct WorkerResult {
    latencies: Vec<Duration>,
    errors: u64,
}

/// Splits `count` operations evenly into `concurrency` index ranges.
pub fn partition(count: usize, concurrency: usize) -> Vec<Range<usize>> {
    if concurrency == 0 {
        return Vec::new();
    }

    let per_worker = count / concurrency;
    (0..concurrency)
        .map(|worker| worker * per_worker..(worker + 1) * per_worker)
        .collect()
}

/// Runs the benchmark and merges the results of all workers.
///
/// `connect` is called once per worker to create the worker's own store connection. If it fails,
/// all operations of that worker are counted as errors.
pub async fn run_benchmark<F>(benchmark: &Benchmark, connect: F) -> BenchmarkResult
where
    F: Fn() -> StoreResult<BoxedStore>,
{
    tracing::info!(
        benchmark = %benchmark.name,
        operations = benchmark.count,
        concurrency = benchmark.concurrency,
        "Starting benchmark"
    );

    let benchmark = Arc::new(benchmark.clone());
    let ranges = partition(benchmark.count, benchmark.concurrency);
    let worker_operations: Vec<usize> = ranges.iter().map(ExactSizeIterator::len).collect();

    let start = Instant::now();
    let tasks: Vec<_> = ranges
        .into_iter()
        .enumerate()
        .map(|(worker, range)| {
            let connection = connect();
            let benchmark = Arc::clone(&benchmark);
            tokio::spawn(run_worker(benchmark, worker, connection, range))
        })
        .collect();

    let finished_tasks = futures::future::join_all(tasks).await;
    let elapsed = start.elapsed();

    let mut result = BenchmarkResult {
        elapsed,
        ..Default::default()
    };
    for (worker, task) in finished_tasks.into_iter().enumerate() {
        match task {
            Ok(worker_result) => {
                result.latencies.extend(worker_result.latencies);
                result.errors += worker_result.errors;
            }
            Err(err) => {
                tracing::error!(
                    benchmark = %benchmark.name,
                    worker,
                    error = &err as &dyn std::error::Error,
                    "worker did not finish"
                );
                result.errors += worker_operations[worker] as u64;
            }
        }
    }
    result.worker_operations = worker_operations;

    tracing::debug!(
        benchmark = %benchmark.name,
        successful = result.latencies.len(),
        errors = result.errors,
        elapsed = ?result.elapsed,
        "Finished benchmark"
    );

    result
}

async fn run_worker(
    benchmark: Arc<Benchmark>,
    worker: usize,
    connection: StoreResult<BoxedStore>,
    range: Range<usize>,
) -> WorkerResult {
    let store = match connection {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(
                benchmark = %benchmark.name,
                worker,
                error = &err as &dyn std::error::Error,
                "failed to connect to store"
            );
            return WorkerResult {
                latencies: Vec::new(),
                errors: range.len() as u64,
            };
        }
    };

    let mut result = WorkerResult {
        latencies: Vec::with_capacity(range.len()),
        errors: 0,
    };

    for index in range {
        let key = benchmark.key(index);
        let start = Instant::now();
        match benchmark.operation.execute(store.as_ref(), &key).await {
            Ok(()) => result.latencies.push(start.elapsed()),
            Err(err) => {
                result.errors += 1;
                tracing::error!(
                    benchmark = %benchmark.name,
                    key,
                    error = &err as &dyn std::error::Error,
                    "error in operation"
                );
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use etcdperf_client::{InMemoryStore, StoreError};

    use super::*;

    fn benchmark(operation: Operation, count: usize, concurrency: usize) -> Benchmark {
        Benchmark {
            name: "test".into(),
            operation,
            count,
            concurrency,
            key_prefix: "/perf/key-".into(),
        }
    }

    #[test]
    fn partitions_evenly() {
        let ranges = partition(100, 10);
        assert_eq!(ranges.len(), 10);
        assert!(ranges.iter().all(|r| r.len() == 10));
        assert_eq!(ranges[3], 30..40);
    }

    #[test]
    fn partition_drops_remainder() {
        for (count, concurrency) in [(105, 10), (7, 3), (3, 5), (1, 1)] {
            let total: usize = partition(count, concurrency).iter().map(|r| r.len()).sum();
            assert_eq!(total, count - count % concurrency);
        }
    }

    #[test]
    fn partitions_are_disjoint() {
        let ranges = partition(100, 7);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[tokio::test]
    async fn writes_every_key_once() {
        let store = InMemoryStore::new();
        let value = Bytes::from_static(b"value");
        let bench = benchmark(Operation::Put(value), 100, 10);

        let result = run_benchmark(&bench, || Ok(Box::new(store.clone()) as BoxedStore)).await;

        assert_eq!(result.worker_operations, vec![10; 10]);
        assert_eq!(result.latencies.len(), 100);
        assert_eq!(result.errors, 0);
        assert_eq!(store.len(), 100);
        assert_eq!(store.get_stored("/perf/key-99").unwrap(), "value");

        let summary = result.summary().unwrap();
        assert_eq!(summary.operations, 100);
        assert!(summary.throughput > 0.0);
    }

    #[tokio::test]
    async fn reading_missing_keys_succeeds() {
        let store = InMemoryStore::new();
        let bench = benchmark(Operation::Get, 20, 4);

        let result = run_benchmark(&bench, || Ok(Box::new(store.clone()) as BoxedStore)).await;

        assert_eq!(result.latencies.len(), 20);
        assert_eq!(result.errors, 0);
    }

    #[tokio::test]
    async fn counts_errors_without_aborting() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let bench = benchmark(Operation::Get, 10, 2);

        let result = run_benchmark(&bench, || Ok(Box::new(store.clone()) as BoxedStore)).await;

        assert!(result.latencies.is_empty());
        assert_eq!(result.errors, 10);
        assert!(result.summary().is_none());
    }

    #[tokio::test]
    async fn failed_connections_count_as_errors() {
        let bench = benchmark(Operation::Get, 30, 3);

        let result = run_benchmark(&bench, || {
            Err(StoreError::Unavailable("connection refused".into()))
        })
        .await;

        assert_eq!(result.errors, 30);
        assert!(result.summary().is_none());
    }

    #[tokio::test]
    async fn more_workers_than_operations() {
        let store = InMemoryStore::new();
        let bench = benchmark(Operation::Put(Bytes::new()), 3, 5);

        let result = run_benchmark(&bench, || Ok(Box::new(store.clone()) as BoxedStore)).await;

        assert_eq!(result.worker_operations, vec![0; 5]);
        assert!(result.latencies.is_empty());
        assert_eq!(result.errors, 0);
        assert!(store.is_empty());
    }
}
