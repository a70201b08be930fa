//! Summary statistics over per-operation latencies.

use std::fmt;
use std::time::Duration;

/// Aggregate statistics of a single benchmark run.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// Wall-clock time of the whole run, including worker startup.
    pub total_time: Duration,
    /// Number of successful operations.
    pub operations: usize,
    /// Number of failed operations.
    pub errors: u64,
    /// Successful operations per second of wall-clock time.
    pub throughput: f64,
    /// Arithmetic mean of the latencies.
    pub mean: Duration,
    /// 95th percentile latency.
    pub p95: Duration,
    /// 99th percentile latency.
    pub p99: Duration,
}

impl Summary {
    /// Computes the summary of a run.
    ///
    /// Returns `None` if there are no latency samples, since neither throughput nor percentiles
    /// are meaningful without a single successful operation.
    pub fn compute(latencies: &[Duration], errors: u64, total_time: Duration) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }

        // nanoseconds are exact in an f64 for any realistic latency
        let mut samples: Vec<f64> = latencies.iter().map(|d| d.as_nanos() as f64).collect();
        samples.sort_by(f64::total_cmp);

        let operations = samples.len();
        let mean = samples.iter().sum::<f64>() / operations as f64;

        Some(Self {
            total_time,
            operations,
            errors,
            throughput: operations as f64 / total_time.as_secs_f64(),
            mean: from_nanos(mean),
            p95: from_nanos(percentile_or_max(&samples, 20)),
            p99: from_nanos(percentile_or_max(&samples, 100)),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Time: {:.4}s", self.total_time.as_secs_f64())?;
        writeln!(f, "Total Ops: {}", self.operations)?;
        writeln!(f, "Errors: {}", self.errors)?;
        writeln!(f, "Throughput: {:.2} ops/sec", self.throughput)?;
        writeln!(f, "Avg Latency: {:.2} ms", millis(self.mean))?;
        writeln!(f, "P95 Latency: {:.2} ms", millis(self.p95))?;
        write!(f, "P99 Latency: {:.2} ms", millis(self.p99))
    }
}

fn from_nanos(nanos: f64) -> Duration {
    Duration::from_nanos(nanos.round().max(0.0) as u64)
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Returns the highest of the `n`-quantile cut points of `sorted`.
///
/// For `n = 20` this is the 95th percentile, for `n = 100` the 99th. If there are fewer than `n`
/// samples the cut point cannot be resolved, and the maximum sample is returned instead.
///
/// `sorted` must be sorted in ascending order and non-empty.
pub fn percentile_or_max(sorted: &[f64], n: usize) -> f64 {
    if sorted.len() >= n {
        quantile(sorted, n, n - 1)
    } else {
        sorted[sorted.len() - 1]
    }
}

/// Computes the `i`-th of the `n`-quantile cut points of `sorted`.
///
/// This uses the *exclusive* method: the data is treated as a sample from a larger population,
/// so the `i`-th cut point lies at rank `i * (len + 1) / n`, linearly interpolated between the
/// neighbouring samples. The rank is clamped so that the two neighbours always exist.
///
/// `sorted` must contain at least two samples and `0 < i < n` must hold.
pub fn quantile(sorted: &[f64], n: usize, i: usize) -> f64 {
    let len = sorted.len();
    let m = len + 1;

    let j = (i * m / n).clamp(1, len - 1);
    // exact integer interpolation weight, may be negative when clamped at the upper end
    let delta = (i * m) as f64 - (j * n) as f64;
    let n = n as f64;

    (sorted[j - 1] * (n - delta) + sorted[j] * delta) / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: impl IntoIterator<Item = u64>) -> Vec<Duration> {
        values.into_iter().map(Duration::from_millis).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn no_samples_no_summary() {
        assert_eq!(Summary::compute(&[], 7, Duration::from_secs(1)), None);
    }

    #[test]
    fn p95_falls_back_to_max() {
        let latencies = ms([5, 1, 19, 3]);
        let summary = Summary::compute(&latencies, 0, Duration::from_secs(1)).unwrap();

        assert_eq!(summary.p95, Duration::from_millis(19));
        assert_eq!(summary.p99, Duration::from_millis(19));
    }

    #[test]
    fn p99_falls_back_to_max_below_hundred() {
        let latencies = ms(1..=99);
        let summary = Summary::compute(&latencies, 0, Duration::from_secs(1)).unwrap();

        assert_eq!(summary.p99, Duration::from_millis(99));
        assert!(summary.p95 < summary.p99);
    }

    #[test]
    fn exclusive_quantiles() {
        // reference values of `statistics.quantiles(range(1, 21), n=20)[18]` and
        // `statistics.quantiles(range(1, 101), n=100)[98]`
        let twenty: Vec<f64> = (1..=20).map(f64::from).collect();
        assert!(approx(quantile(&twenty, 20, 19), 19.95));

        let hundred: Vec<f64> = (1..=100).map(f64::from).collect();
        assert!(approx(quantile(&hundred, 100, 99), 99.99));
        assert!(approx(quantile(&hundred, 20, 19), 95.95));
    }

    #[test]
    fn quantile_clamps_to_range() {
        // `statistics.quantiles([1, 2], n=4)` is `[0.75, 1.5, 2.25]`
        let data = [1.0, 2.0];
        assert!(approx(quantile(&data, 4, 1), 0.75));
        assert!(approx(quantile(&data, 4, 2), 1.5));
        assert!(approx(quantile(&data, 4, 3), 2.25));
    }

    #[test]
    fn mean_and_throughput() {
        let latencies = ms([10, 20, 30, 40]);
        let summary = Summary::compute(&latencies, 2, Duration::from_secs(2)).unwrap();

        assert_eq!(summary.operations, 4);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.mean, Duration::from_millis(25));
        assert!(approx(summary.throughput, 2.0));
    }

    #[test]
    fn latencies_are_non_negative() {
        let latencies = ms([0, 0, 1]);
        let summary = Summary::compute(&latencies, 0, Duration::from_millis(3)).unwrap();

        assert!(summary.mean >= Duration::ZERO);
        assert!(summary.p95 >= Duration::ZERO);
    }

    #[test]
    fn display_block() {
        let summary = Summary {
            total_time: Duration::from_millis(1500),
            operations: 100,
            errors: 1,
            throughput: 66.666,
            mean: Duration::from_micros(1234),
            p95: Duration::from_millis(3),
            p99: Duration::from_millis(4),
        };

        let expected = "\
Total Time: 1.5000s
Total Ops: 100
Errors: 1
Throughput: 66.67 ops/sec
Avg Latency: 1.23 ms
P95 Latency: 3.00 ms
P99 Latency: 4.00 ms";
        assert_eq!(summary.to_string(), expected);
    }
}
