//! The standard benchmark suite run by `etcd-bench`.

use anyhow::Result;
use bytes::Bytes;
use etcdperf_client::{BoxedStore, EtcdClient, StoreResult};
use rand::Rng;

use crate::config::Config;
use crate::report::print_result;
use crate::runner::{Benchmark, BenchmarkResult, Operation, run_benchmark};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a random value of `size` ASCII letters.
pub fn generate_value(size: usize) -> Bytes {
    let mut rng = rand::rng();
    (0..size)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())])
        .collect::<Vec<u8>>()
        .into()
}

/// Builds the four benchmarks of the suite.
///
/// Writes of all benchmarks share a single value of `config.data_size` bytes, and reads target
/// the keys written before.
pub fn standard_suite(config: &Config, value: Bytes) -> Vec<Benchmark> {
    let benchmark = |name: &str, operation: Operation, concurrency: usize| Benchmark {
        name: name.to_owned(),
        operation,
        count: config.operations,
        concurrency,
        key_prefix: config.key_prefix.clone(),
    };

    vec![
        benchmark("Sequential Write", Operation::Put(value.clone()), 1),
        benchmark("Sequential Read", Operation::Get, 1),
        benchmark("Concurrent Write", Operation::Put(value), config.concurrency),
        benchmark("Concurrent Read", Operation::Get, config.concurrency),
    ]
}

/// Runs the standard suite with the given connection factory, printing each result.
pub async fn run_suite<F>(config: &Config, connect: F) -> Vec<(String, BenchmarkResult)>
where
    F: Fn() -> StoreResult<BoxedStore>,
{
    let value = generate_value(config.data_size);
    let mut results = Vec::new();

    for benchmark in standard_suite(config, value) {
        let result = run_benchmark(&benchmark, &connect).await;
        print_result(&benchmark.name, &result);
        results.push((benchmark.name, result));
    }

    results
}

/// Runs the standard suite against the etcd server configured in `config`.
pub async fn run(config: &Config) -> Result<()> {
    println!("Connecting to etcd at {}", config.address());

    let connect = || -> StoreResult<BoxedStore> {
        let client = EtcdClient::for_host(&config.host, config.port, config.timeout)?;
        Ok(Box::new(client) as BoxedStore)
    };
    run_suite(config, connect).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_letters() {
        let value = generate_value(1024);
        assert_eq!(value.len(), 1024);
        assert!(value.iter().all(u8::is_ascii_alphabetic));
    }

    #[test]
    fn suite_order_and_concurrency() {
        let config = Config {
            concurrency: 8,
            ..Default::default()
        };
        let suite = standard_suite(&config, Bytes::from_static(b"v"));

        let names: Vec<_> = suite.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Sequential Write",
                "Sequential Read",
                "Concurrent Write",
                "Concurrent Read"
            ]
        );
        let concurrency: Vec<_> = suite.iter().map(|b| b.concurrency).collect();
        assert_eq!(concurrency, [1, 1, 8, 8]);
        assert!(suite.iter().all(|b| b.count == config.operations));
    }
}
