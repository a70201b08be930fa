use std::time::Duration;

use etcdperf_load::config::{TaskWeights, WaitTime};
use etcdperf_load::http::HttpRemote;
use etcdperf_load::profile::{Outcome, Profile, Session, run_task};
use etcdperf_load::{Config, LoadTest, Task};
use etcdperf_test::TestServer;
use indicatif::ProgressBar;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio_util::sync::CancellationToken;

fn config(host: String) -> Config {
    Config {
        host,
        users: 4,
        spawn_rate: 100.0,
        run_time: Duration::from_millis(1500),
        wait_time: WaitTime {
            min: Duration::from_millis(5),
            max: Duration::from_millis(10),
        },
        seed: Some(42),
        ..Default::default()
    }
}

async fn run(config: &Config) -> etcdperf_load::LoadTestResult {
    config.validate().unwrap();
    LoadTest::new(config)
        .unwrap()
        .run(CancellationToken::new(), &ProgressBar::hidden())
        .await
}

#[tokio::test]
async fn runs_against_gateway() {
    etcdperf_test::tracing::init();
    let server = TestServer::new().await;

    let result = run(&config(server.host())).await;

    assert!(!result.interrupted);
    assert_eq!(result.users, 4);
    assert!(result.elapsed >= Duration::from_millis(1500));

    let metrics = &result.metrics;
    let puts = metrics.tasks[&Task::Put].requests;
    assert!(puts > 0);
    assert!(metrics.tasks[&Task::Get].requests > 0);
    assert!(metrics.failures.is_empty(), "{:?}", metrics.failures);
    assert_eq!(metrics.total().failures, 0);

    // users only delete keys they have created before
    let deletes = metrics.tasks.get(&Task::Delete).map_or(0, |s| s.requests);
    assert!(deletes <= puts);
    assert!(!server.store().is_empty());
}

#[tokio::test]
async fn counts_failed_puts() {
    let server = TestServer::new().await;
    server.store().set_unavailable(true);

    let result = run(&config(server.host())).await;
    let metrics = &result.metrics;

    let puts = &metrics.tasks[&Task::Put];
    assert!(puts.requests > 0);
    assert_eq!(puts.failures, puts.requests);
    // without a successful put there is nothing to read or delete
    assert!(!metrics.tasks.contains_key(&Task::Get));
    assert!(!metrics.tasks.contains_key(&Task::Delete));

    assert_eq!(metrics.failures.len(), 1);
    let ((task, message), count) = metrics.failures.iter().next().unwrap();
    assert_eq!(*task, Task::Put);
    assert!(message.starts_with("Failed to put key: 503"), "{message}");
    assert_eq!(*count, puts.failures);
}

#[tokio::test]
async fn tolerates_missing_keys() {
    let server = TestServer::new().await;
    let profile = Profile::new(&Config::default()).unwrap();
    let remote = HttpRemote::new(&server.host(), None).unwrap();

    let mut session = Session::new(SmallRng::seed_from_u64(1));
    session.push_key("perf_test_gone".into());
    let result = run_task(Task::Get, &profile, &mut session, &remote)
        .await
        .unwrap();
    assert_eq!(result.outcome, Outcome::Success);

    let result = run_task(Task::Delete, &profile, &mut session, &remote)
        .await
        .unwrap();
    assert_eq!(result.outcome, Outcome::Success);
    assert!(session.keys().is_empty());
}

#[tokio::test]
async fn mixed_tasks_succeed() {
    let server = TestServer::new().await;

    let config = Config {
        users: 8,
        tasks: TaskWeights {
            put: 1,
            get: 1,
            delete: 1,
        },
        ..config(server.host())
    };
    let result = run(&config).await;

    assert!(result.metrics.failures.is_empty());
    assert!(result.metrics.requests() > 0);
}

#[tokio::test]
async fn stops_when_cancelled() {
    let server = TestServer::new().await;
    let config = Config {
        run_time: Duration::from_secs(600),
        ..config(server.host())
    };
    let load_test = LoadTest::new(&config).unwrap();

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            shutdown.cancel();
        }
    });

    let result = load_test.run(shutdown, &ProgressBar::hidden()).await;
    assert!(result.interrupted);
    assert!(result.elapsed < Duration::from_secs(10));
}

#[tokio::test]
async fn reports_unreachable_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = Config {
        run_time: Duration::from_millis(500),
        ..config(format!("http://127.0.0.1:{port}"))
    };
    let result = run(&config).await;

    let puts = &result.metrics.tasks[&Task::Put];
    assert!(puts.requests > 0);
    assert_eq!(puts.failures, puts.requests);
}
