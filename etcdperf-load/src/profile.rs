//! The task profile executed by every virtual user.
//!
//! A virtual user repeatedly picks one of three tasks, weighted by [`TaskWeights`]:
//!
//! - **put**: generates a random key and value, and `POST`s them to `/kv`. On success, the key is
//!   remembered in the user's session.
//! - **get**: reads a random key from the session.
//! - **delete**: removes a random key from the session, then deletes it.
//!
//! Sessions are private to their user, but all users share the store. Another user may therefore
//! have deleted a key already, which is why a `404` counts as success for get and delete.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use etcdperf_types::KvPair;
use rand::Rng;
use rand::distr::Alphanumeric;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Uniform};
use reqwest::StatusCode;

use crate::config::{Config, TaskWeights, WaitTime};
use crate::http::HttpRemote;

/// The tasks of the profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    /// `POST /kv`
    Put,
    /// `GET /kv/{key}`
    Get,
    /// `DELETE /kv/{key}`
    Delete,
}

impl Task {
    /// All tasks, in the order of their weights.
    pub const ALL: [Task; 3] = [Task::Put, Task::Get, Task::Delete];

    /// The name under which results of this task are reported.
    pub fn name(self) -> &'static str {
        match self {
            Task::Put => "PUT /kv",
            Task::Get => "GET /kv/[key]",
            Task::Delete => "DELETE /kv/[key]",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            Task::Put => "Failed to put key",
            Task::Get => "Failed to get key",
            Task::Delete => "Failed to delete key",
        }
    }

    /// Classifies a response status as success or failure.
    ///
    /// Any `2xx` status is a success. For get and delete, `404 Not Found` is a success as well.
    pub fn is_success(self, status: StatusCode) -> bool {
        match self {
            _ if status.is_success() => true,
            Task::Get | Task::Delete => status == StatusCode::NOT_FOUND,
            Task::Put => false,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The outcome of one executed task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request succeeded.
    Success,
    /// The request failed, with a message describing the failure.
    Failure(String),
}

/// A task that issued a request, with its response time and outcome.
#[derive(Clone, Debug)]
pub struct TaskResult {
    /// The executed task.
    pub task: Task,
    /// Time from sending the request until the response was classified.
    pub elapsed: Duration,
    /// Whether the request succeeded.
    pub outcome: Outcome,
}

/// The immutable part of the profile, shared by all virtual users.
#[derive(Debug)]
pub struct Profile {
    task_distribution: WeightedIndex<u32>,
    think_time: Uniform<f64>,
    key_prefix: String,
    key_length: usize,
    value_length: usize,
}

impl Profile {
    /// Creates the profile from the load test configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let TaskWeights { put, get, delete } = config.tasks;
        let task_distribution =
            WeightedIndex::new([put, get, delete]).context("invalid task weights")?;

        let WaitTime { min, max } = config.wait_time;
        let think_time = Uniform::new_inclusive(min.as_secs_f64(), max.as_secs_f64())
            .context("invalid wait time")?;

        Ok(Self {
            task_distribution,
            think_time,
            key_prefix: config.key_prefix.clone(),
            key_length: config.key_length,
            value_length: config.value_length,
        })
    }

    /// Picks the next task according to the task weights.
    pub fn next_task(&self, rng: &mut impl Rng) -> Task {
        Task::ALL[self.task_distribution.sample(rng)]
    }

    /// Picks the think time before the next task.
    pub fn think_time(&self, rng: &mut impl Rng) -> Duration {
        Duration::from_secs_f64(self.think_time.sample(rng))
    }

    /// Generates a random key and value.
    pub fn generate_pair(&self, rng: &mut impl Rng) -> KvPair {
        let key = format!("{}{}", self.key_prefix, random_string(rng, self.key_length));
        KvPair::new(key, random_string(rng, self.value_length))
    }
}

fn random_string(rng: &mut impl Rng, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Per-user session state: the keys this user has created and not yet deleted.
#[derive(Debug)]
pub struct Session {
    rng: SmallRng,
    keys_created: Vec<String>,
}

impl Session {
    /// Creates an empty session driven by the given RNG.
    pub fn new(rng: SmallRng) -> Self {
        Self {
            rng,
            keys_created: Vec::new(),
        }
    }

    /// The RNG of this session.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Keys created by this session.
    pub fn keys(&self) -> &[String] {
        &self.keys_created
    }

    /// Remembers a key after a successful put.
    pub fn push_key(&mut self, key: String) {
        self.keys_created.push(key);
    }

    /// Picks a random key, leaving it in the session.
    pub fn choose_key(&mut self) -> Option<String> {
        self.keys_created.choose(&mut self.rng).cloned()
    }

    /// Picks a random key and removes it from the session.
    pub fn take_key(&mut self) -> Option<String> {
        if self.keys_created.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.keys_created.len());
        Some(self.keys_created.swap_remove(index))
    }
}

/// Executes `task` for the session.
///
/// Returns `None` if the task had nothing to do, which is the case for get and delete while the
/// session has not created any keys. Such tasks are not reported.
pub async fn run_task(
    task: Task,
    profile: &Profile,
    session: &mut Session,
    remote: &HttpRemote,
) -> Option<TaskResult> {
    let start = Instant::now();
    let outcome = match task {
        Task::Put => {
            let pair = profile.generate_pair(session.rng());
            let outcome = classify(task, remote.put(&pair).await).await;
            if outcome == Outcome::Success {
                session.push_key(pair.key);
            }
            outcome
        }
        Task::Get => {
            let key = session.choose_key()?;
            classify(task, remote.get(&key).await).await
        }
        Task::Delete => {
            let key = session.take_key()?;
            classify(task, remote.delete(&key).await).await
        }
    };

    let elapsed = start.elapsed();
    if let Outcome::Failure(ref message) = outcome {
        tracing::error!("{task} failed: {message}");
    }

    Some(TaskResult {
        task,
        elapsed,
        outcome,
    })
}

async fn classify(task: Task, response: reqwest::Result<reqwest::Response>) -> Outcome {
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            let err = err.without_url();
            return Outcome::Failure(format!("{}: {err}", task.failure_prefix()));
        }
    };

    let status = response.status();
    if task.is_success(status) {
        return Outcome::Success;
    }

    let text = response.text().await.unwrap_or_default();
    Outcome::Failure(format!("{}: {status} {text}", task.failure_prefix()))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn session() -> Session {
        Session::new(SmallRng::seed_from_u64(7))
    }

    #[test]
    fn classifies_statuses() {
        assert!(Task::Put.is_success(StatusCode::OK));
        assert!(Task::Put.is_success(StatusCode::CREATED));
        assert!(!Task::Put.is_success(StatusCode::NOT_FOUND));
        assert!(!Task::Put.is_success(StatusCode::BAD_REQUEST));

        for task in [Task::Get, Task::Delete] {
            assert!(task.is_success(StatusCode::OK));
            assert!(task.is_success(StatusCode::NOT_FOUND));
            assert!(!task.is_success(StatusCode::INTERNAL_SERVER_ERROR));
            assert!(!task.is_success(StatusCode::SERVICE_UNAVAILABLE));
        }
    }

    #[test]
    fn generates_pairs() {
        let profile = Profile::new(&Config::default()).unwrap();
        let pair = profile.generate_pair(&mut SmallRng::seed_from_u64(1));

        assert!(pair.key.starts_with("perf_test_"));
        assert_eq!(pair.key.len(), "perf_test_".len() + 10);
        assert_eq!(pair.value.len(), 100);
        assert!(pair.value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn think_time_within_bounds() {
        let profile = Profile::new(&Config::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);

        for _ in 0..1000 {
            let think = profile.think_time(&mut rng);
            assert!(think >= Duration::from_millis(100));
            assert!(think <= Duration::from_millis(500));
        }
    }

    #[test]
    fn tasks_follow_weights() {
        let profile = Profile::new(&Config::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);

        let mut counts = [0usize; 3];
        for _ in 0..14_000 {
            let task = profile.next_task(&mut rng);
            counts[Task::ALL.iter().position(|t| *t == task).unwrap()] += 1;
        }

        // expected 3000 / 10000 / 1000
        assert!((2500..3500).contains(&counts[0]), "{counts:?}");
        assert!((9400..10600).contains(&counts[1]), "{counts:?}");
        assert!((750..1250).contains(&counts[2]), "{counts:?}");
    }

    #[test]
    fn zero_weight_disables_task() {
        let config = Config {
            tasks: TaskWeights {
                put: 1,
                get: 0,
                delete: 0,
            },
            ..Default::default()
        };
        let profile = Profile::new(&config).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);

        assert!((0..100).all(|_| profile.next_task(&mut rng) == Task::Put));
    }

    #[test]
    fn take_key_removes_from_session() {
        let mut session = session();
        assert_eq!(session.take_key(), None);
        assert_eq!(session.choose_key(), None);

        session.push_key("a".into());
        session.push_key("b".into());

        let chosen = session.choose_key().unwrap();
        assert_eq!(session.keys().len(), 2);
        assert!(session.keys().contains(&chosen));

        let taken = session.take_key().unwrap();
        assert_eq!(session.keys().len(), 1);
        assert!(!session.keys().contains(&taken));
    }

    #[tokio::test]
    async fn get_and_delete_without_keys_do_nothing() {
        let profile = Profile::new(&Config::default()).unwrap();
        // nothing listens here, any request would fail
        let remote = HttpRemote::new("http://127.0.0.1:9", None).unwrap();
        let mut session = session();

        assert!(run_task(Task::Get, &profile, &mut session, &remote).await.is_none());
        assert!(run_task(Task::Delete, &profile, &mut session, &remote).await.is_none());
    }

    #[tokio::test]
    async fn transport_errors_are_failures() {
        let profile = Profile::new(&Config::default()).unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let remote = HttpRemote::new(&format!("http://127.0.0.1:{port}"), None).unwrap();
        let mut session = session();

        let result = run_task(Task::Put, &profile, &mut session, &remote)
            .await
            .unwrap();
        assert!(matches!(
            result.outcome,
            Outcome::Failure(ref m) if m.starts_with("Failed to put key")
        ));
        assert!(session.keys().is_empty());
    }
}
