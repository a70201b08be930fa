//! Drives virtual users against the gateway for the configured run time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::ProgressBar;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::http::HttpRemote;
use crate::metrics::Metrics;
use crate::profile::{Profile, Session, run_task};

/// Shortest interval between two ramp-up steps. Faster spawn rates start several users per step.
const MIN_SPAWN_INTERVAL: Duration = Duration::from_millis(10);

/// Interval at which the progress bar is refreshed.
const STATUS_INTERVAL: Duration = Duration::from_millis(500);

/// A configured load test, ready to run.
#[derive(Debug)]
pub struct LoadTest {
    remote: HttpRemote,
    profile: Arc<Profile>,
    users: usize,
    spawn_rate: f64,
    run_time: Duration,
    seed: Option<u64>,
}

/// The outcome of a finished load test.
#[derive(Debug)]
pub struct LoadTestResult {
    /// Statistics of all recorded requests.
    pub metrics: Metrics,
    /// Wall-clock time from starting the first user until all users stopped.
    pub elapsed: Duration,
    /// Number of users that were started.
    pub users: usize,
    /// Whether the test was stopped before its run time elapsed.
    pub interrupted: bool,
}

impl LoadTest {
    /// Creates a load test from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            remote: HttpRemote::new(&config.host, config.request_timeout)?,
            profile: Arc::new(Profile::new(config)?),
            users: config.users,
            spawn_rate: config.spawn_rate,
            run_time: config.run_time,
            seed: config.seed,
        })
    }

    /// Number of users that should be running `elapsed` after the start of the ramp-up.
    ///
    /// The first user starts immediately.
    pub fn target_users(&self, elapsed: Duration) -> usize {
        let spawned = (elapsed.as_secs_f64() * self.spawn_rate).floor() as usize;
        spawned.saturating_add(1).min(self.users)
    }

    fn spawn_interval(&self) -> Duration {
        // no user is spawned after the run time, so longer intervals are pointless
        let longest = self.run_time.max(MIN_SPAWN_INTERVAL);
        Duration::try_from_secs_f64(1.0 / self.spawn_rate)
            .unwrap_or(longest)
            .clamp(MIN_SPAWN_INTERVAL, longest)
    }

    fn user_rng(&self, id: usize) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// Runs the load test until its run time has elapsed or `shutdown` is cancelled.
    ///
    /// Users are ramped up at the configured spawn rate. Once stopped, in-flight requests of all
    /// users are abandoned and not recorded.
    pub async fn run(&self, shutdown: CancellationToken, progress: &ProgressBar) -> LoadTestResult {
        tracing::info!(
            host = %self.remote.kv_url(None),
            users = self.users,
            spawn_rate = self.spawn_rate,
            run_time = ?self.run_time,
            "Starting load test"
        );

        let stop = shutdown.child_token();
        let metrics = Arc::new(Mutex::new(Metrics::default()));
        let mut users: Vec<JoinHandle<()>> = Vec::with_capacity(self.users);

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.run_time;

        let mut spawn_ticker = tokio::time::interval(self.spawn_interval());
        spawn_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut status_ticker = tokio::time::interval(STATUS_INTERVAL);

        // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let interrupted = loop {
            tokio::select! {
                _ = stop.cancelled() => break true,
                _ = &mut sleep => break false,
                _ = spawn_ticker.tick(), if users.len() < self.users => {
                    let target = self.target_users(start.elapsed());
                    while users.len() < target {
                        let id = users.len();
                        users.push(self.spawn_user(id, Arc::clone(&metrics), stop.clone()));
                    }
                    if users.len() == self.users {
                        tracing::info!(users = self.users, "All users spawned");
                    }
                }
                _ = status_ticker.tick() => {
                    let requests = lock(&metrics).requests();
                    progress.set_message(format!(
                        "Running load test: {}/{} users, {requests} requests",
                        users.len(),
                        self.users,
                    ));
                }
            }
        };

        if interrupted {
            tracing::info!("Load test interrupted");
        }

        stop.cancel();
        let spawned = users.len();
        for (id, result) in futures::future::join_all(users).await.into_iter().enumerate() {
            if let Err(err) = result {
                tracing::error!(
                    user = id,
                    error = &err as &dyn std::error::Error,
                    "user did not finish"
                );
            }
        }
        let elapsed = start.elapsed();

        let metrics = std::mem::take(&mut *lock(&metrics));
        tracing::debug!(requests = metrics.requests(), ?elapsed, "Finished load test");

        LoadTestResult {
            metrics,
            elapsed,
            users: spawned,
            interrupted,
        }
    }

    fn spawn_user(
        &self,
        id: usize,
        metrics: Arc<Mutex<Metrics>>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        tracing::debug!(user = id, "Spawning user");
        let user = User {
            profile: Arc::clone(&self.profile),
            remote: self.remote.clone(),
            session: Session::new(self.user_rng(id)),
            metrics,
        };
        tokio::spawn(user.run(stop))
    }
}

/// A single virtual user.
struct User {
    profile: Arc<Profile>,
    remote: HttpRemote,
    session: Session,
    metrics: Arc<Mutex<Metrics>>,
}

impl User {
    async fn run(mut self, stop: CancellationToken) {
        loop {
            let task = self.profile.next_task(self.session.rng());
            let result = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                result = run_task(task, &self.profile, &mut self.session, &self.remote) => result,
            };
            if let Some(result) = result {
                lock(&self.metrics).record(result);
            }

            let think_time = self.profile.think_time(self.session.rng());
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                _ = tokio::time::sleep(think_time) => {}
            }
        }
    }
}

fn lock(metrics: &Mutex<Metrics>) -> std::sync::MutexGuard<'_, Metrics> {
    metrics.lock().unwrap_or_else(PoisonError::into_inner)
}
