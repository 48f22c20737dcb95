// SPDX-License-Identifier: MPL-2.0

//! Unique background work.
//!
//! Work is identified by name. At most one instance per name is pending at a
//! time; what happens when a second request arrives is up to the
//! `ExistingWorkPolicy`. Work can be gated on connectivity, retried with
//! exponential backoff, and repeated on a fixed period.

use crate::sync::NetworkMonitor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    /// Transient failure, try again after a backoff delay
    Retry,
    /// Permanent failure for this run
    Failure,
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self) -> WorkResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingWorkPolicy {
    /// Leave pending work alone; the new request is dropped
    Keep,
    /// Cancel pending work and schedule the new request
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub network_required: bool,
}

/// Exponential backoff for `WorkResult::Retry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_delay: Duration,
    /// Runs allowed per scheduled execution, counting the first
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(30),
            max_delay: Duration::from_secs(5 * 60),
            max_attempts: 5,
        }
    }
}

impl Backoff {
    /// Delay after the `attempt`-th failed run (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkRequest {
    pub constraints: Constraints,
    /// Repeat every `period` after each execution; `None` runs once
    pub period: Option<Duration>,
    pub backoff: Backoff,
}

impl WorkRequest {
    pub fn one_time() -> Self {
        Self::default()
    }

    pub fn periodic(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    pub fn require_network(mut self) -> Self {
        self.constraints.network_required = true;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Enqueued,
    /// Waiting for its constraints to be met
    Blocked,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl WorkState {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            WorkState::Succeeded | WorkState::Failed | WorkState::Cancelled
        )
    }
}

/// Observer for one scheduled execution
#[derive(Clone)]
pub struct WorkHandle {
    name: String,
    state: watch::Receiver<WorkState>,
}

impl WorkHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkState {
        *self.state.borrow()
    }

    /// Wait until the work reaches a final state
    pub async fn finished(&mut self) -> WorkState {
        match self.state.wait_for(|s| s.is_finished()).await {
            Ok(state) => *state,
            Err(_) => WorkState::Cancelled,
        }
    }
}

/// Result of `enqueue_unique`
pub enum Enqueued {
    /// A new execution was scheduled
    Scheduled(WorkHandle),
    /// Work with this name was already pending and was kept
    Kept(WorkHandle),
}

impl Enqueued {
    pub fn was_scheduled(&self) -> bool {
        matches!(self, Enqueued::Scheduled(_))
    }

    pub fn into_handle(self) -> WorkHandle {
        match self {
            Enqueued::Scheduled(handle) | Enqueued::Kept(handle) => handle,
        }
    }
}

struct UniqueWork {
    state: Arc<watch::Sender<WorkState>>,
    task: JoinHandle<()>,
}

/// Schedules named background work on the current Tokio runtime
#[derive(Clone)]
pub struct SyncScheduler {
    network: NetworkMonitor,
    work: Arc<Mutex<HashMap<String, UniqueWork>>>,
}

impl SyncScheduler {
    pub fn new(network: NetworkMonitor) -> Self {
        Self {
            network,
            work: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Schedule `worker` under `name` unless the policy says otherwise.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn enqueue_unique(
        &self,
        name: &str,
        policy: ExistingWorkPolicy,
        request: WorkRequest,
        worker: Arc<dyn Worker>,
    ) -> Enqueued {
        let mut work = self.work.lock().expect("scheduler lock poisoned");

        let pending = work
            .get(name)
            .filter(|existing| !existing.state.borrow().is_finished());
        if let Some(existing) = pending {
            match policy {
                ExistingWorkPolicy::Keep => {
                    debug!(name, "work already pending, keeping it");
                    return Enqueued::Kept(WorkHandle {
                        name: name.to_string(),
                        state: existing.state.subscribe(),
                    });
                }
                ExistingWorkPolicy::Replace => {
                    info!(name, "replacing pending work");
                    existing.task.abort();
                    existing.state.send_replace(WorkState::Cancelled);
                }
            }
        }

        let state = Arc::new(watch::Sender::new(WorkState::Enqueued));
        let handle = WorkHandle {
            name: name.to_string(),
            state: state.subscribe(),
        };
        let task = tokio::spawn(drive(
            name.to_string(),
            request,
            worker,
            self.network.clone(),
            Arc::clone(&state),
        ));
        work.insert(name.to_string(), UniqueWork { state, task });
        debug!(name, "work scheduled");

        Enqueued::Scheduled(handle)
    }

    /// Cancel work by name. Returns whether anything was pending.
    pub fn cancel(&self, name: &str) -> bool {
        let mut work = self.work.lock().expect("scheduler lock poisoned");
        let Some(existing) = work.remove(name) else {
            return false;
        };
        let pending = !existing.state.borrow().is_finished();
        existing.task.abort();
        if pending {
            existing.state.send_replace(WorkState::Cancelled);
            info!(name, "work cancelled");
        }
        pending
    }

    pub fn cancel_all(&self) {
        let names: Vec<String> = {
            let work = self.work.lock().expect("scheduler lock poisoned");
            work.keys().cloned().collect()
        };
        for name in names {
            self.cancel(&name);
        }
    }

    pub fn state(&self, name: &str) -> Option<WorkState> {
        let work = self.work.lock().expect("scheduler lock poisoned");
        work.get(name).map(|w| *w.state.borrow())
    }
}

/// Publish a state change unless the work was cancelled underneath us
fn publish(state: &watch::Sender<WorkState>, next: WorkState) {
    state.send_if_modified(|current| {
        if *current == WorkState::Cancelled || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

async fn drive(
    name: String,
    request: WorkRequest,
    worker: Arc<dyn Worker>,
    network: NetworkMonitor,
    state: Arc<watch::Sender<WorkState>>,
) {
    loop {
        let outcome = run_with_retries(&name, &request, worker.as_ref(), &network, &state).await;

        let Some(period) = request.period else {
            publish(&state, outcome);
            return;
        };
        debug!(name = %name, ?outcome, ?period, "periodic work run finished");
        publish(&state, WorkState::Enqueued);
        tokio::time::sleep(period).await;
    }
}

async fn run_with_retries(
    name: &str,
    request: &WorkRequest,
    worker: &dyn Worker,
    network: &NetworkMonitor,
    state: &watch::Sender<WorkState>,
) -> WorkState {
    let mut attempt = 0;
    loop {
        if request.constraints.network_required && !network.is_online() {
            publish(state, WorkState::Blocked);
            debug!(name, "waiting for network");
            network.wait_online().await;
        }

        publish(state, WorkState::Running);
        attempt += 1;
        match worker.run().await {
            WorkResult::Success => return WorkState::Succeeded,
            WorkResult::Failure => {
                warn!(name, attempt, "work failed");
                return WorkState::Failed;
            }
            WorkResult::Retry if attempt < request.backoff.max_attempts => {
                let delay = request.backoff.delay_for(attempt);
                warn!(name, attempt, ?delay, "work will retry");
                publish(state, WorkState::Enqueued);
                tokio::time::sleep(delay).await;
            }
            WorkResult::Retry => {
                warn!(name, attempt, "work gave up after retries");
                return WorkState::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::timeout;

    struct Counting {
        runs: AtomicU32,
        results: Vec<WorkResult>,
    }

    impl Counting {
        fn new(results: Vec<WorkResult>) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicU32::new(0),
                results,
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Worker for Counting {
        async fn run(&self) -> WorkResult {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) as usize;
            self.results
                .get(n)
                .copied()
                .unwrap_or(WorkResult::Success)
        }
    }

    fn fast_backoff() -> Backoff {
        Backoff {
            initial: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn keep_policy_runs_pending_work_once() {
        let network = NetworkMonitor::new(false);
        let scheduler = SyncScheduler::new(network.clone());
        let worker = Counting::new(vec![]);
        let request = WorkRequest::one_time().require_network();

        let first = scheduler.enqueue_unique(
            "feed-sync",
            ExistingWorkPolicy::Keep,
            request.clone(),
            worker.clone(),
        );
        let second = scheduler.enqueue_unique(
            "feed-sync",
            ExistingWorkPolicy::Keep,
            request,
            worker.clone(),
        );
        assert!(first.was_scheduled());
        assert!(!second.was_scheduled());

        network.set_online(true);
        let mut handle = first.into_handle();
        let state = timeout(Duration::from_secs(5), handle.finished())
            .await
            .unwrap();
        assert_eq!(state, WorkState::Succeeded);

        let mut kept = second.into_handle();
        assert_eq!(
            timeout(Duration::from_secs(5), kept.finished()).await.unwrap(),
            WorkState::Succeeded
        );
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test]
    async fn finished_work_can_be_enqueued_again() {
        let scheduler = SyncScheduler::new(NetworkMonitor::new(true));
        let worker = Counting::new(vec![]);

        for _ in 0..2 {
            let enqueued = scheduler.enqueue_unique(
                "once",
                ExistingWorkPolicy::Keep,
                WorkRequest::one_time(),
                worker.clone(),
            );
            assert!(enqueued.was_scheduled());
            let mut handle = enqueued.into_handle();
            timeout(Duration::from_secs(5), handle.finished())
                .await
                .unwrap();
        }
        assert_eq!(worker.runs(), 2);
    }

    #[tokio::test]
    async fn replace_policy_cancels_pending_work() {
        let network = NetworkMonitor::new(false);
        let scheduler = SyncScheduler::new(network.clone());
        let old = Counting::new(vec![]);
        let new = Counting::new(vec![]);
        let request = WorkRequest::one_time().require_network();

        let mut old_handle = scheduler
            .enqueue_unique("job", ExistingWorkPolicy::Keep, request.clone(), old.clone())
            .into_handle();
        let replaced =
            scheduler.enqueue_unique("job", ExistingWorkPolicy::Replace, request, new.clone());
        assert!(replaced.was_scheduled());
        assert_eq!(old_handle.finished().await, WorkState::Cancelled);

        network.set_online(true);
        let mut handle = replaced.into_handle();
        assert_eq!(
            timeout(Duration::from_secs(5), handle.finished()).await.unwrap(),
            WorkState::Succeeded
        );
        assert_eq!(old.runs(), 0);
        assert_eq!(new.runs(), 1);
    }

    #[tokio::test]
    async fn retry_uses_backoff_then_succeeds() {
        let scheduler = SyncScheduler::new(NetworkMonitor::new(true));
        let worker = Counting::new(vec![WorkResult::Retry, WorkResult::Retry]);
        let mut handle = scheduler
            .enqueue_unique(
                "flaky",
                ExistingWorkPolicy::Keep,
                WorkRequest::one_time().with_backoff(fast_backoff()),
                worker.clone(),
            )
            .into_handle();

        assert_eq!(
            timeout(Duration::from_secs(5), handle.finished()).await.unwrap(),
            WorkState::Succeeded
        );
        assert_eq!(worker.runs(), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let scheduler = SyncScheduler::new(NetworkMonitor::new(true));
        let worker = Counting::new(vec![WorkResult::Retry; 10]);
        let mut handle = scheduler
            .enqueue_unique(
                "broken",
                ExistingWorkPolicy::Keep,
                WorkRequest::one_time().with_backoff(fast_backoff()),
                worker.clone(),
            )
            .into_handle();

        assert_eq!(
            timeout(Duration::from_secs(5), handle.finished()).await.unwrap(),
            WorkState::Failed
        );
        assert_eq!(worker.runs(), 3);
    }

    #[tokio::test]
    async fn periodic_work_repeats_until_cancelled() {
        let scheduler = SyncScheduler::new(NetworkMonitor::new(true));
        let worker = Counting::new(vec![]);
        let mut handle = scheduler
            .enqueue_unique(
                "tick",
                ExistingWorkPolicy::Keep,
                WorkRequest::periodic(Duration::from_millis(10)),
                worker.clone(),
            )
            .into_handle();

        timeout(Duration::from_secs(5), async {
            while worker.runs() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(scheduler.cancel("tick"));
        assert_eq!(handle.finished().await, WorkState::Cancelled);
        assert!(!scheduler.cancel("tick"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(40), Duration::from_secs(5));
    }
}
