//! Shutdown coordination for the plugin server.
//!
//! A [`ShutdownTrigger`] is fired once, either by a caller or by the
//! [`SignalWatcher`](super::signals::SignalWatcher). The [`ShutdownCoordinator`]
//! waits for it and then runs its [`ShutdownTask`]s front to back, stopping at
//! the first failure. The result is reported once through [`ShutdownHandle::wait`].

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{BoxError, ServerError};
use crate::observability::metrics;

/// Where a shutdown request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOrigin {
    /// Programmatic stop requested by the embedding code.
    External,
    /// OS termination signal, by name (e.g. `SIGTERM`).
    Signal(&'static str),
}

impl fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerOrigin::External => write!(f, "external"),
            TriggerOrigin::Signal(name) => write!(f, "signal {}", name),
        }
    }
}

/// Single-fire shutdown trigger.
///
/// Cloning is cheap; every clone refers to the same trigger. Only the first
/// [`fire`](Self::fire) takes effect, later ones are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<TriggerOrigin>>>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the trigger. Returns `true` only for the call that consumed it.
    pub fn fire(&self, origin: TriggerOrigin) -> bool {
        let mut origin = Some(origin);
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = origin.take();
            true
        })
    }

    /// Whether the trigger has been consumed.
    pub fn is_fired(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The origin that consumed the trigger, if any.
    pub fn origin(&self) -> Option<TriggerOrigin> {
        self.tx.borrow().clone()
    }

    /// Resolve once the trigger has fired, returning the winning origin.
    pub async fn fired(&self) -> TriggerOrigin {
        let mut rx = self.tx.subscribe();
        let origin = match rx.wait_for(Option::is_some).await {
            Ok(state) => state.clone(),
            Err(_) => None,
        };
        if let Some(origin) = origin {
            return origin;
        }
        // The sender lives as long as `self`, so the channel cannot close here.
        std::future::pending().await
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

type TaskFuture = BoxFuture<'static, Result<(), BoxError>>;

/// One named cleanup step.
pub struct ShutdownTask {
    name: String,
    run: Box<dyn FnOnce() -> TaskFuture + Send>,
}

impl ShutdownTask {
    /// Wrap an async closure as a shutdown task.
    pub fn new<F, Fut, E>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            run: Box::new(move || {
                async move {
                    let result: Result<(), BoxError> = f().await.map_err(Into::into);
                    result
                }
                .boxed()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ShutdownTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownTask").field("name", &self.name).finish()
    }
}

/// Terminal result of a server's lifetime.
#[derive(Debug)]
pub enum TerminationOutcome {
    /// Every shutdown task succeeded.
    Clean { origin: TriggerOrigin },
    /// A task or the listener failed.
    Failed(ServerError),
}

impl TerminationOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, TerminationOutcome::Clean { .. })
    }

    pub fn into_result(self) -> Result<TriggerOrigin, ServerError> {
        match self {
            TerminationOutcome::Clean { origin } => Ok(origin),
            TerminationOutcome::Failed(err) => Err(err),
        }
    }
}

/// Ordered list of shutdown tasks, run once when the trigger fires.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    tasks: Vec<ShutdownTask>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. Tasks run in registration order.
    pub fn register(&mut self, task: ShutdownTask) -> &mut Self {
        self.tasks.push(task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn the coordinator.
    ///
    /// `fault` carries an unexpected listener failure. If it arrives before the
    /// trigger fires, the outcome is that failure and no task runs.
    pub fn start(
        self,
        trigger: ShutdownTrigger,
        fault: Option<oneshot::Receiver<ServerError>>,
    ) -> ShutdownHandle {
        let join = tokio::spawn(self.run(trigger, fault));
        ShutdownHandle { join }
    }

    async fn run(
        self,
        trigger: ShutdownTrigger,
        fault: Option<oneshot::Receiver<ServerError>>,
    ) -> TerminationOutcome {
        let fault = async move {
            match fault {
                Some(rx) => match rx.await {
                    Ok(err) => err,
                    // Listener finished without a fault.
                    Err(_) => std::future::pending().await,
                },
                None => std::future::pending().await,
            }
        };

        let origin = tokio::select! {
            biased;
            origin = trigger.fired() => origin,
            err = fault => {
                tracing::error!(error = %err, "Listener failed before shutdown was requested");
                return TerminationOutcome::Failed(err);
            }
        };

        tracing::info!(origin = %origin, tasks = self.tasks.len(), "Shutdown sequence started");

        for task in self.tasks {
            let ShutdownTask { name, run } = task;
            tracing::debug!(task = %name, "Running shutdown task");

            let result = match AssertUnwindSafe(run()).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(format!("shutdown task `{}` panicked", name).into()),
            };

            if let Err(source) = result {
                metrics::record_shutdown_task("error");
                let err = match source.downcast::<ServerError>() {
                    Ok(server_err) => *server_err,
                    Err(source) => ServerError::ShutdownTask { name, source },
                };
                tracing::error!(error = %err, "Shutdown sequence aborted");
                return TerminationOutcome::Failed(err);
            }
            metrics::record_shutdown_task("ok");
        }

        tracing::info!(origin = %origin, "Shutdown sequence complete");
        TerminationOutcome::Clean { origin }
    }
}

/// Handle to a running coordinator.
#[derive(Debug)]
pub struct ShutdownHandle {
    join: JoinHandle<TerminationOutcome>,
}

impl ShutdownHandle {
    /// Wait for the terminal outcome. Consumes the handle, so the outcome is read once.
    pub async fn wait(self) -> TerminationOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(join_err) => TerminationOutcome::Failed(ServerError::ShutdownTask {
                name: "shutdown coordinator".to_string(),
                source: Box::new(join_err),
            }),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn recording_task(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> ShutdownTask {
        let log = log.clone();
        ShutdownTask::new(name, move || async move {
            log.lock().unwrap().push(name);
            Ok::<_, BoxError>(())
        })
    }

    fn failing_task(name: &'static str) -> ShutdownTask {
        ShutdownTask::new(name, || async { Err::<(), _>("disk full") })
    }

    #[test]
    fn trigger_fires_once() {
        let trigger = ShutdownTrigger::new();
        assert!(!trigger.is_fired());

        assert!(trigger.fire(TriggerOrigin::External));
        assert!(!trigger.fire(TriggerOrigin::Signal("SIGTERM")));
        assert!(!trigger.clone().fire(TriggerOrigin::External));

        assert_eq!(trigger.origin(), Some(TriggerOrigin::External));
    }

    #[tokio::test]
    async fn fired_resolves_for_late_waiters() {
        let trigger = ShutdownTrigger::new();
        trigger.fire(TriggerOrigin::Signal("SIGINT"));

        let origin = tokio::time::timeout(Duration::from_secs(1), trigger.fired())
            .await
            .unwrap();
        assert_eq!(origin, TriggerOrigin::Signal("SIGINT"));
    }

    #[tokio::test]
    async fn tasks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = ShutdownCoordinator::new();
        coordinator
            .register(recording_task("first", &log))
            .register(recording_task("second", &log))
            .register(recording_task("third", &log));

        let trigger = ShutdownTrigger::new();
        let handle = coordinator.start(trigger.clone(), None);
        assert!(log.lock().unwrap().is_empty());

        trigger.fire(TriggerOrigin::External);
        let outcome = handle.wait().await;

        assert!(outcome.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_task_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = ShutdownCoordinator::new();
        coordinator
            .register(recording_task("before", &log))
            .register(failing_task("flush"))
            .register(recording_task("after", &log));

        let trigger = ShutdownTrigger::new();
        let handle = coordinator.start(trigger.clone(), None);
        trigger.fire(TriggerOrigin::External);

        match handle.wait().await {
            TerminationOutcome::Failed(ServerError::ShutdownTask { name, source }) => {
                assert_eq!(name, "flush");
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn concurrent_triggers_run_the_sequence_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(ShutdownTask::new("count", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(())
        }));

        let trigger = ShutdownTrigger::new();
        let handle = coordinator.start(trigger.clone(), None);

        let mut racers = Vec::new();
        for i in 0..16 {
            let trigger = trigger.clone();
            racers.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    trigger.fire(TriggerOrigin::External)
                } else {
                    trigger.fire(TriggerOrigin::Signal("SIGTERM"))
                }
            }));
        }

        let mut winners = 0;
        for racer in racers {
            if racer.await.unwrap() {
                winners += 1;
            }
        }

        assert!(handle.wait().await.is_clean());
        assert_eq!(winners, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_fault_before_trigger_fails_without_running_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(recording_task("cleanup", &log));

        let (fault_tx, fault_rx) = oneshot::channel();
        let handle = coordinator.start(ShutdownTrigger::new(), Some(fault_rx));

        fault_tx
            .send(ServerError::Transport {
                path: "/tmp/plugin.sock".into(),
                source: Arc::new(std::io::Error::other("accept failed")),
            })
            .unwrap();

        let outcome = handle.wait().await;
        assert!(matches!(outcome, TerminationOutcome::Failed(ServerError::Transport { .. })));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_fault_sender_is_not_a_failure() {
        let (fault_tx, fault_rx) = oneshot::channel::<ServerError>();
        let trigger = ShutdownTrigger::new();
        let handle = ShutdownCoordinator::new().start(trigger.clone(), Some(fault_rx));

        drop(fault_tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        trigger.fire(TriggerOrigin::External);
        assert!(handle.wait().await.is_clean());
    }

    #[tokio::test]
    async fn server_errors_from_tasks_are_passed_through() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(ShutdownTask::new("close listener", || async {
            Err::<(), _>(ServerError::Transport {
                path: "/tmp/plugin.sock".into(),
                source: Arc::new(std::io::Error::other("reset")),
            })
        }));

        let trigger = ShutdownTrigger::new();
        let handle = coordinator.start(trigger.clone(), None);
        trigger.fire(TriggerOrigin::External);

        assert!(matches!(
            handle.wait().await,
            TerminationOutcome::Failed(ServerError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(ShutdownTask::new("explode", || async {
            if true {
                panic!("boom");
            }
            Ok::<_, BoxError>(())
        }));

        let trigger = ShutdownTrigger::new();
        let handle = coordinator.start(trigger.clone(), None);
        trigger.fire(TriggerOrigin::External);

        match handle.wait().await {
            TerminationOutcome::Failed(ServerError::ShutdownTask { name, .. }) => {
                assert_eq!(name, "explode")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
