// Cooperative cancellation and start/stop lifecycle for background workers.
//
// A ShutdownTrigger flips a watch channel once; every cloned Shutdown observes it. Workers
// race their store and publish calls against `cancelled()` so a stop request is honored at
// the next suspension point. WorkerHandle owns the trigger and the spawned task.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace never fails, even with no receivers left.
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered, or when the trigger is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// A running background worker. Dropping the handle without `stop` leaves the task running
/// until its trigger is dropped, which the worker also treats as shutdown.
pub struct WorkerHandle {
    name: String,
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn spawn<F, Fut>(name: impl Into<String>, worker: F) -> Self
    where
        F: FnOnce(Shutdown) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (trigger, shutdown) = channel();
        let task = tokio::spawn(worker(shutdown));
        Self {
            name: name.into(),
            trigger,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals shutdown and waits for the worker to return.
    pub async fn stop(self) {
        self.trigger.trigger();
        if let Err(error) = self.task.await {
            tracing::error!(worker = %self.name, %error, "worker task ended abnormally");
        }
    }
}
