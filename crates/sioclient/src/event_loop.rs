//! A serialized execution loop.
//!
//! An [`EventLoop`] owns a state `S` inside a tokio task and runs the tasks submitted through its
//! [`LoopHandle`]s one at a time, in submission order. Every state mutation of a manager and its
//! sockets goes through such a loop, so none of them needs a lock.
use tokio::sync::{mpsc, oneshot};

type Task<S> = Box<dyn FnOnce(&mut S, &LoopHandle<S>) + Send + 'static>;

enum Command<S> {
    Run(Task<S>),
    Shutdown,
}

/// The loop was shut down before the task could run.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("event loop closed")]
pub struct LoopClosed;

/// Spawns serialized execution loops.
#[derive(Debug)]
pub struct EventLoop;

impl EventLoop {
    /// Spawn a loop owning `state` on the current tokio runtime.
    ///
    /// The loop stops when every [`LoopHandle`] is dropped or when [`LoopHandle::shutdown`]
    /// is called.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn spawn<S: Send + 'static>(state: S) -> LoopHandle<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let weak = tx.downgrade();
        tokio::spawn(run(state, rx, weak));
        LoopHandle { tx }
    }
}

async fn run<S: Send + 'static>(
    mut state: S,
    mut rx: mpsc::UnboundedReceiver<Command<S>>,
    weak: mpsc::WeakUnboundedSender<Command<S>>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Run(task) => {
                // Tasks left in the queue after the last handle was dropped still run,
                // with a handle that cannot submit anything.
                let handle = match weak.upgrade() {
                    Some(tx) => LoopHandle { tx },
                    None => LoopHandle::detached(),
                };
                task(&mut state, &handle);
            }
            Command::Shutdown => {
                tracing::trace!("event loop shutdown");
                rx.close();
                break;
            }
        }
    }
}

/// A handle to submit tasks to an [`EventLoop`].
pub struct LoopHandle<S> {
    tx: mpsc::UnboundedSender<Command<S>>,
}

impl<S> Clone for LoopHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> std::fmt::Debug for LoopHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<S: Send + 'static> LoopHandle<S> {
    /// A handle to no loop: every submitted task is dropped.
    pub(crate) fn detached() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Enqueue a task and return immediately.
    /// Returns `false` if the loop is already closed, in which case the task is dropped.
    pub fn submit(&self, task: impl FnOnce(&mut S, &LoopHandle<S>) + Send + 'static) -> bool {
        let res = self.tx.send(Command::Run(Box::new(task))).is_ok();
        if !res {
            tracing::trace!("task submitted to a closed event loop");
        }
        res
    }

    /// Enqueue a task and wait for its result.
    pub async fn call<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut S, &LoopHandle<S>) -> R + Send + 'static,
    ) -> Result<R, LoopClosed> {
        let (tx, rx) = oneshot::channel();
        self.submit(move |state, handle| {
            tx.send(task(state, handle)).ok();
        });
        rx.await.map_err(|_| LoopClosed)
    }

    /// Stop the loop once the tasks already submitted have run.
    pub fn shutdown(&self) {
        self.tx.send(Command::Shutdown).ok();
    }

    /// Check if the loop is stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let handle = EventLoop::spawn(Vec::<i32>::new());
        for i in 0..100 {
            handle.submit(move |state, _| state.push(i));
        }
        let state = handle.call(|state, _| state.clone()).await.unwrap();
        assert_eq!(state, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn tasks_can_submit_tasks() {
        let handle = EventLoop::spawn(Vec::<&'static str>::new());
        handle.submit(|state, handle| {
            state.push("first");
            handle.submit(|state, _| state.push("third"));
        });
        handle.submit(|state, _| state.push("second"));
        // "third" is submitted while the first call is still queued
        handle.call(|_, _| ()).await.unwrap();
        let state = handle.call(|state, _| state.clone()).await.unwrap();
        assert_eq!(state, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let handle = EventLoop::spawn(0i32);
        let ran = Arc::new(Mutex::new(false));
        handle.submit(|state, _| *state += 1);
        handle.shutdown();
        let ran_ = ran.clone();
        handle.submit(move |_, _| *ran_.lock().unwrap() = true);
        assert_eq!(handle.call(|state, _| *state).await, Err(LoopClosed));
        assert!(handle.is_closed());
        assert!(!*ran.lock().unwrap());
        assert!(!handle.submit(|_, _| ()));
    }

    #[tokio::test]
    async fn loop_stops_when_handles_are_dropped() {
        struct Dropped(Option<oneshot::Sender<()>>);
        impl Drop for Dropped {
            fn drop(&mut self) {
                if let Some(tx) = self.0.take() {
                    tx.send(()).ok();
                }
            }
        }
        let (tx, rx) = oneshot::channel();
        let handle = EventLoop::spawn(Dropped(Some(tx)));
        drop(handle);
        tokio::time::timeout(std::time::Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
    }
}
