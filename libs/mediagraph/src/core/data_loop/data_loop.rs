// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The data thread and the queue through which the scheduling graph is
//! mutated.
//!
//! The data thread owns the [`SchedGraph`]. Control-path callers never touch
//! it directly; they submit closures that the data thread runs between
//! cycles, in submission order:
//!
//! - [`DataLoop::invoke_sync`] blocks until the closure has run and returns
//!   its result. Used for detach and pause-before-reconfigure, where the
//!   caller must know the data thread reached a safe point.
//! - [`DataLoop::invoke_async`] returns immediately. Failures are logged on
//!   the data thread. Used for attach during bring-up.
//!
//! Queued work is not cancellable; once dequeued it runs to completion.

use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::invocation::{GraphTask, Invocation};
use crate::core::config::DataLoopConfig;
use crate::core::error::{GraphError, Result};
use crate::core::graph::{GraphWalk, SchedGraph, TwoPhaseWalk};

struct DataLoopInner {
    sender: Sender<Invocation>,
    thread_id: ThreadId,
    thread_name: String,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DataLoopInner {
    fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        // The thread may already be gone; joining is still correct.
        let _ = self.sender.send(Invocation::Shutdown);
        if std::thread::current().id() == self.thread_id {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(thread = %self.thread_name, "[data-loop] Data thread panicked");
        }
        tracing::debug!(thread = %self.thread_name, "[data-loop] Stopped");
    }
}

impl Drop for DataLoopInner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cloneable handle to a running data thread.
#[derive(Clone)]
pub struct DataLoop {
    inner: Arc<DataLoopInner>,
}

impl std::fmt::Debug for DataLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoop")
            .field("thread", &self.inner.thread_name)
            .finish()
    }
}

impl DataLoop {
    /// Spawn the data thread with the default [`TwoPhaseWalk`].
    pub fn new(config: &DataLoopConfig) -> Result<Self> {
        Self::with_walk(config, Box::new(TwoPhaseWalk::new()))
    }

    pub fn with_walk(config: &DataLoopConfig, walk: Box<dyn GraphWalk>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let period = (config.cycle_period_ms > 0)
            .then(|| Duration::from_millis(config.cycle_period_ms));

        let handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(receiver, SchedGraph::new(), walk, period))?;

        tracing::info!(
            thread = %config.thread_name,
            period_ms = config.cycle_period_ms,
            "[data-loop] Started"
        );

        Ok(Self {
            inner: Arc::new(DataLoopInner {
                sender,
                thread_id: handle.thread().id(),
                thread_name: config.thread_name.clone(),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// True when called from the data thread itself.
    pub fn in_data_thread(&self) -> bool {
        std::thread::current().id() == self.inner.thread_id
    }

    fn submit(&self, invocation: Invocation) -> Result<()> {
        self.inner
            .sender
            .send(invocation)
            .map_err(|_| GraphError::DataLoop("data loop channel closed".into()))
    }

    /// Run `f` on the data thread and wait for its result.
    pub fn invoke_sync<T, F>(&self, label: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SchedGraph) -> Result<T> + Send + 'static,
    {
        if self.in_data_thread() {
            return Err(GraphError::DataLoop(format!(
                "synchronous invocation '{}' from the data thread",
                label
            )));
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let task: GraphTask = Box::new(move |graph| {
            // The caller may have given up waiting; nothing to do then.
            let _ = reply_tx.send(f(graph));
            Ok(())
        });
        self.submit(Invocation::Run { label, task })?;

        reply_rx
            .recv()
            .map_err(|_| GraphError::DataLoop(format!("no reply for invocation '{}'", label)))?
    }

    /// Queue `f` for the data thread and return immediately.
    pub fn invoke_async<F>(&self, label: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut SchedGraph) -> Result<()> + Send + 'static,
    {
        self.submit(Invocation::Run {
            label,
            task: Box::new(f),
        })
    }

    /// Run one processing cycle now and wait for it. Returns the number of
    /// completed cycles.
    pub fn cycle(&self) -> Result<u64> {
        if self.in_data_thread() {
            return Err(GraphError::DataLoop(
                "cycle requested from the data thread".into(),
            ));
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.submit(Invocation::Cycle { reply: reply_tx })?;
        reply_rx
            .recv()
            .map_err(|_| GraphError::DataLoop("no reply for cycle".into()))?
    }

    /// Stop the data thread. Later invocations fail with
    /// [`GraphError::DataLoop`].
    pub fn shutdown(&self) {
        self.inner.stop();
    }
}

fn execute(invocation: Invocation, graph: &mut SchedGraph, walk: &mut dyn GraphWalk) -> bool {
    match invocation {
        Invocation::Run { label, task } => {
            tracing::trace!(label, "[data-loop] Invoke");
            if let Err(e) = task(graph) {
                tracing::warn!(label, "[data-loop] Invocation failed: {}", e);
            }
            true
        }
        Invocation::Cycle { reply } => {
            let result = walk.cycle(graph).map(|()| walk.cycles());
            let _ = reply.send(result);
            true
        }
        Invocation::Shutdown => false,
    }
}

fn run(
    receiver: Receiver<Invocation>,
    mut graph: SchedGraph,
    mut walk: Box<dyn GraphWalk>,
    period: Option<Duration>,
) {
    let mut deadline = period.map(|p| Instant::now() + p);

    loop {
        let first = match deadline {
            Some(at) => match receiver.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(invocation) => Some(invocation),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match receiver.recv() {
                Ok(invocation) => Some(invocation),
                Err(_) => return,
            },
        };

        // Drain everything queued so far before the next cycle.
        for invocation in first.into_iter().chain(std::iter::from_fn(|| receiver.try_recv().ok())) {
            if !execute(invocation, &mut graph, walk.as_mut()) {
                tracing::trace!("[data-loop] Shutdown requested");
                return;
            }
        }

        if let (Some(at), Some(p)) = (deadline, period) {
            let now = Instant::now();
            if now >= at {
                if let Err(e) = walk.cycle(&mut graph) {
                    tracing::warn!("[data-loop] Cycle failed: {}", e);
                }
                let next = at + p;
                deadline = Some(if next > now { next } else { now + p });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::SchedNodeId;

    fn manual_loop() -> DataLoop {
        DataLoop::new(&DataLoopConfig {
            cycle_period_ms: 0,
            thread_name: "mediagraph-test".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_invoke_sync_returns_value() {
        let data_loop = manual_loop();
        let count = data_loop
            .invoke_sync("count", |graph| Ok(graph.node_count()))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_fifo_between_async_and_sync() {
        let data_loop = manual_loop();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            data_loop
                .invoke_async("push", move |_| {
                    order.lock().push(i);
                    Ok(())
                })
                .unwrap();
        }
        let observed = {
            let order = Arc::clone(&order);
            data_loop
                .invoke_sync("read", move |_| Ok(order.lock().clone()))
                .unwrap()
        };

        assert_eq!(observed, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_sync_error_propagates() {
        let data_loop = manual_loop();
        let err = data_loop
            .invoke_sync("remove", |graph| graph.remove_node(SchedNodeId::next()).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidState(_)));
    }

    #[test]
    fn test_sync_from_data_thread_is_refused() {
        let data_loop = manual_loop();
        let inner = data_loop.clone();
        let result = data_loop
            .invoke_sync("nested", move |_| {
                Ok(inner.invoke_sync("inner", |_| Ok(())).is_err())
            })
            .unwrap();
        assert!(result);
    }

    #[test]
    fn test_manual_cycles_and_shutdown() {
        let data_loop = manual_loop();
        assert_eq!(data_loop.cycle().unwrap(), 1);
        assert_eq!(data_loop.cycle().unwrap(), 2);

        data_loop.shutdown();
        let err = data_loop.invoke_async("late", |_| Ok(())).unwrap_err();
        assert!(matches!(err, GraphError::DataLoop(_)));
    }

    #[test]
    fn test_periodic_cycles_run() {
        let data_loop = DataLoop::new(&DataLoopConfig {
            cycle_period_ms: 1,
            thread_name: "mediagraph-test".into(),
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(data_loop.cycle().unwrap() > 1);
    }
}
