// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crossbeam_channel::Sender;

use crate::core::error::Result;
use crate::core::graph::SchedGraph;

/// Work executed on the data thread with exclusive access to the graph.
pub type GraphTask = Box<dyn FnOnce(&mut SchedGraph) -> Result<()> + Send>;

type Reply<T> = Sender<Result<T>>;

pub(crate) enum Invocation {
    /// Run a task between cycles. Synchronous callers wrap their reply
    /// channel inside the task itself.
    Run { label: &'static str, task: GraphTask },
    /// Run one processing cycle now.
    Cycle { reply: Reply<u64> },
    Shutdown,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Run { label, .. } => write!(f, "Run({})", label),
            Invocation::Cycle { .. } => write!(f, "Cycle"),
            Invocation::Shutdown => write!(f, "Shutdown"),
        }
    }
}
