// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::sched_graph::{ScheduleCallbacks, SchedGraph};
use crate::core::error::Result;

/// Strategy the data thread uses to run one processing cycle.
pub trait GraphWalk: Send {
    fn cycle(&mut self, graph: &mut SchedGraph) -> Result<()>;

    /// Completed cycles.
    fn cycles(&self) -> u64;
}

/// Demand phase in reverse topological order (consumers ask, requests travel
/// upstream), then produce phase in topological order (buffers travel
/// downstream). A vertex is invoked at most once per phase.
#[derive(Debug, Default)]
pub struct TwoPhaseWalk {
    cycles: u64,
}

impl TwoPhaseWalk {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphWalk for TwoPhaseWalk {
    fn cycle(&mut self, graph: &mut SchedGraph) -> Result<()> {
        graph.for_each_scheduled(true, |node| {
            node.last_status = node.kind.on_demand();
        });
        graph.for_each_scheduled(false, |node| {
            node.last_status = node.kind.on_produce();
        });
        self.cycles += 1;
        Ok(())
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}
