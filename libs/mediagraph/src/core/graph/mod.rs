// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod ids;
mod sched_graph;
mod walk;

pub use ids::{LinkId, PortId, SchedNodeId};
pub use sched_graph::{
    ProcessorVertex, SchedEdge, SchedGraph, SchedNode, SchedNodeKind, ScheduleCallbacks,
};
pub use walk::{GraphWalk, TwoPhaseWalk};
