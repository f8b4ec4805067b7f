// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod direction;
#[allow(clippy::module_inception)]
mod port;
mod state;

pub use direction::Direction;
pub use port::Port;
pub use state::PortState;
