// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod events;
mod signal;

pub use events::{NodeEvent, PortEvent, RegistryEvent};
pub use signal::{EventListener, FnListener, ListenerToken, Signal};
