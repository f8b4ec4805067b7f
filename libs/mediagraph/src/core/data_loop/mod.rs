// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#[allow(clippy::module_inception)]
mod data_loop;
mod invocation;

pub use data_loop::DataLoop;
pub use invocation::GraphTask;
