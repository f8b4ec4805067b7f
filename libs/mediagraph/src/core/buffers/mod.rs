// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod buffer;
mod format;
mod slot;

pub use buffer::{AllocParam, Buffer, BufferSet};
pub use format::{Format, FormatFlags};
pub use slot::{BufferId, BufferSlot, IoSlot, SlotStatus};
