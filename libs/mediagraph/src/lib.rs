// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Real-time media routing kernel.
//!
//! Nodes wrap a processing implementation and expose typed ports. Each port
//! negotiates a format and a buffer set with its implementation, and gets a
//! mix (input) or tee (output) adapter in a shared scheduling graph so that
//! one port can be linked to any number of peers. The graph is owned by a
//! dedicated data thread; every mutation is marshalled onto it through the
//! [`DataLoop`].

#![allow(clippy::type_complexity)] // Boxed graph tasks read fine in context

pub mod core;

pub use core::*;
