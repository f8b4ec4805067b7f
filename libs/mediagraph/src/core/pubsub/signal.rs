// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Synchronous listener list.
//!
//! A [`Signal`] delivers every emitted event to each registered listener in
//! registration order. Unsubscribing a token stops delivery to that listener
//! from the next emit on. A listener returning an error is logged and does not
//! stop delivery to the others.

use crate::core::error::Result;

/// Trait for objects that can receive events of type `E`.
pub trait EventListener<E>: Send {
    fn on_event(&mut self, event: &E) -> Result<()>;
}

/// Adapter turning a closure into an [`EventListener`].
pub struct FnListener<F>(pub F);

impl<E, F> EventListener<E> for FnListener<F>
where
    F: FnMut(&E) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &E) -> Result<()> {
        (self.0)(event)
    }
}

/// Handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

pub struct Signal<E> {
    listeners: Vec<(ListenerToken, Box<dyn EventListener<E>>)>,
    next_token: u64,
}

impl<E: std::fmt::Debug> Signal<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_token: 0,
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener<E>>) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        self.listeners.push((token, listener));
        token
    }

    /// Subscribe a closure.
    pub fn subscribe_fn<F>(&mut self, f: F) -> ListenerToken
    where
        F: FnMut(&E) -> Result<()> + Send + 'static,
        E: 'static,
    {
        self.subscribe(Box::new(FnListener(f)))
    }

    /// Returns `false` if the token was not (or no longer) registered.
    pub fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(t, _)| *t != token);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        for (token, listener) in self.listeners.iter_mut() {
            if let Err(e) = listener.on_event(event) {
                tracing::warn!(listener = token.0, ?event, "Listener failed: {}", e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: std::fmt::Debug> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
