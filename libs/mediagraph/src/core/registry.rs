// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Identifier registry for objects made visible to the outside.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::properties::Properties;
use crate::core::pubsub::{ListenerToken, RegistryEvent, Signal};

/// Id handed out by [`Registry::insert`]. Never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalId(pub u32);

impl std::fmt::Display for GlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the registry remembers about an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub kind: String,
    pub properties: Properties,
}

struct RegistryInner {
    objects: BTreeMap<GlobalId, RegistryEntry>,
    next_id: u32,
    signal: Signal<RegistryEvent>,
}

/// Listeners run with the registry lock held and must not call back into it.
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                objects: BTreeMap::new(),
                next_id: 0,
                signal: Signal::new(),
            }),
        }
    }

    pub fn insert(&self, kind: impl Into<String>, properties: Properties) -> GlobalId {
        let kind = kind.into();
        let mut inner = self.inner.lock();
        let id = GlobalId(inner.next_id);
        inner.next_id += 1;
        inner.objects.insert(
            id,
            RegistryEntry {
                kind: kind.clone(),
                properties,
            },
        );
        tracing::debug!(id = id.0, %kind, "[registry] Object added");
        inner
            .signal
            .emit(&RegistryEvent::ObjectAdded { id: id.0, kind });
        id
    }

    /// Remove `id`. Returns the entry if it was present.
    pub fn remove(&self, id: GlobalId) -> Option<RegistryEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.objects.remove(&id)?;
        tracing::debug!(id = id.0, "[registry] Object removed");
        inner.signal.emit(&RegistryEvent::ObjectRemoved { id: id.0 });
        Some(entry)
    }

    pub fn get(&self, id: GlobalId) -> Option<RegistryEntry> {
        self.inner.lock().objects.get(&id).cloned()
    }

    pub fn contains(&self, id: GlobalId) -> bool {
        self.inner.lock().objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe_fn<F>(&self, f: F) -> ListenerToken
    where
        F: FnMut(&RegistryEvent) -> crate::core::error::Result<()> + Send + 'static,
    {
        self.inner.lock().signal.subscribe_fn(f)
    }

    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        self.inner.lock().signal.unsubscribe(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_remove_notifies() {
        let registry = Registry::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            registry.subscribe_fn(move |e| {
                events.lock().push(e.clone());
                Ok(())
            });
        }

        let a = registry.insert("node", Properties::new());
        let b = registry.insert("node", Properties::new());
        assert_ne!(a, b);
        assert!(registry.remove(a).is_some());
        assert!(registry.remove(a).is_none());
        assert!(!registry.contains(a));
        assert!(registry.contains(b));

        assert_eq!(
            *events.lock(),
            vec![
                RegistryEvent::ObjectAdded {
                    id: a.0,
                    kind: "node".into()
                },
                RegistryEvent::ObjectAdded {
                    id: b.0,
                    kind: "node".into()
                },
                RegistryEvent::ObjectRemoved { id: a.0 },
            ]
        );
    }
}
