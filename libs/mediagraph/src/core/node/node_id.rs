// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Unique identifier for a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUniqueId(String);

impl NodeUniqueId {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeUniqueId {
    fn default() -> Self {
        Self(format!("N{}", cuid2::create_id()))
    }
}

impl Deref for NodeUniqueId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for NodeUniqueId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeUniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeUniqueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<NodeUniqueId> for String {
    fn from(id: NodeUniqueId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let a = NodeUniqueId::new();
        let b = NodeUniqueId::new();
        assert_ne!(a, b);
        assert!(a.starts_with('N'));
    }
}
