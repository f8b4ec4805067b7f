// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::properties::Properties;

/// Flags passed along with a format to the implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatFlags {
    /// Only check whether the format would be accepted.
    pub test_only: bool,
    /// Accept the closest format the implementation supports.
    pub nearest: bool,
}

/// A negotiated media format.
///
/// The kernel does not interpret formats; it only tracks whether one was
/// negotiated. The fields are handed verbatim to the implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub media_type: String,
    pub media_subtype: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Format {
    pub fn new(media_type: impl Into<String>, media_subtype: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            media_subtype: media_subtype.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.media_type, self.media_subtype)
    }
}
