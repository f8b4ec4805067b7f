// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

/// Broad classification of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Library/factory not found, allocation failure. Fatal to a single
    /// construction attempt; partial resources have already been released.
    Resource,
    /// Missing capability, rejected format, buffers requested before
    /// negotiation. Port/Node state is unchanged.
    Protocol,
    /// Data loop, configuration or I/O trouble outside the negotiation protocol.
    Runtime,
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Incompatible plugin: {0}")]
    IncompatiblePlugin(String),

    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("No format negotiated on port {0}")]
    NoFormat(String),

    #[error("Implementation rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Port already exists: {0}")]
    PortExists(String),

    #[error("Too many ports: {0}")]
    TooManyPorts(String),

    #[error("Data loop error: {0}")]
    DataLoop(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GraphError {
    /// Convenience constructor for implementation-reported rejections.
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        GraphError::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::ResourceNotFound(_) | GraphError::AllocationFailed(_) => {
                ErrorKind::Resource
            }
            GraphError::IncompatiblePlugin(_)
            | GraphError::NoFormat(_)
            | GraphError::Rejected { .. }
            | GraphError::InvalidState(_)
            | GraphError::PortNotFound(_)
            | GraphError::PortExists(_)
            | GraphError::TooManyPorts(_) => ErrorKind::Protocol,
            GraphError::DataLoop(_)
            | GraphError::Configuration(_)
            | GraphError::Io(_)
            | GraphError::Other(_) => ErrorKind::Runtime,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
