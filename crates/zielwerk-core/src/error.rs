// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Zielwerk.

use thiserror::Error;

use crate::types::DestinationKey;

/// Top-level error type for all Zielwerk operations.
#[derive(Debug, Error)]
pub enum ZielwerkError {
    // -- Store usage --
    #[error("destination store is not initialised")]
    NotInitialized,

    #[error("destination store is already initialised")]
    AlreadyInitialized,

    #[error("unknown destination: {0}")]
    UnknownDestination(DestinationKey),

    #[error("provisional destination {0} must be resolved before it can be selected")]
    ProvisionalNotSelectable(DestinationKey),

    #[error("destination {0} is not provisional")]
    NotProvisional(DestinationKey),

    #[error("invalid default destination selection rules: {0}")]
    InvalidSelectionRules(String),

    // -- Persistence --
    #[error("unsupported app state version {0}")]
    UnsupportedAppStateVersion(u32),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ZielwerkError>;
