// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zielwerk core: destination types and error definitions shared across all crates.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use capabilities::Capabilities;
pub use config::{InitialSettings, StoreConfig};
pub use error::ZielwerkError;
pub use types::*;
