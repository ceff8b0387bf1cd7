// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zielwerk Store: merges print destinations reported by asynchronous
// providers into one deduplicated collection, tracks the selected
// destination and remembers recently used ones.

pub mod destination_store;
pub mod events;
pub mod parsers;
pub mod recent;
pub mod selection;
pub mod session;

pub use destination_store::{DestinationStore, SelectionState};
pub use events::{SearchScope, StoreEvent};
pub use recent::{AppState, RecentDestinations};
pub use selection::DestinationMatch;
pub use session::{DestinationSession, ProviderResponse, SessionOutcome};
