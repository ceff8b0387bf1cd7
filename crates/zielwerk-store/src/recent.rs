// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recently used destinations and the app-state document they are saved in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use zielwerk_core::error::{Result, ZielwerkError};
use zielwerk_core::types::{Destination, DestinationKey, RecentDestination};

/// App-state format version understood by this crate.
pub const APP_STATE_VERSION: u32 = 2;

/// Bounded most-recent-first list of destination references.
#[derive(Debug, Clone)]
pub struct RecentDestinations {
    entries: Vec<RecentDestination>,
    capacity: usize,
}

impl RecentDestinations {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Build from a persisted list, dropping duplicate keys and overflow.
    pub fn from_list(list: Vec<RecentDestination>, capacity: usize) -> Self {
        let mut entries: Vec<RecentDestination> = Vec::with_capacity(capacity);
        for recent in list {
            if entries.len() == capacity {
                break;
            }
            if entries.iter().any(|e| e.key() == recent.key()) {
                debug!(id = %recent.id, "dropping duplicate recent destination");
                continue;
            }
            entries.push(recent);
        }
        Self { entries, capacity }
    }

    /// Most recent first.
    pub fn entries(&self) -> &[RecentDestination] {
        &self.entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &DestinationKey) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: &DestinationKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key() == *key)
    }

    /// Record a use of `destination`, moving it to the front.
    pub fn touch(&mut self, destination: &Destination, used_at: DateTime<Utc>) {
        if self.capacity == 0 {
            return;
        }
        if let Some(index) = self.position(&destination.key()) {
            self.entries.remove(index);
        }
        self.entries
            .insert(0, RecentDestination::from_destination(destination, used_at));
        self.entries.truncate(self.capacity);
    }
}

/// Persisted print-preview state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub version: u32,
    #[serde(default)]
    pub recent_destinations: Vec<RecentDestination>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: APP_STATE_VERSION,
            recent_destinations: Vec::new(),
        }
    }
}

impl AppState {
    /// Parse a serialized app state, rejecting other format versions.
    pub fn parse(json: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(json)?;
        if state.version != APP_STATE_VERSION {
            return Err(ZielwerkError::UnsupportedAppStateVersion(state.version));
        }
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
