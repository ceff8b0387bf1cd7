// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Store configuration and the settings a print-preview session starts with.

use serde::{Deserialize, Serialize};

use crate::types::RecentDestination;

/// Settings handed to `DestinationStore::init`, once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialSettings {
    /// Kiosk mode: no "Save as PDF" fallback.
    pub pdf_disabled: bool,
    /// Google Drive is mounted, so "Save to Google Drive" is offered.
    pub drive_mounted: bool,
    /// Device name of the OS default printer.
    pub system_default_printer_name: Option<String>,
    /// Serialized default destination selection rules (policy JSON).
    pub default_selection_rules: Option<String>,
    /// Most recent first.
    pub recent_destinations: Vec<RecentDestination>,
    /// Policy: prefer the system default printer over recent destinations.
    pub use_system_default_as_default: bool,
}

/// Tunables for the store itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How many recent destinations are remembered.
    pub max_recent_destinations: usize,
    /// Buffered events per subscriber before the slowest one lags.
    pub event_capacity: usize,
    /// Seconds the session waits for auto-selection before falling back.
    pub auto_select_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_recent_destinations: 3,
            event_capacity: 256,
            auto_select_timeout_secs: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_settings_from_partial_json() {
        let settings: InitialSettings = serde_json::from_str(
            r#"{"pdfDisabled": true, "systemDefaultPrinterName": "FooDevice"}"#,
        )
        .unwrap();
        assert!(settings.pdf_disabled);
        assert!(!settings.drive_mounted);
        assert_eq!(settings.system_default_printer_name.as_deref(), Some("FooDevice"));
        assert!(settings.recent_destinations.is_empty());
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_recent_destinations, 3);
        assert_eq!(config.auto_select_timeout_secs, 15);
    }
}
