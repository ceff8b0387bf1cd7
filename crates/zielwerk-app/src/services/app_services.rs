// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration and app-state persistence for headless sessions.
//
// Everything lives as JSON in the data directory:
//   config.json     initial settings and store tunables
//   app_state.json  recent destinations (version 2 app-state format)
//   printers.json   default printer fixture

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use zielwerk_core::error::Result;
use zielwerk_core::human_errors::humanize_error;
use zielwerk_core::types::RecentDestination;
use zielwerk_core::{InitialSettings, StoreConfig};
use zielwerk_store::AppState;

use super::data_dir;
use super::fixture::PrinterFixture;

const CONFIG_FILE: &str = "config.json";
const APP_STATE_FILE: &str = "app_state.json";
const FIXTURE_FILE: &str = "printers.json";

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub settings: InitialSettings,
    pub store: StoreConfig,
}

/// Paths and persisted state for one run.
#[derive(Debug, Clone)]
pub struct AppServices {
    data_dir: PathBuf,
    config: AppConfig,
}

impl AppServices {
    /// Load configuration from the default data directory.
    pub fn init() -> Self {
        Self::with_data_dir(data_dir::data_dir())
    }

    pub fn with_data_dir(dir: PathBuf) -> Self {
        info!(path = %dir.display(), "initialising app services");
        let config = load_config(&dir).unwrap_or_default();
        Self {
            data_dir: dir,
            config,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        self.config.store.clone()
    }

    /// Settings for `DestinationStore::init`, with recents restored from the
    /// saved app state.
    pub fn initial_settings(&self) -> InitialSettings {
        let mut settings = self.config.settings.clone();
        match self.load_app_state() {
            Ok(Some(state)) => settings.recent_destinations = state.recent_destinations,
            Ok(None) => {}
            Err(e) => {
                let human = humanize_error(&e);
                warn!(error = %e, "{}", human.message);
            }
        }
        settings
    }

    /// Read `app_state.json`. A missing file is not an error.
    pub fn load_app_state(&self) -> Result<Option<AppState>> {
        let path = self.data_dir.join(APP_STATE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(AppState::parse(&json)?))
    }

    /// Overwrite `app_state.json` with the given recents.
    pub fn persist_recents(&self, recents: &[RecentDestination]) -> Result<()> {
        let state = AppState {
            recent_destinations: recents.to_vec(),
            ..AppState::default()
        };
        let path = self.data_dir.join(APP_STATE_FILE);
        std::fs::write(&path, state.to_json()?)?;
        info!(path = %path.display(), count = recents.len(), "saved recent destinations");
        Ok(())
    }

    pub fn persist_config(&self) -> Result<()> {
        persist_config(&self.data_dir, &self.config)
    }

    /// Write the defaults on first run so they can be edited.
    pub fn write_default_config_if_missing(&self) -> Result<()> {
        if self.data_dir.join(CONFIG_FILE).exists() {
            return Ok(());
        }
        self.persist_config()
    }

    /// Load a printer fixture from `path`, or from the data directory.
    pub fn load_fixture(&self, path: Option<&Path>) -> Result<PrinterFixture> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.join(FIXTURE_FILE));
        if !path.exists() {
            warn!(path = %path.display(), "no printer fixture, no printers will be reported");
            return Ok(PrinterFixture::default());
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
