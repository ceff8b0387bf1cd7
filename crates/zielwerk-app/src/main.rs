// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zielwerk: headless print destination session.
//
// Entry point. Initialises logging, loads settings and a printer fixture,
// runs one destination session to completion and saves the recents.
//
// Usage: zielwerk [printers.json]

mod services;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use zielwerk_core::human_errors::humanize_store_error;
use zielwerk_store::{DestinationSession, DestinationStore, StoreEvent};

use services::app_services::AppServices;
use services::fixture::FixtureNativeLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Zielwerk starting");

    let svc = AppServices::init();
    if let Err(e) = svc.write_default_config_if_missing() {
        tracing::warn!(error = %e, "could not write default config");
    }
    let fixture_path = std::env::args().nth(1).map(PathBuf::from);
    let fixture = match svc.load_fixture(fixture_path.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(error = %e, "printer fixture unreadable");
            std::process::exit(1);
        }
    };

    let config = svc.store_config();
    let timeout = Duration::from_secs(config.auto_select_timeout_secs);
    let (tx, rx) = mpsc::unbounded_channel();
    let mut store = DestinationStore::new(Box::new(FixtureNativeLayer::new(fixture, tx)), config);
    let mut events = store.subscribe();

    if let Err(e) = store.init(svc.initial_settings()) {
        tracing::error!(error = %e, "destination store init failed");
        std::process::exit(1);
    }
    store.start_load_all_destinations();
    store.load_print_servers_config();

    let mut session = DestinationSession::new(store, rx, timeout);
    let outcome = session.run_until_idle().await;
    tracing::info!(?outcome, "session finished");

    let store = session.into_store();
    if report_events(&mut events) {
        if let Err(e) = svc.persist_recents(store.recent_destinations()) {
            tracing::error!(error = %e, "could not save recent destinations");
        }
    }

    for destination in store.destinations(store.active_user()) {
        tracing::info!(
            id = %destination.id,
            origin = %destination.origin,
            name = %destination.display_name,
            offline = destination.is_offline(),
            "destination"
        );
    }
    for server in &store.print_servers().print_servers {
        tracing::info!(id = %server.id, name = %server.name, "print server");
    }
    match store.selected_destination() {
        Some(selected) => {
            tracing::info!(id = %selected.id, name = %selected.display_name, "selected");
            if let Some(caps) = &selected.capabilities {
                tracing::info!(
                    color = caps.supports_color(),
                    duplex = caps.supports_duplex(),
                    max_copies = ?caps.max_copies(),
                    media = ?caps.default_media().and_then(|m| m.name.as_deref()),
                    "selected destination capabilities"
                );
            }
        }
        None => tracing::info!("no destination selected"),
    }
}

/// Log buffered events. Returns whether the selection changed.
fn report_events(events: &mut broadcast::Receiver<StoreEvent>) -> bool {
    let mut selection_changed = false;
    loop {
        match events.try_recv() {
            Ok(StoreEvent::DestinationSelect { .. }) => selection_changed = true,
            Ok(StoreEvent::Error(kind)) => {
                let human = humanize_store_error(kind);
                tracing::warn!(suggestion = %human.suggestion, "{}", human.message);
            }
            Ok(event) => tracing::debug!(?event, "store event"),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event receiver lagged");
                selection_changed = true;
            }
            Err(_) => break,
        }
    }
    selection_changed
}
