// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async session driver.
//
// Providers running on other tasks post their replies into an unbounded
// channel; the session applies them to the store one at a time, in arrival
// order, until the store has nothing outstanding. A deadline stands in for
// the host's auto-select timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use zielwerk_core::types::{
    CapabilitiesResponse, Destination, ExtensionDestinationInfo, PrintServersConfig, PrinterInfo,
    PrinterType, RequestId,
};

use crate::destination_store::DestinationStore;

/// A provider reply, as posted to the session.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    PrintersAdded {
        printer_type: PrinterType,
        printers: Vec<PrinterInfo>,
    },
    PrintersDone(PrinterType),
    PrintersFailed {
        printer_type: PrinterType,
        reason: String,
    },
    Capabilities {
        request: RequestId,
        result: Result<CapabilitiesResponse, String>,
    },
    CloudSearchDone {
        account: Option<String>,
        printers: Vec<Destination>,
    },
    CloudSearchFailed {
        account: Option<String>,
        reason: String,
    },
    CloudPrinterDone {
        request: RequestId,
        destination: Destination,
    },
    CloudPrinterFailed {
        request: RequestId,
        reason: String,
    },
    ExtensionAccessGranted {
        request: RequestId,
        result: Result<ExtensionDestinationInfo, String>,
    },
    PrintServersChanged(PrintServersConfig),
    ServerPrintersLoading(bool),
}

impl DestinationStore {
    /// Route a provider reply to the matching callback.
    pub fn apply(&mut self, response: ProviderResponse) {
        match response {
            ProviderResponse::PrintersAdded {
                printer_type,
                printers,
            } => self.on_printers_added(printer_type, printers),
            ProviderResponse::PrintersDone(printer_type) => self.on_printers_done(printer_type),
            ProviderResponse::PrintersFailed {
                printer_type,
                reason,
            } => self.on_printers_failed(printer_type, reason),
            ProviderResponse::Capabilities { request, result } => {
                self.on_capabilities(request, result)
            }
            ProviderResponse::CloudSearchDone { account, printers } => {
                self.on_cloud_search_done(account, printers)
            }
            ProviderResponse::CloudSearchFailed { account, reason } => {
                self.on_cloud_search_failed(account, reason)
            }
            ProviderResponse::CloudPrinterDone {
                request,
                destination,
            } => self.on_cloud_printer_done(request, destination),
            ProviderResponse::CloudPrinterFailed { request, reason } => {
                self.on_cloud_printer_failed(request, reason)
            }
            ProviderResponse::ExtensionAccessGranted { request, result } => {
                self.on_extension_access_granted(request, result)
            }
            ProviderResponse::PrintServersChanged(config) => self.on_print_servers_changed(config),
            ProviderResponse::ServerPrintersLoading(loading) => {
                self.on_server_printers_loading(loading)
            }
        }
    }
}

/// How `run_until_idle` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every request was answered.
    Idle,
    /// The deadline passed first; the store fell back.
    TimedOut,
    /// All providers hung up with requests outstanding.
    ProvidersClosed,
}

/// A store plus the channel its providers answer on.
pub struct DestinationSession {
    store: DestinationStore,
    responses: mpsc::UnboundedReceiver<ProviderResponse>,
    timeout: Duration,
}

impl DestinationSession {
    pub fn new(
        store: DestinationStore,
        responses: mpsc::UnboundedReceiver<ProviderResponse>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            responses,
            timeout,
        }
    }

    pub fn store(&self) -> &DestinationStore {
        &self.store
    }

    pub fn into_store(self) -> DestinationStore {
        self.store
    }

    /// Apply replies until the store is idle, the deadline passes, or every
    /// sender is dropped.
    pub async fn run_until_idle(&mut self) -> SessionOutcome {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut applied = 0usize;

        loop {
            if self.store.is_idle() {
                info!(applied, "destination session idle");
                return SessionOutcome::Idle;
            }
            tokio::select! {
                response = self.responses.recv() => match response {
                    Some(response) => {
                        debug!(?response, "applying provider response");
                        self.store.apply(response);
                        applied += 1;
                    }
                    None => {
                        warn!(applied, "providers closed with requests outstanding");
                        self.store.on_auto_select_timeout();
                        return SessionOutcome::ProvidersClosed;
                    }
                },
                () = &mut deadline => {
                    warn!(timeout = ?self.timeout, "destination session timed out");
                    self.store.on_auto_select_timeout();
                    return SessionOutcome::TimedOut;
                }
            }
        }
    }
}
