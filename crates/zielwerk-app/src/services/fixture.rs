// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native provider backed by a JSON printer fixture.
//
// Every request is answered by posting a `ProviderResponse` to the session
// channel, never by calling the store directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use zielwerk_bridge::traits::NativeLayer;
use zielwerk_core::Capabilities;
use zielwerk_core::types::{
    CapabilitiesResponse, ExtensionDestinationInfo, LocalDestinationInfo, PrintServersConfig,
    PrinterInfo, PrinterType, PrivetDestinationInfo, RequestId,
};
use zielwerk_store::ProviderResponse;

/// Printers the fixture layer reports, plus their capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterFixture {
    pub local: Vec<LocalDestinationInfo>,
    pub privet: Vec<PrivetDestinationInfo>,
    pub extension: Vec<ExtensionDestinationInfo>,
    /// Keyed by destination id. Printers missing here fail their lookup.
    pub capabilities: BTreeMap<String, Capabilities>,
    pub print_servers: PrintServersConfig,
    /// Printers served by each print server, keyed by server id.
    pub server_printers: BTreeMap<String, Vec<LocalDestinationInfo>>,
}

impl PrinterFixture {
    fn printers(&self, printer_type: PrinterType) -> Vec<PrinterInfo> {
        match printer_type {
            PrinterType::Local => self.local.iter().cloned().map(PrinterInfo::Local).collect(),
            PrinterType::Privet => self.privet.iter().cloned().map(PrinterInfo::Privet).collect(),
            PrinterType::Extension => self
                .extension
                .iter()
                .cloned()
                .map(PrinterInfo::Extension)
                .collect(),
            PrinterType::Cloud => Vec::new(),
        }
    }

    fn local_info(&self, id: &str) -> Option<&LocalDestinationInfo> {
        self.local
            .iter()
            .chain(self.server_printers.values().flatten())
            .find(|p| p.device_name == id)
    }
}

/// `NativeLayer` answering from a [`PrinterFixture`].
pub struct FixtureNativeLayer {
    fixture: Arc<PrinterFixture>,
    responses: mpsc::UnboundedSender<ProviderResponse>,
}

impl FixtureNativeLayer {
    pub fn new(fixture: PrinterFixture, responses: mpsc::UnboundedSender<ProviderResponse>) -> Self {
        Self {
            fixture: Arc::new(fixture),
            responses,
        }
    }

    fn post(&self, response: ProviderResponse) {
        if self.responses.send(response).is_err() {
            warn!("session closed, dropping provider response");
        }
    }
}

impl NativeLayer for FixtureNativeLayer {
    fn get_printers(&self, printer_type: PrinterType) {
        let printers = self.fixture.printers(printer_type);
        debug!(%printer_type, count = printers.len(), "fixture printers");
        if !printers.is_empty() {
            self.post(ProviderResponse::PrintersAdded {
                printer_type,
                printers,
            });
        }
        self.post(ProviderResponse::PrintersDone(printer_type));
    }

    fn get_printer_capabilities(&self, request: RequestId, destination_id: &str, _printer_type: PrinterType) {
        let result = match self.fixture.capabilities.get(destination_id) {
            Some(capabilities) => Ok(CapabilitiesResponse {
                printer: self.fixture.local_info(destination_id).cloned(),
                capabilities: capabilities.clone(),
            }),
            None => Err(format!("no capabilities for {destination_id}")),
        };
        self.post(ProviderResponse::Capabilities { request, result });
    }

    fn grant_extension_printer_access(&self, request: RequestId, provisional_id: &str) {
        let result = self
            .fixture
            .extension
            .iter()
            .find(|p| p.id == provisional_id)
            .map(|p| ExtensionDestinationInfo {
                provisional: false,
                ..p.clone()
            })
            .ok_or_else(|| format!("no extension printer {provisional_id}"));
        self.post(ProviderResponse::ExtensionAccessGranted { request, result });
    }

    fn get_print_servers_config(&self) {
        self.post(ProviderResponse::PrintServersChanged(
            self.fixture.print_servers.clone(),
        ));
    }

    fn choose_print_servers(&self, server_ids: &[String]) {
        let printers: Vec<PrinterInfo> = server_ids
            .iter()
            .filter_map(|id| self.fixture.server_printers.get(id))
            .flatten()
            .cloned()
            .map(PrinterInfo::Local)
            .collect();
        debug!(servers = server_ids.len(), count = printers.len(), "fixture server printers");
        self.post(ProviderResponse::ServerPrintersLoading(true));
        if !printers.is_empty() {
            self.post(ProviderResponse::PrintersAdded {
                printer_type: PrinterType::Local,
                printers,
            });
        }
        self.post(ProviderResponse::ServerPrintersLoading(false));
    }
}
