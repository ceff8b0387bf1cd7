// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recording provider doubles.
//
// The stubs never answer on their own: they remember every request so a test
// (or a headless driver) can inspect what the store asked for and feed the
// replies back in whatever order it wants. Clones share the same call log, so
// keep one clone and hand the other to the store.

use std::sync::{Arc, Mutex};

use zielwerk_core::types::{Origin, PrinterType, RequestId};

use crate::traits::{CloudPrintInterface, NativeLayer};

/// A request received by [`NativeLayerStub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    GetPrinters(PrinterType),
    GetPrinterCapabilities {
        request: RequestId,
        destination_id: String,
        printer_type: PrinterType,
    },
    GrantExtensionPrinterAccess {
        request: RequestId,
        provisional_id: String,
    },
    GetPrintServersConfig,
    ChoosePrintServers(Vec<String>),
}

/// Native layer that records requests.
#[derive(Debug, Clone, Default)]
pub struct NativeLayerStub {
    calls: Arc<Mutex<Vec<NativeCall>>>,
}

impl NativeLayerStub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request so far, oldest first.
    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().expect("native call log poisoned").clone()
    }

    /// Forget recorded requests.
    pub fn reset(&self) {
        self.calls.lock().expect("native call log poisoned").clear();
    }

    /// How many times printers of `printer_type` were requested.
    pub fn get_printers_count(&self, printer_type: PrinterType) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == NativeCall::GetPrinters(printer_type))
            .count()
    }

    /// Destination ids whose capabilities were requested, in order.
    pub fn capability_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NativeCall::GetPrinterCapabilities { destination_id, .. } => Some(destination_id),
                _ => None,
            })
            .collect()
    }

    /// Request id of the latest capabilities request for `destination_id`.
    pub fn last_capability_request(&self, destination_id: &str) -> Option<RequestId> {
        self.calls().into_iter().rev().find_map(|c| match c {
            NativeCall::GetPrinterCapabilities {
                request,
                destination_id: id,
                ..
            } if id == destination_id => Some(request),
            _ => None,
        })
    }

    fn record(&self, call: NativeCall) {
        tracing::debug!(?call, "native layer stub request");
        self.calls.lock().expect("native call log poisoned").push(call);
    }
}

impl NativeLayer for NativeLayerStub {
    fn get_printers(&self, printer_type: PrinterType) {
        self.record(NativeCall::GetPrinters(printer_type));
    }

    fn get_printer_capabilities(
        &self,
        request: RequestId,
        destination_id: &str,
        printer_type: PrinterType,
    ) {
        self.record(NativeCall::GetPrinterCapabilities {
            request,
            destination_id: destination_id.to_owned(),
            printer_type,
        });
    }

    fn grant_extension_printer_access(&self, request: RequestId, provisional_id: &str) {
        self.record(NativeCall::GrantExtensionPrinterAccess {
            request,
            provisional_id: provisional_id.to_owned(),
        });
    }

    fn get_print_servers_config(&self) {
        self.record(NativeCall::GetPrintServersConfig);
    }

    fn choose_print_servers(&self, server_ids: &[String]) {
        self.record(NativeCall::ChoosePrintServers(server_ids.to_vec()));
    }
}

/// A request received by [`CloudPrintStub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    Search {
        account: Option<String>,
        origin: Option<Origin>,
    },
    Printer {
        request: RequestId,
        destination_id: String,
        origin: Origin,
        account: Option<String>,
    },
}

/// Cloud print interface that records requests.
#[derive(Debug, Clone, Default)]
pub struct CloudPrintStub {
    calls: Arc<Mutex<Vec<CloudCall>>>,
}

impl CloudPrintStub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.calls.lock().expect("cloud call log poisoned").clone()
    }

    pub fn reset(&self) {
        self.calls.lock().expect("cloud call log poisoned").clear();
    }

    /// Accounts searched so far, in order.
    pub fn searches(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CloudCall::Search { account, .. } => Some(account),
                CloudCall::Printer { .. } => None,
            })
            .collect()
    }

    /// Request id of the latest printer lookup for `destination_id`.
    pub fn last_printer_request(&self, destination_id: &str) -> Option<RequestId> {
        self.calls().into_iter().rev().find_map(|c| match c {
            CloudCall::Printer {
                request,
                destination_id: id,
                ..
            } if id == destination_id => Some(request),
            _ => None,
        })
    }

    fn record(&self, call: CloudCall) {
        tracing::debug!(?call, "cloud print stub request");
        self.calls.lock().expect("cloud call log poisoned").push(call);
    }
}

impl CloudPrintInterface for CloudPrintStub {
    fn search(&self, account: Option<&str>, origin: Option<Origin>) {
        self.record(CloudCall::Search {
            account: account.map(String::from),
            origin,
        });
    }

    fn printer(
        &self,
        request: RequestId,
        destination_id: &str,
        origin: Origin,
        account: Option<&str>,
    ) {
        self.record(CloudCall::Printer {
            request,
            destination_id: destination_id.to_owned(),
            origin,
            account: account.map(String::from),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_call_log() {
        let stub = NativeLayerStub::new();
        let handed_out: Box<dyn NativeLayer> = Box::new(stub.clone());

        handed_out.get_printers(PrinterType::Local);
        handed_out.get_printer_capabilities(RequestId(7), "FooDevice", PrinterType::Local);

        assert_eq!(stub.get_printers_count(PrinterType::Local), 1);
        assert_eq!(stub.capability_requests(), vec!["FooDevice".to_string()]);
        assert_eq!(stub.last_capability_request("FooDevice"), Some(RequestId(7)));
        assert_eq!(stub.last_capability_request("BarDevice"), None);
    }

    #[test]
    fn reset_clears_history() {
        let stub = CloudPrintStub::new();
        stub.search(Some("user1@example.com"), None);
        stub.printer(RequestId(1), "cloud-1", Origin::Cookies, Some("user1@example.com"));
        assert_eq!(stub.searches(), vec![Some("user1@example.com".to_string())]);
        assert_eq!(stub.last_printer_request("cloud-1"), Some(RequestId(1)));

        stub.reset();
        assert!(stub.calls().is_empty());
    }
}
