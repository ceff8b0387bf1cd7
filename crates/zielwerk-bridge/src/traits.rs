// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Provider seams the destination store talks to.
//
// Every method only *starts* a request. Results come back later, in any
// order, through the store's `on_*` callbacks, tagged with the `RequestId`
// the store handed out. Implementations must not call back into the store
// synchronously from inside these methods.

use zielwerk_core::types::{Origin, PrinterType, RequestId};

/// Host-side printer enumeration and capability lookup.
pub trait NativeLayer: Send {
    /// Start enumerating printers of one provider type.
    ///
    /// Answered by `on_printers_added` (zero or more times) followed by
    /// `on_printers_done` or `on_printers_failed`.
    fn get_printers(&self, printer_type: PrinterType);

    /// Fetch the capabilities of one printer.
    ///
    /// Answered by `on_capabilities(request, ..)`.
    fn get_printer_capabilities(
        &self,
        request: RequestId,
        destination_id: &str,
        printer_type: PrinterType,
    );

    /// Ask the owning extension to grant access to a provisional USB printer.
    ///
    /// Answered by `on_extension_access_granted(request, ..)`.
    fn grant_extension_printer_access(&self, request: RequestId, provisional_id: &str);

    /// Fetch the policy-configured print servers.
    ///
    /// Answered by `on_print_servers_changed`.
    fn get_print_servers_config(&self);

    /// Fetch printers from the chosen print servers only.
    ///
    /// Printers arrive through `on_printers_added` as local printers,
    /// bracketed by `on_server_printers_loading(true)` and
    /// `on_server_printers_loading(false)`.
    fn choose_print_servers(&self, server_ids: &[String]);
}

/// Cloud print service, scoped per signed-in account.
pub trait CloudPrintInterface: Send {
    /// Search printers visible to `account` (or the profile/device when
    /// `None`). `origin` narrows the search to one cloud origin.
    ///
    /// Answered by `on_cloud_search_done` or `on_cloud_search_failed`.
    fn search(&self, account: Option<&str>, origin: Option<Origin>);

    /// Look up one cloud printer, including its capabilities.
    ///
    /// Answered by `on_cloud_printer_done(request, ..)` or
    /// `on_cloud_printer_failed(request, ..)`.
    fn printer(
        &self,
        request: RequestId,
        destination_id: &str,
        origin: Origin,
        account: Option<&str>,
    );
}
