// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion of provider payloads into destinations.

use zielwerk_core::types::{
    CapabilitiesResponse, ConnectionStatus, Destination, ExtensionDestinationInfo,
    LocalDestinationInfo, Origin, PrinterInfo, PrivetDestinationInfo, ProvisionalType,
};

/// Turn any native provider record into a destination.
pub fn parse_printer_info(info: &PrinterInfo) -> Destination {
    match info {
        PrinterInfo::Local(local) => parse_local(local),
        PrinterInfo::Privet(privet) => parse_privet(privet),
        PrinterInfo::Extension(extension) => parse_extension(extension),
    }
}

/// Host printers are reachable by definition; the display name falls back to
/// the device name.
pub fn parse_local(info: &LocalDestinationInfo) -> Destination {
    let display_name = if info.printer_name.is_empty() {
        info.device_name.clone()
    } else {
        info.printer_name.clone()
    };
    let mut destination = Destination::new(info.device_name.clone(), Origin::Local, display_name)
        .with_status(ConnectionStatus::Online);
    destination.description = info
        .printer_description
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| info.printer_options.get("printer-make-and-model").cloned());
    destination.is_enterprise_managed = info.cups_enterprise_printer;
    destination
}

pub fn parse_privet(info: &PrivetDestinationInfo) -> Destination {
    let mut destination = Destination::new(info.service_name.clone(), Origin::Privet, info.name.clone())
        .with_status(ConnectionStatus::Online);
    destination.description = info.description.clone();
    destination
}

pub fn parse_extension(info: &ExtensionDestinationInfo) -> Destination {
    let mut destination = Destination::new(info.id.clone(), Origin::Extension, info.name.clone())
        .with_status(ConnectionStatus::Online);
    destination.description = info.description.clone();
    destination.extension_id = Some(info.extension_id.clone());
    destination.extension_name = Some(info.extension_name.clone());
    if info.provisional {
        destination.provisional_type = ProvisionalType::NeedsUsbPermission;
    }
    destination
}

/// Apply a capabilities reply to the destination it was requested for.
pub fn apply_capabilities(mut destination: Destination, response: CapabilitiesResponse) -> Destination {
    if let Some(printer) = response.printer.as_ref()
        && !printer.printer_name.is_empty()
    {
        destination.display_name.clone_from(&printer.printer_name);
    }
    destination.connection_status = ConnectionStatus::Online;
    destination.capabilities = Some(response.capabilities);
    destination
}
