// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Events published by the destination store.
//
// Events travel over a `tokio::sync::broadcast` channel, so subscribers only
// see them after the store call that produced them has returned. A handler
// that reacts by calling back into the store never observes a half-merged
// collection.

use zielwerk_core::types::{DestinationKey, PrintServersConfig, PrinterType, StoreErrorKind};

/// Which provider search an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Native enumeration of one printer type.
    Printers(PrinterType),
    /// Cloud search for one account (`None` = profile/device printers).
    Cloud { account: Option<String> },
    /// Printers fetched from the chosen print servers.
    PrintServers,
}

/// Something consumers of the store may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// One merge call added or updated these destinations.
    DestinationsInserted { keys: Vec<DestinationKey> },
    /// The selection changed. `None` means nothing is selected.
    DestinationSelect { key: Option<DestinationKey> },
    /// The selected destination's capabilities are available.
    SelectedDestinationCapabilitiesReady { key: DestinationKey },
    Error(StoreErrorKind),
    DestinationSearchStarted(SearchScope),
    DestinationSearchDone(SearchScope),
    /// The configured print servers were (re)loaded.
    PrintServersChanged(PrintServersConfig),
    /// A provisional extension printer was granted access. `resolved` is
    /// `None` when the grant failed.
    ProvisionalDestinationResolved {
        provisional: DestinationKey,
        resolved: Option<DestinationKey>,
    },
}
