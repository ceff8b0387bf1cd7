// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The destination store.
//
// Owns every destination reported by the providers, keyed by
// `(id, origin, account)`, and the single current selection. Providers are
// only ever asked to start work; their replies come back through the `on_*`
// methods tagged with the `RequestId` the store handed out, so a late reply
// can always be told apart from the one the store is waiting for.
//
// Initial selection walks a queue of candidates (rules, recents, system
// default, first local printer) and stops at the first one that resolves.
// When the queue runs dry the store falls back to Save as PDF or reports an
// error.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace, warn};

use zielwerk_bridge::traits::{CloudPrintInterface, NativeLayer};
use zielwerk_core::config::{InitialSettings, StoreConfig};
use zielwerk_core::error::{Result, ZielwerkError};
use zielwerk_core::types::{
    CapabilitiesResponse, Destination, DestinationKey, ExtensionDestinationInfo, Origin,
    PrintServersConfig, PrinterInfo, PrinterType, ProvisionalType, RecentDestination, RequestId,
    SAVE_AS_PDF_ID, StoreErrorKind,
};

use crate::events::{SearchScope, StoreEvent};
use crate::parsers::{apply_capabilities, parse_extension, parse_printer_info};
use crate::recent::RecentDestinations;
use crate::selection::DestinationMatch;

/// Where the store's selection currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    Unselected,
    /// Selected, capabilities still being fetched.
    Selecting {
        key: DestinationKey,
        request: RequestId,
    },
    Selected {
        key: DestinationKey,
    },
    /// Nothing usable is selected.
    Error(StoreErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStatus {
    Searching,
    Done,
    Failed,
}

/// One way of picking the initial destination.
#[derive(Debug, Clone)]
enum Candidate {
    /// A destination matching the selection rules that is already known.
    MatchingKnown,
    Recent(RecentDestination),
    /// Search the rules' providers and take the first match that arrives.
    MatchingSearched,
    SystemDefault(String),
    /// Kiosk mode: the first printer the local provider reports.
    FirstLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Nothing,
    Fetch(RequestId),
    Matcher,
    FirstLocal,
}

#[derive(Debug)]
struct AutoSelect {
    candidates: VecDeque<Candidate>,
    waiting: Waiting,
}

enum Step {
    Select(DestinationKey),
    Wait(Waiting),
    Next,
}

#[derive(Debug, Clone)]
enum FetchPurpose {
    /// Capabilities of the destination being selected.
    Select { previous: Option<DestinationKey> },
    /// Look up an auto-select candidate that may not be known yet.
    Resolve,
}

#[derive(Debug, Clone)]
struct PendingFetch {
    key: DestinationKey,
    purpose: FetchPurpose,
    seed: Destination,
}

/// Cache and reconciliation layer for print destinations.
pub struct DestinationStore {
    native: Box<dyn NativeLayer>,
    cloud: Option<Box<dyn CloudPrintInterface>>,
    destinations: Vec<Destination>,
    index: HashMap<DestinationKey, usize>,
    selection: SelectionState,
    /// Last destination that reached `Selected`; failed selections revert here.
    last_stable: Option<DestinationKey>,
    recents: RecentDestinations,
    active_user: Option<String>,
    searches: HashMap<SearchScope, SearchStatus>,
    rules: Option<DestinationMatch>,
    auto_select: Option<AutoSelect>,
    pending: HashMap<RequestId, PendingFetch>,
    pending_grants: HashMap<RequestId, DestinationKey>,
    print_servers: PrintServersConfig,
    chosen_print_servers: Vec<String>,
    awaiting_print_servers: bool,
    next_request: u64,
    events: broadcast::Sender<StoreEvent>,
    initialized: bool,
    pdf_enabled: bool,
}

impl DestinationStore {
    pub fn new(native: Box<dyn NativeLayer>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            native,
            cloud: None,
            destinations: Vec::new(),
            index: HashMap::new(),
            selection: SelectionState::Unselected,
            last_stable: None,
            recents: RecentDestinations::new(config.max_recent_destinations),
            active_user: None,
            searches: HashMap::new(),
            rules: None,
            auto_select: None,
            pending: HashMap::new(),
            pending_grants: HashMap::new(),
            print_servers: PrintServersConfig::default(),
            chosen_print_servers: Vec::new(),
            awaiting_print_servers: false,
            next_request: 1,
            events,
            initialized: false,
            pdf_enabled: false,
        }
    }

    pub fn with_cloud_print(mut self, cloud: Box<dyn CloudPrintInterface>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Cloud print became available after the store was created.
    pub fn set_cloud_print_interface(&mut self, cloud: Box<dyn CloudPrintInterface>) {
        info!("cloud print interface attached");
        self.cloud = Some(cloud);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Initialization and auto-selection
    // -----------------------------------------------------------------------

    /// One-time setup: seed the built-in destinations and start picking the
    /// initial selection.
    #[instrument(skip_all, fields(
        pdf_disabled = settings.pdf_disabled,
        recents = settings.recent_destinations.len(),
    ))]
    pub fn init(&mut self, settings: InitialSettings) -> Result<()> {
        if self.initialized {
            return Err(ZielwerkError::AlreadyInitialized);
        }
        self.initialized = true;
        self.pdf_enabled = !settings.pdf_disabled;

        let capacity = self.recents.capacity();
        self.recents = RecentDestinations::from_list(settings.recent_destinations, capacity);

        self.rules = match settings.default_selection_rules.as_deref() {
            Some(json) => DestinationMatch::from_rules_json(json).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring default destination selection rules");
                None
            }),
            None => None,
        };

        let mut builtins = Vec::new();
        if self.pdf_enabled {
            builtins.push(Destination::save_as_pdf());
        }
        if settings.drive_mounted {
            builtins.push(Destination::save_to_drive());
        }
        if !builtins.is_empty() {
            self.insert_destinations(builtins);
        }

        let system_default = settings
            .system_default_printer_name
            .filter(|name| !name.is_empty());
        let has_rules = self.rules.is_some();
        let default_first = settings.use_system_default_as_default && !has_rules;

        let mut candidates = VecDeque::new();
        if has_rules {
            candidates.push_back(Candidate::MatchingKnown);
        }
        if default_first && let Some(name) = &system_default {
            candidates.push_back(Candidate::SystemDefault(name.clone()));
        }
        candidates.extend(self.recents.entries().iter().cloned().map(Candidate::Recent));
        if has_rules {
            candidates.push_back(Candidate::MatchingSearched);
        } else if !default_first && let Some(name) = system_default {
            candidates.push_back(Candidate::SystemDefault(name));
        }
        if settings.pdf_disabled {
            candidates.push_back(Candidate::FirstLocal);
        }

        debug!(candidates = candidates.len(), "starting auto-select");
        self.auto_select = Some(AutoSelect {
            candidates,
            waiting: Waiting::Nothing,
        });
        self.advance_auto_select();
        Ok(())
    }

    /// Whether the store is still looking for its initial destination.
    pub fn is_auto_selecting(&self) -> bool {
        self.auto_select.is_some()
    }

    /// Auto-select has taken too long: stop waiting and use the fallback.
    pub fn on_auto_select_timeout(&mut self) {
        if self.auto_select.take().is_some() {
            warn!("auto-select timed out");
            self.select_fallback();
        }
    }

    fn advance_auto_select(&mut self) {
        loop {
            let candidate = match self.auto_select.as_mut() {
                None => return,
                Some(auto) if auto.waiting != Waiting::Nothing => return,
                Some(auto) => auto.candidates.pop_front(),
            };
            let Some(candidate) = candidate else {
                self.auto_select = None;
                self.select_fallback();
                return;
            };

            trace!(?candidate, "trying auto-select candidate");
            let step = match candidate {
                Candidate::MatchingKnown => self.find_rules_match().map_or(Step::Next, Step::Select),
                Candidate::Recent(recent) => self.preselect(destination_from_recent(&recent)),
                Candidate::MatchingSearched => self.wait_for_rules_match(),
                Candidate::SystemDefault(name) => {
                    let seed = self.system_default_seed(&name);
                    self.preselect(seed)
                }
                Candidate::FirstLocal => self.wait_for_first_local(),
            };

            match step {
                Step::Select(key) => {
                    self.finish_auto_select(key);
                    return;
                }
                Step::Wait(waiting) => {
                    if let Some(auto) = self.auto_select.as_mut() {
                        auto.waiting = waiting;
                    }
                    return;
                }
                Step::Next => {}
            }
        }
    }

    /// Select a known destination outright, or ask its provider about it.
    fn preselect(&mut self, seed: Destination) -> Step {
        let key = seed.key();
        let target = match self.destination(&key) {
            Some(known) if known.is_provisional() => return Step::Next,
            Some(known) if known.capabilities.is_some() => return Step::Select(key),
            Some(known) => known.clone(),
            None => seed,
        };
        match self.request_capabilities(&target, FetchPurpose::Resolve) {
            Some(request) => Step::Wait(Waiting::Fetch(request)),
            None => Step::Next,
        }
    }

    fn wait_for_rules_match(&mut self) -> Step {
        let Some(types) = self.rules.as_ref().map(DestinationMatch::printer_types) else {
            return Step::Next;
        };
        for printer_type in &types {
            self.start_load_destinations(*printer_type);
        }
        if let Some(key) = self.find_rules_match() {
            Step::Select(key)
        } else if self.searches_settled(&types) {
            Step::Next
        } else {
            Step::Wait(Waiting::Matcher)
        }
    }

    fn wait_for_first_local(&mut self) -> Step {
        if let Some(key) = self.first_local() {
            return Step::Select(key);
        }
        self.start_load_destinations(PrinterType::Local);
        if self.searches_settled(&[PrinterType::Local]) {
            Step::Next
        } else {
            Step::Wait(Waiting::FirstLocal)
        }
    }

    fn system_default_seed(&self, name: &str) -> Destination {
        let local = DestinationKey::new(name, Origin::Local, None);
        let chrome_os = DestinationKey::new(name, Origin::ChromeOs, None);
        self.destination(&local)
            .or_else(|| self.destination(&chrome_os))
            .cloned()
            .unwrap_or_else(|| Destination::new(name, Origin::Local, name))
    }

    fn find_rules_match(&self) -> Option<DestinationKey> {
        let rules = self.rules.as_ref()?;
        self.destinations
            .iter()
            .find(|d| rules.matches(d))
            .map(Destination::key)
    }

    fn first_local(&self) -> Option<DestinationKey> {
        self.destinations
            .iter()
            .find(|d| d.origin.is_local() && !d.is_virtual() && !d.is_provisional())
            .map(Destination::key)
    }

    fn finish_auto_select(&mut self, key: DestinationKey) {
        info!(destination = %key, "auto-selected destination");
        self.auto_select = None;
        self.begin_selection(key);
    }

    /// Nothing better turned up: Save as PDF, or an error.
    fn select_fallback(&mut self) {
        let pdf = DestinationKey::new(SAVE_AS_PDF_ID, Origin::Local, None);
        if self.pdf_enabled && self.index.contains_key(&pdf) {
            self.begin_selection(pdf);
            return;
        }
        let kind = if self.destinations.iter().any(|d| !d.is_provisional()) {
            StoreErrorKind::Invalid
        } else {
            StoreErrorKind::NoDestinations
        };
        warn!(?kind, "no destination could be selected");
        self.selection = SelectionState::Error(kind);
        self.emit(StoreEvent::Error(kind));
    }

    fn check_auto_select_progress(&mut self) {
        let Some(waiting) = self.auto_select.as_ref().map(|a| a.waiting) else {
            return;
        };
        let settled = match waiting {
            Waiting::Matcher => {
                let types = self
                    .rules
                    .as_ref()
                    .map(DestinationMatch::printer_types)
                    .unwrap_or_default();
                self.searches_settled(&types)
            }
            Waiting::FirstLocal => self.searches_settled(&[PrinterType::Local]),
            Waiting::Nothing | Waiting::Fetch(_) => false,
        };
        if settled {
            if let Some(auto) = self.auto_select.as_mut() {
                auto.waiting = Waiting::Nothing;
            }
            self.advance_auto_select();
        }
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Merge a batch of destinations. Emits one `DestinationsInserted` for the
    /// whole batch when anything changed and returns how many entries did.
    pub fn insert_destinations(&mut self, batch: Vec<Destination>) -> usize {
        let mut changed: Vec<DestinationKey> = Vec::new();
        let mut seen: HashSet<DestinationKey> = HashSet::new();
        for mut incoming in batch {
            let key = incoming.key();
            if self.recents.contains(&key) {
                incoming.is_recent = true;
            }
            let updated = match self.index.get(&key) {
                Some(&i) => self.destinations[i].merge_from(&incoming),
                None => {
                    self.index.insert(key.clone(), self.destinations.len());
                    self.destinations.push(incoming);
                    true
                }
            };
            if updated && seen.insert(key.clone()) {
                changed.push(key);
            }
        }

        if changed.is_empty() {
            return 0;
        }
        let count = changed.len();
        debug!(count, total = self.destinations.len(), "merged destinations");
        self.emit(StoreEvent::DestinationsInserted {
            keys: changed.clone(),
        });
        self.after_merge(&changed);
        count
    }

    fn after_merge(&mut self, changed: &[DestinationKey]) {
        // A provider may deliver capabilities for the destination being selected.
        if let SelectionState::Selecting { key, .. } = &self.selection
            && changed.contains(key)
            && self.destination(key).is_some_and(|d| d.capabilities.is_some())
        {
            let key = key.clone();
            self.complete_selection(key);
        }

        let found = match self.auto_select.as_ref().map(|a| a.waiting) {
            Some(Waiting::Matcher) => self.find_rules_match(),
            Some(Waiting::FirstLocal) => self.first_local(),
            _ => None,
        };
        if let Some(key) = found {
            self.finish_auto_select(key);
            return;
        }

        if self.selection == SelectionState::Error(StoreErrorKind::NoDestinations) {
            let usable = changed
                .iter()
                .find(|k| self.destination(k).is_some_and(|d| !d.is_provisional()))
                .cloned();
            if let Some(key) = usable {
                info!(destination = %key, "destination appeared, leaving error state");
                self.begin_selection(key);
            }
        }
    }

    /// A provider retracted a destination.
    pub fn remove_destination(&mut self, key: &DestinationKey) -> Option<Destination> {
        let position = self.index.remove(key)?;
        let removed = self.destinations.remove(position);
        self.index = self
            .destinations
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key(), i))
            .collect();
        debug!(destination = %key, "removed destination");

        if self.last_stable.as_ref() == Some(key) {
            self.last_stable = None;
        }
        let was_selected = match &self.selection {
            SelectionState::Selected { key: k } | SelectionState::Selecting { key: k, .. } => k == key,
            _ => false,
        };
        if was_selected {
            self.selection = SelectionState::Unselected;
            self.emit(StoreEvent::DestinationSelect { key: None });
        }
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select `destination`, adding it to the collection when absent.
    pub fn select_destination(&mut self, destination: Destination) -> Result<()> {
        if !self.initialized {
            return Err(ZielwerkError::NotInitialized);
        }
        let key = destination.key();
        if destination.is_provisional() {
            return Err(ZielwerkError::ProvisionalNotSelectable(key));
        }
        if !self.index.contains_key(&key) {
            self.insert_destinations(vec![destination]);
        }
        self.select_key(&key)
    }

    /// Select a destination already in the collection.
    #[instrument(skip(self), fields(destination = %key))]
    pub fn select_key(&mut self, key: &DestinationKey) -> Result<()> {
        if !self.initialized {
            return Err(ZielwerkError::NotInitialized);
        }
        let destination = self
            .destination(key)
            .ok_or_else(|| ZielwerkError::UnknownDestination(key.clone()))?;
        if destination.is_provisional() {
            return Err(ZielwerkError::ProvisionalNotSelectable(key.clone()));
        }
        if self.auto_select.take().is_some() {
            debug!("user selection cancels auto-select");
        }
        self.begin_selection(key.clone());
        Ok(())
    }

    fn begin_selection(&mut self, key: DestinationKey) {
        match &self.selection {
            SelectionState::Selected { key: current } | SelectionState::Selecting { key: current, .. }
                if *current == key =>
            {
                debug!(destination = %key, "destination already selected");
                return;
            }
            _ => {}
        }
        let Some(&position) = self.index.get(&key) else {
            return;
        };

        self.destinations[position].is_recent = true;
        self.recents.touch(&self.destinations[position], Utc::now());
        self.emit(StoreEvent::DestinationSelect {
            key: Some(key.clone()),
        });

        if self.destinations[position].capabilities.is_some() {
            self.complete_selection(key);
            return;
        }

        let destination = self.destinations[position].clone();
        let previous = self.last_stable.clone();
        match self.request_capabilities(&destination, FetchPurpose::Select {
            previous: previous.clone(),
        }) {
            Some(request) => self.selection = SelectionState::Selecting { key, request },
            None => self.fail_selection(&key, previous),
        }
    }

    fn complete_selection(&mut self, key: DestinationKey) {
        if let Some(&position) = self.index.get(&key) {
            self.recents.touch(&self.destinations[position], Utc::now());
        }
        info!(destination = %key, "destination ready");
        self.selection = SelectionState::Selected { key: key.clone() };
        self.last_stable = Some(key.clone());
        self.emit(StoreEvent::SelectedDestinationCapabilitiesReady { key });
    }

    fn fail_selection(&mut self, failed: &DestinationKey, previous: Option<DestinationKey>) {
        warn!(destination = %failed, "capabilities unavailable for selected destination");
        self.emit(StoreEvent::Error(StoreErrorKind::Invalid));

        let fallback = previous.filter(|k| {
            k != failed && self.destination(k).is_some_and(|d| d.capabilities.is_some())
        });
        match fallback {
            Some(key) => {
                debug!(destination = %key, "reverting to previous destination");
                self.emit(StoreEvent::DestinationSelect {
                    key: Some(key.clone()),
                });
                self.complete_selection(key);
            }
            None => {
                self.selection = SelectionState::Error(StoreErrorKind::Invalid);
                self.emit(StoreEvent::DestinationSelect { key: None });
            }
        }
    }

    fn request_capabilities(&mut self, destination: &Destination, purpose: FetchPurpose) -> Option<RequestId> {
        let request = self.next_request_id();
        if destination.origin.is_cloud() {
            let Some(cloud) = self.cloud.as_ref() else {
                debug!(destination = %destination.key(), "cloud print unavailable, cannot fetch printer");
                return None;
            };
            cloud.printer(
                request,
                &destination.id,
                destination.origin,
                destination.account.as_deref(),
            );
        } else {
            self.native.get_printer_capabilities(
                request,
                &destination.id,
                destination.origin.printer_type(),
            );
        }
        debug!(%request, destination = %destination.key(), "requested capabilities");
        self.pending.insert(
            request,
            PendingFetch {
                key: destination.key(),
                purpose,
                seed: destination.clone(),
            },
        );
        Some(request)
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    // -----------------------------------------------------------------------
    // Provider replies
    // -----------------------------------------------------------------------

    /// Reply to a native capabilities request.
    pub fn on_capabilities(
        &mut self,
        request: RequestId,
        result: std::result::Result<CapabilitiesResponse, String>,
    ) {
        let Some(pending) = self.pending.remove(&request) else {
            debug!(%request, "capabilities for unknown request");
            return;
        };
        let outcome = result.map(|response| {
            let base = self
                .destination(&pending.key)
                .cloned()
                .unwrap_or_else(|| pending.seed.clone());
            apply_capabilities(base, response)
        });
        self.complete_fetch(request, pending, outcome);
    }

    /// Reply to a cloud printer lookup.
    pub fn on_cloud_printer_done(&mut self, request: RequestId, destination: Destination) {
        let Some(pending) = self.pending.remove(&request) else {
            debug!(%request, "cloud printer for unknown request");
            return;
        };
        self.complete_fetch(request, pending, Ok(destination));
    }

    pub fn on_cloud_printer_failed(&mut self, request: RequestId, reason: String) {
        let Some(pending) = self.pending.remove(&request) else {
            debug!(%request, "cloud printer failure for unknown request");
            return;
        };
        self.complete_fetch(request, pending, Err(reason));
    }

    fn complete_fetch(
        &mut self,
        request: RequestId,
        pending: PendingFetch,
        outcome: std::result::Result<Destination, String>,
    ) {
        let is_current = matches!(
            &self.selection,
            SelectionState::Selecting { request: r, .. } if *r == request
        );
        // The reply describes the destination that was asked about, whatever
        // key the provider reported it under.
        let outcome = outcome.map(|mut destination| {
            destination.id.clone_from(&pending.key.id);
            destination.origin = pending.key.origin;
            destination.account.clone_from(&pending.key.account);
            destination
        });

        match (pending.purpose, outcome) {
            (FetchPurpose::Select { previous }, Ok(destination)) => {
                if !is_current && !self.index.contains_key(&pending.key) {
                    debug!(%request, destination = %pending.key, "dropping reply for removed destination");
                    return;
                }
                if !is_current {
                    debug!(%request, destination = %pending.key, "stale capabilities, refreshing entry only");
                }
                self.insert_destinations(vec![destination]);
                if let SelectionState::Selecting { request: r, key } = &self.selection
                    && *r == request
                {
                    let key = key.clone();
                    if self.destination(&key).is_some_and(|d| d.capabilities.is_some()) {
                        self.complete_selection(key);
                    } else {
                        warn!(%request, destination = %key, "reply carried no capabilities");
                        self.fail_selection(&key, previous);
                    }
                }
            }
            (FetchPurpose::Select { previous }, Err(reason)) => {
                if is_current {
                    warn!(%request, destination = %pending.key, %reason, "capabilities request failed");
                    self.fail_selection(&pending.key, previous);
                } else {
                    debug!(%request, %reason, "ignoring stale capabilities failure");
                }
            }
            (FetchPurpose::Resolve, Ok(destination)) => {
                let key = destination.key();
                self.insert_destinations(vec![destination]);
                if self.is_waiting_for(request) {
                    self.finish_auto_select(key);
                }
            }
            (FetchPurpose::Resolve, Err(reason)) => {
                debug!(%request, destination = %pending.key, %reason, "auto-select candidate unavailable");
                if self.is_waiting_for(request) {
                    if let Some(auto) = self.auto_select.as_mut() {
                        auto.waiting = Waiting::Nothing;
                    }
                    self.advance_auto_select();
                }
            }
        }
    }

    fn is_waiting_for(&self, request: RequestId) -> bool {
        self.auto_select
            .as_ref()
            .is_some_and(|a| a.waiting == Waiting::Fetch(request))
    }

    // -----------------------------------------------------------------------
    // Searches
    // -----------------------------------------------------------------------

    /// Ask one provider for its printers unless it is already searching or
    /// has finished.
    #[instrument(skip(self))]
    pub fn start_load_destinations(&mut self, printer_type: PrinterType) {
        if printer_type == PrinterType::Cloud {
            self.start_load_cloud_destinations(None);
            return;
        }
        let scope = SearchScope::Printers(printer_type);
        if matches!(
            self.searches.get(&scope),
            Some(SearchStatus::Searching | SearchStatus::Done)
        ) {
            trace!("search already issued");
            return;
        }
        self.searches.insert(scope.clone(), SearchStatus::Searching);
        self.native.get_printers(printer_type);
        self.emit(StoreEvent::DestinationSearchStarted(scope));
    }

    /// Search every native provider and the active account's cloud printers.
    pub fn start_load_all_destinations(&mut self) {
        for printer_type in PrinterType::NATIVE {
            self.start_load_destinations(printer_type);
        }
        self.start_load_cloud_destinations(None);
    }

    /// Search cloud printers for the active account.
    #[instrument(skip(self))]
    pub fn start_load_cloud_destinations(&mut self, origin: Option<Origin>) {
        let scope = SearchScope::Cloud {
            account: self.active_user.clone(),
        };
        if matches!(
            self.searches.get(&scope),
            Some(SearchStatus::Searching | SearchStatus::Done)
        ) {
            trace!("cloud search already issued");
            return;
        }
        let Some(cloud) = self.cloud.as_ref() else {
            debug!("cloud print unavailable");
            return;
        };
        cloud.search(self.active_user.as_deref(), origin);
        self.searches.insert(scope.clone(), SearchStatus::Searching);
        self.emit(StoreEvent::DestinationSearchStarted(scope));
    }

    /// Switch the signed-in account whose cloud printers are shown.
    #[instrument(skip(self))]
    pub fn set_active_user(&mut self, account: &str) {
        if account.is_empty() {
            self.active_user = None;
            return;
        }
        self.active_user = Some(account.to_owned());
        self.reload_user_cookie_based_destinations(account);
    }

    /// Re-run the cookie-based cloud search for one account. Native
    /// providers are left alone.
    pub fn reload_user_cookie_based_destinations(&mut self, account: &str) {
        let scope = SearchScope::Cloud {
            account: Some(account.to_owned()),
        };
        match self.searches.get(&scope) {
            Some(SearchStatus::Done) => self.emit(StoreEvent::DestinationSearchDone(scope)),
            Some(SearchStatus::Searching) => trace!(account, "cloud search in flight"),
            Some(SearchStatus::Failed) | None => {
                let Some(cloud) = self.cloud.as_ref() else {
                    debug!(account, "cloud print unavailable");
                    return;
                };
                cloud.search(Some(account), Some(Origin::Cookies));
                self.searches.insert(scope.clone(), SearchStatus::Searching);
                self.emit(StoreEvent::DestinationSearchStarted(scope));
            }
        }
    }

    /// A native provider reported printers.
    pub fn on_printers_added(&mut self, printer_type: PrinterType, printers: Vec<PrinterInfo>) {
        debug!(%printer_type, count = printers.len(), "printers added");
        let batch = printers.iter().map(parse_printer_info).collect();
        self.insert_destinations(batch);
    }

    pub fn on_printers_done(&mut self, printer_type: PrinterType) {
        self.settle_search(SearchScope::Printers(printer_type), SearchStatus::Done);
    }

    /// Failures count as an empty result.
    pub fn on_printers_failed(&mut self, printer_type: PrinterType, reason: String) {
        warn!(%printer_type, %reason, "printer search failed");
        self.settle_search(SearchScope::Printers(printer_type), SearchStatus::Failed);
    }

    /// Results of a cloud search issued for `account`.
    pub fn on_cloud_search_done(&mut self, account: Option<String>, printers: Vec<Destination>) {
        debug!(account = account.as_deref().unwrap_or(""), count = printers.len(), "cloud search done");
        let batch = printers
            .into_iter()
            .map(|mut d| {
                if d.origin == Origin::Cookies && d.account.is_none() {
                    d.account.clone_from(&account);
                }
                d
            })
            .collect();
        self.insert_destinations(batch);
        self.settle_search(SearchScope::Cloud { account }, SearchStatus::Done);
    }

    pub fn on_cloud_search_failed(&mut self, account: Option<String>, reason: String) {
        warn!(account = account.as_deref().unwrap_or(""), %reason, "cloud search failed");
        self.settle_search(SearchScope::Cloud { account }, SearchStatus::Failed);
    }

    fn settle_search(&mut self, scope: SearchScope, status: SearchStatus) {
        self.searches.insert(scope.clone(), status);
        self.emit(StoreEvent::DestinationSearchDone(scope));
        self.check_auto_select_progress();
    }

    fn scope_for(&self, printer_type: PrinterType) -> SearchScope {
        match printer_type {
            PrinterType::Cloud => SearchScope::Cloud {
                account: self.active_user.clone(),
            },
            native => SearchScope::Printers(native),
        }
    }

    fn searches_settled(&self, types: &[PrinterType]) -> bool {
        types.iter().all(|t| {
            !matches!(
                self.searches.get(&self.scope_for(*t)),
                Some(SearchStatus::Searching)
            )
        })
    }

    // -----------------------------------------------------------------------
    // Provisional destinations
    // -----------------------------------------------------------------------

    /// Ask the extension behind a provisional destination for device access.
    #[instrument(skip(self), fields(destination = %key))]
    pub fn resolve_provisional_destination(&mut self, key: &DestinationKey) -> Result<RequestId> {
        let destination = self
            .destination(key)
            .ok_or_else(|| ZielwerkError::UnknownDestination(key.clone()))?;
        if !destination.is_provisional() {
            return Err(ZielwerkError::NotProvisional(key.clone()));
        }
        let request = self.next_request_id();
        self.native.grant_extension_printer_access(request, &key.id);
        self.pending_grants.insert(request, key.clone());
        Ok(request)
    }

    pub fn on_extension_access_granted(
        &mut self,
        request: RequestId,
        result: std::result::Result<ExtensionDestinationInfo, String>,
    ) {
        let Some(provisional) = self.pending_grants.remove(&request) else {
            debug!(%request, "access grant for unknown request");
            return;
        };
        let resolved = match result {
            Ok(info) => {
                let mut destination = parse_extension(&info);
                destination.provisional_type = ProvisionalType::None;
                let key = destination.key();
                if key != provisional {
                    self.remove_destination(&provisional);
                }
                self.insert_destinations(vec![destination]);
                info!(destination = %key, "provisional destination resolved");
                Some(key)
            }
            Err(reason) => {
                warn!(destination = %provisional, %reason, "extension access not granted");
                None
            }
        };
        self.emit(StoreEvent::ProvisionalDestinationResolved {
            provisional,
            resolved,
        });
    }

    // -----------------------------------------------------------------------
    // Print servers
    // -----------------------------------------------------------------------

    /// Ask the host which print servers are configured.
    pub fn load_print_servers_config(&mut self) {
        self.awaiting_print_servers = true;
        self.native.get_print_servers_config();
    }

    pub fn on_print_servers_changed(&mut self, config: PrintServersConfig) {
        debug!(
            count = config.print_servers.len(),
            single_server = config.is_single_server_fetching_mode,
            "print servers changed"
        );
        self.awaiting_print_servers = false;
        self.chosen_print_servers
            .retain(|id| config.print_servers.iter().any(|s| s.id == *id));
        self.print_servers = config.clone();
        self.emit(StoreEvent::PrintServersChanged(config));
    }

    /// Fetch printers from the given servers. Ids that are not configured are
    /// dropped; in single-server mode only the first remaining id is used.
    #[instrument(skip(self))]
    pub fn choose_print_servers(&mut self, server_ids: &[String]) {
        let mut chosen: Vec<String> = Vec::new();
        for id in server_ids {
            if chosen.contains(id) {
                continue;
            }
            if self.print_servers.print_servers.iter().any(|s| s.id == *id) {
                chosen.push(id.clone());
            } else {
                warn!(server = %id, "ignoring unknown print server");
            }
        }
        if self.print_servers.is_single_server_fetching_mode {
            chosen.truncate(1);
        }
        self.native.choose_print_servers(&chosen);
        self.chosen_print_servers = chosen;
    }

    /// The host started or finished fetching printers from the chosen servers.
    pub fn on_server_printers_loading(&mut self, loading: bool) {
        if loading {
            self.searches
                .insert(SearchScope::PrintServers, SearchStatus::Searching);
            self.emit(StoreEvent::DestinationSearchStarted(SearchScope::PrintServers));
        } else {
            self.settle_search(SearchScope::PrintServers, SearchStatus::Done);
        }
    }

    pub fn print_servers(&self) -> &PrintServersConfig {
        &self.print_servers
    }

    pub fn chosen_print_servers(&self) -> &[String] {
        &self.chosen_print_servers
    }

    pub fn is_server_printers_loading(&self) -> bool {
        self.searches.get(&SearchScope::PrintServers) == Some(&SearchStatus::Searching)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Destinations in insertion order. With an account filter, cookie-based
    /// cloud destinations of other accounts are left out.
    pub fn destinations(&self, account: Option<&str>) -> Vec<&Destination> {
        self.destinations
            .iter()
            .filter(|d| match account {
                Some(account) if d.origin == Origin::Cookies => d.account.as_deref() == Some(account),
                _ => true,
            })
            .collect()
    }

    pub fn destination(&self, key: &DestinationKey) -> Option<&Destination> {
        self.index.get(key).map(|&i| &self.destinations[i])
    }

    /// The selected destination, including one whose capabilities are pending.
    pub fn selected_destination(&self) -> Option<&Destination> {
        match &self.selection {
            SelectionState::Selected { key } | SelectionState::Selecting { key, .. } => {
                self.destination(key)
            }
            _ => None,
        }
    }

    pub fn selection_state(&self) -> &SelectionState {
        &self.selection
    }

    /// Most recent first.
    pub fn recent_destinations(&self) -> &[RecentDestination] {
        self.recents.entries()
    }

    pub fn active_user(&self) -> Option<&str> {
        self.active_user.as_deref()
    }

    pub fn is_print_destination_search_in_progress(&self) -> bool {
        self.searches.values().any(|s| *s == SearchStatus::Searching)
    }

    /// No search, fetch or auto-select step is outstanding.
    pub fn is_idle(&self) -> bool {
        self.auto_select.is_none()
            && self.pending.is_empty()
            && self.pending_grants.is_empty()
            && !self.awaiting_print_servers
            && !self.is_print_destination_search_in_progress()
    }

    fn emit(&self, event: StoreEvent) {
        if self.events.send(event).is_err() {
            trace!("no event subscribers");
        }
    }
}

fn destination_from_recent(recent: &RecentDestination) -> Destination {
    let display_name = if recent.display_name.is_empty() {
        recent.id.clone()
    } else {
        recent.display_name.clone()
    };
    let mut destination =
        Destination::new(recent.id.clone(), recent.origin, display_name).with_account(recent.account.clone());
    destination.is_recent = true;
    if !recent.extension_id.is_empty() {
        destination.extension_id = Some(recent.extension_id.clone());
        destination.extension_name = Some(recent.extension_name.clone());
    }
    destination
}

#[cfg(test)]
mod tests {
    use super::*;
    use zielwerk_bridge::stub::{CloudPrintStub, NativeCall, NativeLayerStub};
    use zielwerk_core::Capabilities;
    use zielwerk_core::types::{ConnectionStatus, LocalDestinationInfo, PrintServer};

    struct Harness {
        store: DestinationStore,
        native: NativeLayerStub,
        cloud: CloudPrintStub,
        events: broadcast::Receiver<StoreEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let native = NativeLayerStub::new();
            let cloud = CloudPrintStub::new();
            let store = DestinationStore::new(Box::new(native.clone()), StoreConfig::default())
                .with_cloud_print(Box::new(cloud.clone()));
            let events = store.subscribe();
            Self {
                store,
                native,
                cloud,
                events,
            }
        }

        fn init(settings: InitialSettings) -> Self {
            let mut harness = Self::new();
            harness.store.init(settings).unwrap();
            harness
        }

        fn drain(&mut self) -> Vec<StoreEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn respond_ok(&mut self, destination_id: &str) {
            let request = self.native.last_capability_request(destination_id).unwrap();
            self.store.on_capabilities(request, Ok(capabilities()));
        }

        fn respond_err(&mut self, destination_id: &str) {
            let request = self.native.last_capability_request(destination_id).unwrap();
            self.store.on_capabilities(request, Err("printer not found".into()));
        }

        fn selected_id(&self) -> Option<&str> {
            self.store.selected_destination().map(|d| d.id.as_str())
        }
    }

    fn capabilities() -> CapabilitiesResponse {
        CapabilitiesResponse {
            printer: None,
            capabilities: Capabilities::pdf(),
        }
    }

    fn local(id: &str) -> Destination {
        Destination::new(id, Origin::Local, id)
    }

    fn local_info(device: &str, name: &str) -> PrinterInfo {
        PrinterInfo::Local(LocalDestinationInfo {
            device_name: device.into(),
            printer_name: name.into(),
            printer_description: None,
            cups_enterprise_printer: false,
            printer_options: Default::default(),
        })
    }

    fn cookies(id: &str, account: &str) -> Destination {
        Destination::new(id, Origin::Cookies, id).with_account(account)
    }

    fn recents(ids: &[&str]) -> Vec<RecentDestination> {
        ids.iter().map(|id| RecentDestination::new(*id, Origin::Local)).collect()
    }

    fn kiosk() -> InitialSettings {
        InitialSettings {
            pdf_disabled: true,
            ..Default::default()
        }
    }

    fn pdf_key() -> DestinationKey {
        Destination::save_as_pdf().key()
    }

    fn servers(ids: &[&str], single_server: bool) -> PrintServersConfig {
        PrintServersConfig {
            print_servers: ids
                .iter()
                .map(|id| PrintServer {
                    id: (*id).into(),
                    name: format!("Server {id}"),
                })
                .collect(),
            is_single_server_fetching_mode: single_server,
        }
    }

    fn ready_count(events: &[StoreEvent], key: &DestinationKey) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, StoreEvent::SelectedDestinationCapabilitiesReady { key: k } if k == key))
            .count()
    }

    #[test]
    fn insert_keeps_one_entry_per_key_and_latest_values() {
        let mut h = Harness::init(kiosk());
        h.drain();

        let mut renamed = local("ID1");
        renamed.display_name = "One (2nd floor)".into();
        let merged = h
            .store
            .insert_destinations(vec![local("ID1"), renamed, local("ID2")]);

        assert_eq!(merged, 2);
        assert_eq!(h.store.destinations(None).len(), 2);
        assert_eq!(
            h.store.destination(&local("ID1").key()).unwrap().display_name,
            "One (2nd floor)"
        );
        let inserted: Vec<_> = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, StoreEvent::DestinationsInserted { .. }))
            .collect();
        assert_eq!(
            inserted,
            vec![StoreEvent::DestinationsInserted {
                keys: vec![local("ID1").key(), local("ID2").key()],
            }]
        );
    }

    #[test]
    fn unchanged_batch_emits_nothing() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("ID1")]);
        h.drain();

        assert_eq!(h.store.insert_destinations(vec![local("ID1")]), 0);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn reinsertion_keeps_fetched_capabilities() {
        let mut h = Harness::init(InitialSettings::default());
        h.store
            .insert_destinations(vec![local("ID1").with_status(ConnectionStatus::Online)]);
        h.store.select_key(&local("ID1").key()).unwrap();
        h.respond_ok("ID1");

        h.store.insert_destinations(vec![local("ID1")]);
        let stored = h.store.destination(&local("ID1").key()).unwrap();
        assert!(stored.capabilities.is_some());
        assert_eq!(stored.connection_status, ConnectionStatus::Online);
    }

    #[test]
    fn selecting_a_known_destination_never_duplicates_it() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("ID1")]);
        let before = h.store.destinations(None).len();

        h.store.select_destination(local("ID1")).unwrap();
        h.respond_ok("ID1");
        h.store.select_destination(local("ID1")).unwrap();

        assert_eq!(h.store.destinations(None).len(), before);
        assert_eq!(h.selected_id(), Some("ID1"));
    }

    #[test]
    fn selecting_an_unknown_destination_adds_it() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.select_destination(local("ID9")).unwrap();
        assert!(h.store.destination(&local("ID9").key()).is_some());
        assert_eq!(h.native.capability_requests(), vec!["ID9".to_string()]);
    }

    #[test]
    fn single_recent_is_selected_and_ready_fires_once() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        assert_eq!(h.native.capability_requests(), vec!["ID1".to_string()]);
        assert!(h.store.is_auto_selecting());

        h.respond_ok("ID1");

        assert_eq!(h.selected_id(), Some("ID1"));
        assert!(h.store.selected_destination().unwrap().is_recent);
        assert!(!h.store.is_auto_selecting());
        let events = h.drain();
        assert_eq!(ready_count(&events, &local("ID1").key()), 1);
        assert_eq!(ready_count(&events, &pdf_key()), 0);
    }

    #[test]
    fn recents_are_restored_most_recent_first() {
        let h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1", "ID2", "ID3"]),
            ..Default::default()
        });
        let ids: Vec<&str> = h
            .store
            .recent_destinations()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ID1", "ID2", "ID3"]);
    }

    #[test]
    fn unresolvable_recent_falls_through_to_the_next() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1", "ID2"]),
            ..Default::default()
        });
        h.respond_err("ID1");
        assert_eq!(
            h.native.capability_requests(),
            vec!["ID1".to_string(), "ID2".to_string()]
        );
        h.respond_ok("ID2");

        assert_eq!(h.selected_id(), Some("ID2"));
        assert!(!h.drain().iter().any(|e| matches!(e, StoreEvent::Error(_))));
    }

    #[test]
    fn pdf_is_the_fallback_when_no_recent_resolves() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        h.respond_err("ID1");

        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        assert_eq!(ready_count(&h.drain(), &pdf_key()), 1);
    }

    #[test]
    fn known_recent_with_capabilities_needs_no_request() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: vec![RecentDestination::new(SAVE_AS_PDF_ID, Origin::Local)],
            ..Default::default()
        });
        assert!(h.native.calls().is_empty());
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        assert_eq!(ready_count(&h.drain(), &pdf_key()), 1);
    }

    #[test]
    fn stale_capabilities_do_not_touch_the_new_selection() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("A"), local("B")]);

        h.store.select_key(&local("A").key()).unwrap();
        let request_a = h.native.last_capability_request("A").unwrap();
        h.store.select_key(&local("B").key()).unwrap();
        h.drain();

        h.store.on_capabilities(request_a, Ok(capabilities()));
        assert_eq!(h.selected_id(), Some("B"));
        assert!(matches!(h.store.selection_state(), SelectionState::Selecting { .. }));
        assert!(h.store.destination(&local("A").key()).unwrap().capabilities.is_some());
        let events = h.drain();
        assert_eq!(ready_count(&events, &local("A").key()), 0);
        assert!(!events.iter().any(|e| matches!(e, StoreEvent::DestinationSelect { .. })));

        h.respond_ok("B");
        assert_eq!(
            h.store.selection_state(),
            &SelectionState::Selected { key: local("B").key() }
        );
    }

    #[test]
    fn stale_capabilities_failure_is_ignored() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("A"), local("B")]);
        h.store.select_key(&local("A").key()).unwrap();
        let request_a = h.native.last_capability_request("A").unwrap();
        h.store.select_key(&local("B").key()).unwrap();
        h.drain();

        h.store.on_capabilities(request_a, Err("gone".into()));
        assert!(h.drain().is_empty());
        assert_eq!(h.selected_id(), Some("B"));
    }

    #[test]
    fn kiosk_without_printers_reports_no_destinations() {
        let mut h = Harness::init(kiosk());
        assert_eq!(h.native.get_printers_count(PrinterType::Local), 1);
        assert!(h.store.destinations(None).is_empty());

        h.store.on_printers_done(PrinterType::Local);

        assert!(h.store.selected_destination().is_none());
        assert_eq!(
            h.store.selection_state(),
            &SelectionState::Error(StoreErrorKind::NoDestinations)
        );
        assert!(h
            .drain()
            .contains(&StoreEvent::Error(StoreErrorKind::NoDestinations)));
    }

    #[test]
    fn printer_arriving_after_no_destinations_is_selected() {
        let mut h = Harness::init(kiosk());
        h.store.on_printers_done(PrinterType::Local);

        h.store
            .on_printers_added(PrinterType::Local, vec![local_info("FooDevice", "FooName")]);
        h.respond_ok("FooDevice");

        assert_eq!(h.selected_id(), Some("FooDevice"));
    }

    #[test]
    fn kiosk_selects_first_local_printer() {
        let mut h = Harness::init(kiosk());
        h.store.on_printers_added(
            PrinterType::Local,
            vec![local_info("FooDevice", "FooName"), local_info("BarDevice", "BarName")],
        );
        assert_eq!(h.native.capability_requests(), vec!["FooDevice".to_string()]);
        h.respond_ok("FooDevice");

        let selected = h.store.selected_destination().unwrap();
        assert_eq!(selected.display_name, "FooName");
    }

    #[test]
    fn failed_selection_reverts_to_previous_destination() {
        let mut h = Harness::init(InitialSettings::default());
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        h.store.insert_destinations(vec![local("ID1")]);
        h.drain();

        h.store.select_key(&local("ID1").key()).unwrap();
        h.respond_err("ID1");

        let events = h.drain();
        assert_eq!(
            events,
            vec![
                StoreEvent::DestinationSelect { key: Some(local("ID1").key()) },
                StoreEvent::Error(StoreErrorKind::Invalid),
                StoreEvent::DestinationSelect { key: Some(pdf_key()) },
                StoreEvent::SelectedDestinationCapabilitiesReady { key: pdf_key() },
            ]
        );
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
    }

    #[test]
    fn failed_selection_without_previous_recovers_on_next_select() {
        let mut h = Harness::init(kiosk());
        h.store
            .on_printers_added(PrinterType::Local, vec![local_info("FooDevice", "FooName")]);
        h.respond_err("FooDevice");

        assert!(h.store.selected_destination().is_none());
        assert_eq!(
            h.store.selection_state(),
            &SelectionState::Error(StoreErrorKind::Invalid)
        );

        h.store
            .on_printers_added(PrinterType::Local, vec![local_info("BarDevice", "BarName")]);
        assert!(h.store.selected_destination().is_none());
        h.store.select_key(&local("BarDevice").key()).unwrap();
        h.respond_ok("BarDevice");
        assert_eq!(h.selected_id(), Some("BarDevice"));
    }

    #[test]
    fn switching_accounts_searches_only_the_new_account() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.set_active_user("user1@example.com");
        h.store.on_cloud_search_done(
            Some("user1@example.com".into()),
            vec![cookies("cloud-1", "user1@example.com")],
        );
        h.native.reset();
        h.cloud.reset();

        h.store.set_active_user("user2@example.com");

        assert_eq!(h.cloud.searches(), vec![Some("user2@example.com".to_string())]);
        assert!(h.native.calls().is_empty());
    }

    #[test]
    fn reload_of_a_searched_account_reports_done_without_request() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.set_active_user("user1@example.com");
        h.store.on_cloud_search_done(Some("user1@example.com".into()), Vec::new());
        h.cloud.reset();
        h.drain();

        h.store.set_active_user("user1@example.com");

        assert!(h.cloud.calls().is_empty());
        assert_eq!(
            h.drain(),
            vec![StoreEvent::DestinationSearchDone(SearchScope::Cloud {
                account: Some("user1@example.com".into()),
            })]
        );
    }

    #[test]
    fn account_filter_hides_other_accounts_cloud_printers() {
        let mut h = Harness::init(kiosk());
        h.store.insert_destinations(vec![
            local("ID1"),
            cookies("cloud-1", "user1@example.com"),
            cookies("cloud-2", "user2@example.com"),
        ]);

        let ids: Vec<&str> = h
            .store
            .destinations(Some("user1@example.com"))
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ID1", "cloud-1"]);
        assert_eq!(h.store.destinations(None).len(), 3);
    }

    #[test]
    fn cloud_search_fills_in_missing_account() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.set_active_user("user1@example.com");
        h.store.on_cloud_search_done(
            Some("user1@example.com".into()),
            vec![Destination::new("cloud-1", Origin::Cookies, "Office")],
        );
        let key = DestinationKey::new("cloud-1", Origin::Cookies, Some("user1@example.com"));
        assert!(h.store.destination(&key).is_some());
    }

    #[test]
    fn selection_rules_override_system_default() {
        let mut h = Harness::init(InitialSettings {
            system_default_printer_name: Some("FooDevice".into()),
            default_selection_rules: Some(r#"{"namePattern": ".*Bar.*"}"#.into()),
            ..Default::default()
        });
        for printer_type in PrinterType::NATIVE {
            assert_eq!(h.native.get_printers_count(printer_type), 1);
        }
        assert!(h.native.capability_requests().is_empty());

        h.store.on_printers_added(
            PrinterType::Local,
            vec![local_info("FooDevice", "FooName"), local_info("BarDevice", "BarName")],
        );
        assert_eq!(h.native.capability_requests(), vec!["BarDevice".to_string()]);
        h.respond_ok("BarDevice");
        assert_eq!(h.selected_id(), Some("BarDevice"));
    }

    #[test]
    fn unmatched_rules_fall_back_once_searches_settle() {
        let mut h = Harness::init(InitialSettings {
            default_selection_rules: Some(r#"{"kind": "local", "namePattern": "Baz"}"#.into()),
            ..Default::default()
        });
        h.store
            .on_printers_added(PrinterType::Local, vec![local_info("FooDevice", "FooName")]);
        assert!(h.store.is_auto_selecting());

        h.store.on_printers_done(PrinterType::Local);
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
    }

    #[test]
    fn invalid_rules_are_ignored() {
        let h = Harness::init(InitialSettings {
            default_selection_rules: Some(r#"{"kind": "fax"}"#.into()),
            ..Default::default()
        });
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        assert!(h.native.calls().is_empty());
    }

    #[test]
    fn system_default_is_used_without_recents() {
        let h = Harness::init(InitialSettings {
            system_default_printer_name: Some("FooDevice".into()),
            ..Default::default()
        });
        assert_eq!(h.native.capability_requests(), vec!["FooDevice".to_string()]);
    }

    #[test]
    fn system_default_policy_beats_recents() {
        let mut h = Harness::init(InitialSettings {
            system_default_printer_name: Some("FooDevice".into()),
            recent_destinations: recents(&["ID1"]),
            use_system_default_as_default: true,
            ..Default::default()
        });
        assert_eq!(h.native.capability_requests(), vec!["FooDevice".to_string()]);
        h.respond_ok("FooDevice");
        assert_eq!(h.selected_id(), Some("FooDevice"));
    }

    #[test]
    fn recents_beat_system_default_without_policy() {
        let h = Harness::init(InitialSettings {
            system_default_printer_name: Some("FooDevice".into()),
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        assert_eq!(h.native.capability_requests(), vec!["ID1".to_string()]);
    }

    #[test]
    fn cloud_recent_without_cloud_print_is_skipped() {
        let native = NativeLayerStub::new();
        let mut store = DestinationStore::new(Box::new(native.clone()), StoreConfig::default());
        store
            .init(InitialSettings {
                recent_destinations: vec![RecentDestination::new("cloud-1", Origin::Cookies)],
                ..Default::default()
            })
            .unwrap();
        assert!(native.calls().is_empty());
        assert_eq!(
            store.selected_destination().map(|d| d.id.as_str()),
            Some(SAVE_AS_PDF_ID)
        );
    }

    #[test]
    fn cloud_recent_is_looked_up_through_cloud_print() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: vec![RecentDestination {
                account: "user1@example.com".into(),
                ..RecentDestination::new("cloud-1", Origin::Cookies)
            }],
            ..Default::default()
        });
        let request = h.cloud.last_printer_request("cloud-1").unwrap();
        h.store.on_cloud_printer_done(
            request,
            Destination::new("cloud-1", Origin::Cookies, "Office").with_capabilities(Capabilities::pdf()),
        );
        let selected = h.store.selected_destination().unwrap();
        assert_eq!(selected.account.as_deref(), Some("user1@example.com"));
    }

    #[test]
    fn auto_select_timeout_uses_fallback_and_ignores_late_reply() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        h.store.on_auto_select_timeout();
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));

        h.respond_ok("ID1");
        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        assert!(h.store.destination(&local("ID1").key()).is_some());
    }

    #[test]
    fn user_selection_cancels_auto_select() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        h.store.insert_destinations(vec![local("ID2")]);
        h.store.select_key(&local("ID2").key()).unwrap();
        assert!(!h.store.is_auto_selecting());

        h.respond_ok("ID1");
        assert_eq!(h.selected_id(), Some("ID2"));
    }

    #[test]
    fn loads_are_idempotent() {
        let mut h = Harness::new();
        h.store.start_load_destinations(PrinterType::Local);
        h.store.start_load_destinations(PrinterType::Local);
        assert_eq!(h.native.get_printers_count(PrinterType::Local), 1);
        assert!(h.store.is_print_destination_search_in_progress());

        h.store.on_printers_done(PrinterType::Local);
        h.store.start_load_destinations(PrinterType::Local);
        assert_eq!(h.native.get_printers_count(PrinterType::Local), 1);
        assert!(!h.store.is_print_destination_search_in_progress());
    }

    #[test]
    fn failed_search_may_be_retried() {
        let mut h = Harness::new();
        h.store.start_load_destinations(PrinterType::Privet);
        h.store.on_printers_failed(PrinterType::Privet, "mdns unavailable".into());
        h.store.start_load_destinations(PrinterType::Privet);
        assert_eq!(h.native.get_printers_count(PrinterType::Privet), 2);
    }

    #[test]
    fn load_all_asks_each_provider_once() {
        let mut h = Harness::new();
        h.store.start_load_all_destinations();
        h.store.start_load_all_destinations();
        for printer_type in PrinterType::NATIVE {
            assert_eq!(h.native.get_printers_count(printer_type), 1);
        }
        assert_eq!(h.cloud.searches(), vec![None]);
    }

    #[test]
    fn init_twice_is_an_error() {
        let mut h = Harness::init(InitialSettings::default());
        assert!(matches!(
            h.store.init(InitialSettings::default()),
            Err(ZielwerkError::AlreadyInitialized)
        ));
    }

    #[test]
    fn select_before_init_is_an_error() {
        let mut h = Harness::new();
        assert!(matches!(
            h.store.select_destination(local("ID1")),
            Err(ZielwerkError::NotInitialized)
        ));
    }

    #[test]
    fn drive_is_seeded_when_mounted() {
        let h = Harness::init(InitialSettings {
            drive_mounted: true,
            ..Default::default()
        });
        let ids: Vec<&str> = h.store.destinations(None).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![SAVE_AS_PDF_ID, "Save to Drive CrOS"]);
    }

    #[test]
    fn inserted_destinations_matching_recents_are_flagged() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: recents(&["ID1"]),
            ..Default::default()
        });
        h.store.insert_destinations(vec![local("ID1"), local("ID2")]);
        assert!(h.store.destination(&local("ID1").key()).unwrap().is_recent);
        assert!(!h.store.destination(&local("ID2").key()).unwrap().is_recent);
    }

    #[test]
    fn selection_moves_destination_to_front_of_recents() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("ID1")]);
        h.store.select_key(&local("ID1").key()).unwrap();
        h.respond_ok("ID1");

        let recents = h.store.recent_destinations();
        assert_eq!(recents[0].id, "ID1");
        assert!(recents[0].capabilities.is_some());
        assert_eq!(recents[1].id, SAVE_AS_PDF_ID);
    }

    #[test]
    fn removing_the_selected_destination_clears_selection() {
        let mut h = Harness::init(InitialSettings::default());
        h.drain();
        let removed = h.store.remove_destination(&pdf_key()).unwrap();
        assert_eq!(removed.id, SAVE_AS_PDF_ID);
        assert!(h.store.selected_destination().is_none());
        assert_eq!(h.drain(), vec![StoreEvent::DestinationSelect { key: None }]);
    }

    #[test]
    fn provisional_destination_must_be_resolved_first() {
        let mut h = Harness::init(InitialSettings::default());
        let mut usb = Destination::new("usb:1234", Origin::Extension, "USB Printer");
        usb.provisional_type = ProvisionalType::NeedsUsbPermission;
        h.store.insert_destinations(vec![usb.clone()]);

        assert!(matches!(
            h.store.select_key(&usb.key()),
            Err(ZielwerkError::ProvisionalNotSelectable(_))
        ));

        let request = h.store.resolve_provisional_destination(&usb.key()).unwrap();
        assert_eq!(
            h.native.calls().last(),
            Some(&NativeCall::GrantExtensionPrinterAccess {
                request,
                provisional_id: "usb:1234".into(),
            })
        );
        h.drain();

        h.store.on_extension_access_granted(
            request,
            Ok(ExtensionDestinationInfo {
                id: "usb:1234".into(),
                name: "USB Printer".into(),
                extension_id: "ext-id".into(),
                extension_name: "USB Printing".into(),
                description: None,
                provisional: false,
            }),
        );

        let resolved = h.store.destination(&usb.key()).unwrap();
        assert!(!resolved.is_provisional());
        assert!(h.drain().contains(&StoreEvent::ProvisionalDestinationResolved {
            provisional: usb.key(),
            resolved: Some(usb.key()),
        }));
        h.store.select_key(&usb.key()).unwrap();
    }

    #[test]
    fn denied_access_keeps_provisional_entry() {
        let mut h = Harness::init(InitialSettings::default());
        let mut usb = Destination::new("usb:1234", Origin::Extension, "USB Printer");
        usb.provisional_type = ProvisionalType::NeedsUsbPermission;
        h.store.insert_destinations(vec![usb.clone()]);
        let request = h.store.resolve_provisional_destination(&usb.key()).unwrap();

        h.store.on_extension_access_granted(request, Err("user declined".into()));

        assert!(h.store.destination(&usb.key()).unwrap().is_provisional());
        assert!(matches!(
            h.store.resolve_provisional_destination(&local("ID1").key()),
            Err(ZielwerkError::UnknownDestination(_))
        ));
    }

    #[test]
    fn cloud_reply_under_another_account_completes_the_requested_entry() {
        let mut h = Harness::init(InitialSettings::default());
        let office = Destination::new("cloud-1", Origin::Profile, "Office");
        h.store.select_destination(office.clone()).unwrap();
        let request = h.cloud.last_printer_request("cloud-1").unwrap();

        h.store.on_cloud_printer_done(
            request,
            office
                .clone()
                .with_account("user1@example.com")
                .with_capabilities(Capabilities::pdf()),
        );

        assert_eq!(
            h.store.selection_state(),
            &SelectionState::Selected { key: office.key() }
        );
        assert!(h.store.selected_destination().unwrap().capabilities.is_some());
        assert_eq!(h.store.destinations(None).len(), 2);
    }

    #[test]
    fn cloud_reply_without_capabilities_reverts_selection() {
        let mut h = Harness::init(InitialSettings::default());
        let office = Destination::new("cloud-1", Origin::Profile, "Office");
        h.store.select_destination(office.clone()).unwrap();
        let request = h.cloud.last_printer_request("cloud-1").unwrap();
        h.drain();

        h.store.on_cloud_printer_done(request, office);

        assert_eq!(h.selected_id(), Some(SAVE_AS_PDF_ID));
        let events = h.drain();
        assert!(events.contains(&StoreEvent::Error(StoreErrorKind::Invalid)));
        assert_eq!(ready_count(&events, &pdf_key()), 1);
    }

    #[test]
    fn unreachable_recent_cloud_printer_falls_through_to_local_recent() {
        let mut h = Harness::init(InitialSettings {
            recent_destinations: vec![
                RecentDestination {
                    account: "user1@example.com".into(),
                    ..RecentDestination::new("cloud-1", Origin::Cookies)
                },
                RecentDestination::new("ID2", Origin::Local),
            ],
            ..Default::default()
        });
        assert!(h.native.capability_requests().is_empty());

        let request = h.cloud.last_printer_request("cloud-1").unwrap();
        h.store.on_cloud_printer_failed(request, "printer offline".into());
        h.respond_ok("ID2");

        assert_eq!(h.selected_id(), Some("ID2"));
        assert!(!h.drain().iter().any(|e| matches!(e, StoreEvent::Error(_))));
    }

    #[test]
    fn failed_cloud_search_settles_and_may_be_retried() {
        let mut h = Harness::new();
        h.store.start_load_cloud_destinations(None);
        assert!(h.store.is_print_destination_search_in_progress());

        h.store.on_cloud_search_failed(None, "network error".into());
        assert!(!h.store.is_print_destination_search_in_progress());
        assert!(h
            .drain()
            .contains(&StoreEvent::DestinationSearchDone(SearchScope::Cloud { account: None })));

        h.store.start_load_cloud_destinations(None);
        assert_eq!(h.cloud.searches(), vec![None, None]);
    }

    #[test]
    fn kiosk_with_failed_local_search_reports_no_destinations() {
        let mut h = Harness::init(kiosk());
        h.store.on_printers_failed(PrinterType::Local, "cups unavailable".into());

        assert_eq!(
            h.store.selection_state(),
            &SelectionState::Error(StoreErrorKind::NoDestinations)
        );
        assert!(h.store.is_idle());
    }

    #[test]
    fn cloud_print_attached_after_init_is_searched() {
        let native = NativeLayerStub::new();
        let cloud = CloudPrintStub::new();
        let mut store = DestinationStore::new(Box::new(native.clone()), StoreConfig::default());
        store.init(InitialSettings::default()).unwrap();
        store.start_load_cloud_destinations(None);
        assert!(!store.is_print_destination_search_in_progress());

        store.set_cloud_print_interface(Box::new(cloud.clone()));
        store.start_load_cloud_destinations(None);

        assert_eq!(cloud.searches(), vec![None]);
        assert!(store.is_print_destination_search_in_progress());
    }

    #[test]
    fn reply_for_destination_removed_while_selecting_is_dropped() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.insert_destinations(vec![local("ID1")]);
        h.store.select_key(&local("ID1").key()).unwrap();
        assert!(matches!(
            h.store.selection_state(),
            SelectionState::Selecting { .. }
        ));

        h.store.remove_destination(&local("ID1").key());
        h.drain();
        h.respond_ok("ID1");

        assert!(h.store.destination(&local("ID1").key()).is_none());
        assert_eq!(h.store.selection_state(), &SelectionState::Unselected);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn chosen_print_servers_are_limited_to_configured_ones() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.load_print_servers_config();
        assert_eq!(h.native.calls().last(), Some(&NativeCall::GetPrintServersConfig));
        assert!(!h.store.is_idle());

        h.store.on_print_servers_changed(servers(&["server-1", "server-2"], false));
        assert!(h.store.is_idle());
        h.store.choose_print_servers(&[
            "server-2".to_string(),
            "unknown".to_string(),
            "server-2".to_string(),
        ]);

        assert_eq!(h.store.chosen_print_servers().to_vec(), vec!["server-2".to_string()]);
        assert_eq!(
            h.native.calls().last(),
            Some(&NativeCall::ChoosePrintServers(vec!["server-2".to_string()]))
        );
    }

    #[test]
    fn single_server_mode_keeps_only_the_first_choice() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.on_print_servers_changed(servers(&["server-1", "server-2"], true));
        h.store
            .choose_print_servers(&["server-2".to_string(), "server-1".to_string()]);

        assert_eq!(h.store.chosen_print_servers().to_vec(), vec!["server-2".to_string()]);
    }

    #[test]
    fn print_servers_changed_drops_servers_no_longer_configured() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.on_print_servers_changed(servers(&["server-1", "server-2"], false));
        h.store
            .choose_print_servers(&["server-1".to_string(), "server-2".to_string()]);
        h.drain();

        let updated = servers(&["server-2"], false);
        h.store.on_print_servers_changed(updated.clone());

        assert_eq!(h.store.chosen_print_servers().to_vec(), vec!["server-2".to_string()]);
        assert_eq!(h.store.print_servers(), &updated);
        assert_eq!(h.drain(), vec![StoreEvent::PrintServersChanged(updated)]);
    }

    #[test]
    fn server_printers_loading_is_tracked_as_a_search() {
        let mut h = Harness::init(InitialSettings::default());
        h.store.on_print_servers_changed(servers(&["server-1"], false));
        h.store.choose_print_servers(&["server-1".to_string()]);

        h.store.on_server_printers_loading(true);
        assert!(h.store.is_server_printers_loading());
        assert!(!h.store.is_idle());

        h.store
            .on_printers_added(PrinterType::Local, vec![local_info("ServerDevice", "Floor 2")]);
        h.store.on_server_printers_loading(false);

        assert!(!h.store.is_server_printers_loading());
        assert!(h.store.destination(&local("ServerDevice").key()).is_some());
        let events = h.drain();
        assert!(events.contains(&StoreEvent::DestinationSearchStarted(SearchScope::PrintServers)));
        assert!(events.contains(&StoreEvent::DestinationSearchDone(SearchScope::PrintServers)));
    }
}
