// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Zielwerk destination store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::capabilities::Capabilities;

/// Identifier of the built-in "Save as PDF" destination.
pub const SAVE_AS_PDF_ID: &str = "Save as PDF";

/// Identifier of the built-in "Save to Google Drive" destination.
pub const SAVE_TO_DRIVE_ID: &str = "Save to Drive CrOS";

/// Correlates a provider response with the request that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a destination was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Printer installed in the host OS.
    Local,
    /// Printer managed by the Chrome OS printing stack.
    ChromeOs,
    /// Zeroconf printer on the local network.
    Privet,
    /// Printer provided by a browser extension.
    Extension,
    /// Cloud printer reached through a signed-in account's cookies.
    Cookies,
    /// Cloud printer registered to the device (enterprise enrolment).
    Device,
    /// Cloud printer registered to the browser profile.
    Profile,
}

impl Origin {
    /// Whether destinations of this origin come from cloud print.
    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::Cookies | Self::Device | Self::Profile)
    }

    /// Whether destinations of this origin are owned by the host machine.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local | Self::ChromeOs)
    }

    /// The provider responsible for destinations of this origin.
    pub fn printer_type(&self) -> PrinterType {
        match self {
            Self::Local | Self::ChromeOs => PrinterType::Local,
            Self::Privet => PrinterType::Privet,
            Self::Extension => PrinterType::Extension,
            Self::Cookies | Self::Device | Self::Profile => PrinterType::Cloud,
        }
    }

    /// Wire name, as used in persisted app state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ChromeOs => "chrome_os",
            Self::Privet => "privet",
            Self::Extension => "extension",
            Self::Cookies => "cookies",
            Self::Device => "device",
            Self::Profile => "profile",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider categories the store can ask for printers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterType {
    Local,
    Privet,
    Extension,
    Cloud,
}

impl PrinterType {
    /// Providers enumerated through the native layer (everything but cloud).
    pub const NATIVE: [PrinterType; 3] = [Self::Local, Self::Privet, Self::Extension];
}

impl std::fmt::Display for PrinterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Privet => "privet",
            Self::Extension => "extension",
            Self::Cloud => "cloud",
        };
        f.write_str(name)
    }
}

/// Reachability of a destination as last reported by its provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Online,
    Offline,
    /// Provider did not say.
    #[default]
    Unknown,
}

/// Extra step needed before a destination can be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionalType {
    #[default]
    None,
    /// An extension must be granted access to a USB device first.
    NeedsUsbPermission,
}

/// Error kinds surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// The selected destination could not be used (capabilities unavailable).
    Invalid,
    /// Every provider settled without reporting a usable destination.
    NoDestinations,
}

/// Stable identity of a destination inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationKey {
    pub id: String,
    pub origin: Origin,
    pub account: Option<String>,
}

impl DestinationKey {
    /// Build a key. An empty account is treated as no account.
    pub fn new(id: impl Into<String>, origin: Origin, account: Option<&str>) -> Self {
        Self {
            id: id.into(),
            origin,
            account: account.filter(|a| !a.is_empty()).map(String::from),
        }
    }
}

impl std::fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.origin,
            self.id,
            self.account.as_deref().unwrap_or("")
        )
    }
}

/// One addressable print target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub origin: Origin,
    /// Signed-in account, only for cloud destinations.
    pub account: Option<String>,
    pub display_name: String,
    pub description: Option<String>,
    pub connection_status: ConnectionStatus,
    /// `None` until fetched from the provider.
    pub capabilities: Option<Capabilities>,
    /// The signed-in user owns this printer.
    pub is_owned: bool,
    /// Configured by enterprise policy.
    pub is_enterprise_managed: bool,
    pub provisional_type: ProvisionalType,
    /// Matches an entry of the recent destinations list.
    pub is_recent: bool,
    pub extension_id: Option<String>,
    pub extension_name: Option<String>,
}

impl Destination {
    pub fn new(id: impl Into<String>, origin: Origin, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin,
            account: None,
            display_name: display_name.into(),
            description: None,
            connection_status: ConnectionStatus::Unknown,
            capabilities: None,
            is_owned: false,
            is_enterprise_managed: false,
            provisional_type: ProvisionalType::None,
            is_recent: false,
            extension_id: None,
            extension_name: None,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        let account = account.into();
        self.account = (!account.is_empty()).then_some(account);
        self
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.connection_status = status;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// The built-in PDF sink. Its capabilities are known up front.
    pub fn save_as_pdf() -> Self {
        Self::new(SAVE_AS_PDF_ID, Origin::Local, "Save as PDF")
            .with_status(ConnectionStatus::Online)
            .with_capabilities(Capabilities::pdf())
    }

    /// The built-in Google Drive sink, present when Drive is mounted.
    pub fn save_to_drive() -> Self {
        Self::new(SAVE_TO_DRIVE_ID, Origin::Local, "Save to Google Drive")
            .with_status(ConnectionStatus::Online)
            .with_capabilities(Capabilities::pdf())
    }

    pub fn key(&self) -> DestinationKey {
        DestinationKey::new(self.id.clone(), self.origin, self.account.as_deref())
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional_type != ProvisionalType::None
    }

    /// PDF and Drive sinks: not real printers.
    pub fn is_virtual(&self) -> bool {
        self.origin == Origin::Local && (self.id == SAVE_AS_PDF_ID || self.id == SAVE_TO_DRIVE_ID)
    }

    pub fn is_offline(&self) -> bool {
        self.connection_status == ConnectionStatus::Offline
    }

    /// Merge a fresher report of the same destination into this one.
    ///
    /// Returns whether anything changed. An `Unknown` status or missing
    /// capabilities never overwrite known values; `is_recent` is sticky.
    pub fn merge_from(&mut self, incoming: &Destination) -> bool {
        let before = self.clone();

        self.display_name.clone_from(&incoming.display_name);
        self.description.clone_from(&incoming.description);
        self.is_owned = incoming.is_owned;
        self.is_enterprise_managed = incoming.is_enterprise_managed;
        self.provisional_type = incoming.provisional_type;
        self.is_recent |= incoming.is_recent;
        if incoming.extension_id.is_some() {
            self.extension_id.clone_from(&incoming.extension_id);
            self.extension_name.clone_from(&incoming.extension_name);
        }
        if incoming.connection_status != ConnectionStatus::Unknown {
            self.connection_status = incoming.connection_status;
        }
        if incoming.capabilities.is_some() {
            self.capabilities.clone_from(&incoming.capabilities);
        }

        *self != before
    }
}

/// Lightweight persisted reference to a previously used destination.
///
/// Field names follow the version 2 app-state format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDestination {
    pub id: String,
    pub origin: Origin,
    #[serde(default)]
    pub account: String,
    /// Cached capabilities. Older app states store `0` here; that reads as none.
    #[serde(default, deserialize_with = "lenient_capabilities")]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub extension_id: String,
    #[serde(default)]
    pub extension_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_time: Option<DateTime<Utc>>,
}

impl RecentDestination {
    pub fn new(id: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: id.into(),
            origin,
            account: String::new(),
            capabilities: None,
            display_name: String::new(),
            extension_id: String::new(),
            extension_name: String::new(),
            last_access_time: None,
        }
    }

    /// Snapshot a destination at the moment it was used.
    pub fn from_destination(destination: &Destination, used_at: DateTime<Utc>) -> Self {
        Self {
            id: destination.id.clone(),
            origin: destination.origin,
            account: destination.account.clone().unwrap_or_default(),
            capabilities: destination.capabilities.clone(),
            display_name: destination.display_name.clone(),
            extension_id: destination.extension_id.clone().unwrap_or_default(),
            extension_name: destination.extension_name.clone().unwrap_or_default(),
            last_access_time: Some(used_at),
        }
    }

    pub fn key(&self) -> DestinationKey {
        DestinationKey::new(self.id.clone(), self.origin, Some(&self.account))
    }
}

fn lenient_capabilities<'de, D>(deserializer: D) -> std::result::Result<Option<Capabilities>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

// ---------------------------------------------------------------------------
// Provider payloads
// ---------------------------------------------------------------------------

/// A printer reported by the host OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDestinationInfo {
    pub device_name: String,
    #[serde(default)]
    pub printer_name: String,
    #[serde(default)]
    pub printer_description: Option<String>,
    #[serde(default)]
    pub cups_enterprise_printer: bool,
    #[serde(default)]
    pub printer_options: BTreeMap<String, String>,
}

/// A zeroconf printer found on the local network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivetDestinationInfo {
    pub service_name: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A printer exposed by a browser extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDestinationInfo {
    pub id: String,
    pub name: String,
    pub extension_id: String,
    pub extension_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Needs USB access to be granted before use.
    #[serde(default)]
    pub provisional: bool,
}

/// Any printer record a native provider can push.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterInfo {
    Local(LocalDestinationInfo),
    Privet(PrivetDestinationInfo),
    Extension(ExtensionDestinationInfo),
}

/// Reply to a capabilities request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    /// Printer details, when the provider knows them.
    #[serde(default)]
    pub printer: Option<LocalDestinationInfo>,
    pub capabilities: Capabilities,
}

/// A print server whose printers the host can enumerate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintServer {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Print servers available to the user, as configured by policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintServersConfig {
    #[serde(default)]
    pub print_servers: Vec<PrintServer>,
    /// At most one server may be chosen at a time.
    #[serde(default)]
    pub is_single_server_fetching_mode: bool,
}
