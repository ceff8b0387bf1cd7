// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer capabilities in cloud device description (CDD) form.
//
// Providers report what a destination supports as a CDD document:
// `{ "version": "1.0", "printer": { "color": { "option": [...] }, ... } }`.
// Only the sections the store and its consumers look at are typed; anything
// else is kept verbatim so the document round-trips.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// CDD color option type for full colour output.
const STANDARD_COLOR: &str = "STANDARD_COLOR";
const CUSTOM_COLOR: &str = "CUSTOM_COLOR";
const NO_DUPLEX: &str = "NO_DUPLEX";

/// Parsed capabilities document for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub printer: PrinterDescription,
}

fn default_version() -> String {
    "1.0".into()
}

/// The `printer` section of a CDD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterDescription {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_content_type: Vec<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<OptionList<TypedOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<CopiesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collate: Option<CollateCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplex: Option<OptionList<TypedOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_orientation: Option<OptionList<TypedOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_size: Option<OptionList<MediaSizeOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<OptionList<DpiOption>>,
    /// Sections we do not interpret.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub content_type: String,
}

/// `{ "option": [...] }` wrapper used by most CDD sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionList<T> {
    #[serde(default = "Vec::new")]
    pub option: Vec<T>,
}

impl<T> OptionList<T> {
    pub fn new(option: Vec<T>) -> Self {
        Self { option }
    }
}

/// An option identified by a `type` keyword (color, duplex, orientation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedOption {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

impl TypedOption {
    pub fn new(kind: &str, is_default: bool) -> Self {
        Self {
            kind: kind.into(),
            is_default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopiesCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollateCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSizeOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub width_microns: u32,
    pub height_microns: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpiOption {
    pub horizontal_dpi: u32,
    pub vertical_dpi: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

/// Maximum copies assumed when a printer advertises copies without a limit.
pub const DEFAULT_MAX_COPIES: u32 = 999;

impl Capabilities {
    /// Parse a CDD document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Capabilities of the built-in PDF and Drive sinks.
    pub fn pdf() -> Self {
        Self {
            version: default_version(),
            printer: PrinterDescription {
                supported_content_type: vec![ContentType {
                    content_type: "application/pdf".into(),
                }],
                color: Some(OptionList::new(vec![TypedOption::new(STANDARD_COLOR, true)])),
                page_orientation: Some(OptionList::new(vec![
                    TypedOption::new("PORTRAIT", true),
                    TypedOption::new("LANDSCAPE", false),
                    TypedOption::new("AUTO", false),
                ])),
                media_size: Some(OptionList::new(vec![
                    MediaSizeOption {
                        name: Some("NA_LETTER".into()),
                        width_microns: 215_900,
                        height_microns: 279_400,
                        is_default: true,
                        custom_display_name: None,
                    },
                    MediaSizeOption {
                        name: Some("ISO_A4".into()),
                        width_microns: 210_000,
                        height_microns: 297_000,
                        is_default: false,
                        custom_display_name: None,
                    },
                ])),
                ..Default::default()
            },
        }
    }

    /// Whether the printer can print in colour.
    ///
    /// A missing `color` section is read as "unknown, assume yes".
    pub fn supports_color(&self) -> bool {
        match &self.printer.color {
            None => true,
            Some(list) => list
                .option
                .iter()
                .any(|o| o.kind == STANDARD_COLOR || o.kind == CUSTOM_COLOR),
        }
    }

    /// Whether the printer offers any two-sided mode.
    pub fn supports_duplex(&self) -> bool {
        self.printer
            .duplex
            .as_ref()
            .is_some_and(|list| list.option.iter().any(|o| o.kind != NO_DUPLEX))
    }

    /// Largest copy count the printer accepts, `None` when copies are not offered.
    pub fn max_copies(&self) -> Option<u32> {
        self.printer
            .copies
            .as_ref()
            .map(|c| c.max.unwrap_or(DEFAULT_MAX_COPIES))
    }

    /// The media size flagged as default, or the first one listed.
    pub fn default_media(&self) -> Option<&MediaSizeOption> {
        let list = self.printer.media_size.as_ref()?;
        list.option
            .iter()
            .find(|m| m.is_default)
            .or_else(|| list.option.first())
    }
}
