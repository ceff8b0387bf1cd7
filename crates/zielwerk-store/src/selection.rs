// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default destination selection rules.
//
// Administrators can set a policy such as
// `{"kind": "local", "namePattern": ".*Bar.*"}` to steer which printer is
// picked when print preview opens. Every field is optional; patterns are
// unanchored regular expressions.

use regex::Regex;
use serde::Deserialize;

use zielwerk_core::error::{Result, ZielwerkError};
use zielwerk_core::types::{Destination, Origin, PrinterType};

const LOCAL_ORIGINS: [Origin; 2] = [Origin::Local, Origin::ChromeOs];
const CLOUD_ORIGINS: [Origin; 3] = [Origin::Cookies, Origin::Device, Origin::Profile];
const ALL_ORIGINS: [Origin; 7] = [
    Origin::Local,
    Origin::ChromeOs,
    Origin::Privet,
    Origin::Extension,
    Origin::Cookies,
    Origin::Device,
    Origin::Profile,
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionRules {
    kind: Option<String>,
    id_pattern: Option<String>,
    name_pattern: Option<String>,
}

/// Compiled predicate over destinations.
#[derive(Debug, Clone)]
pub struct DestinationMatch {
    origins: Vec<Origin>,
    id_pattern: Option<Regex>,
    display_name_pattern: Option<Regex>,
    skip_virtual_destinations: bool,
}

impl DestinationMatch {
    /// Compile serialized selection rules.
    ///
    /// Blank input yields `Ok(None)`; malformed JSON, unknown kinds or
    /// invalid patterns are errors.
    pub fn from_rules_json(json: &str) -> Result<Option<Self>> {
        if json.trim().is_empty() {
            return Ok(None);
        }
        let rules: SelectionRules = serde_json::from_str(json)
            .map_err(|e| ZielwerkError::InvalidSelectionRules(e.to_string()))?;

        let origins = match rules.kind.as_deref() {
            None => ALL_ORIGINS.to_vec(),
            Some("local") => LOCAL_ORIGINS.to_vec(),
            Some("cloud") => CLOUD_ORIGINS.to_vec(),
            Some("privet") => vec![Origin::Privet],
            Some("extension") => vec![Origin::Extension],
            Some(other) => {
                return Err(ZielwerkError::InvalidSelectionRules(format!(
                    "unknown destination kind {other:?}"
                )));
            }
        };

        Ok(Some(Self {
            origins,
            id_pattern: compile(rules.id_pattern.as_deref())?,
            display_name_pattern: compile(rules.name_pattern.as_deref())?,
            skip_virtual_destinations: true,
        }))
    }

    pub fn matches(&self, destination: &Destination) -> bool {
        if self.skip_virtual_destinations && destination.is_virtual() {
            return false;
        }
        if destination.is_provisional() || !self.origins.contains(&destination.origin) {
            return false;
        }
        let id_ok = self
            .id_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&destination.id));
        let name_ok = self
            .display_name_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&destination.display_name));
        id_ok && name_ok
    }

    /// Providers that have to be searched to find a match.
    pub fn printer_types(&self) -> Vec<PrinterType> {
        let mut types: Vec<PrinterType> = self.origins.iter().map(|o| o.printer_type()).collect();
        types.sort();
        types.dedup();
        types
    }
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| ZielwerkError::InvalidSelectionRules(e.to_string())))
        .transpose()
}
