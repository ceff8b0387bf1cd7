// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the print destination picker.
//
// Every error the UI may have to show is mapped to plain English with a clear
// suggestion. Severity drives whether the UI offers a retry.

use crate::error::ZielwerkError;
use crate::types::StoreErrorKind;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Provider hiccup; trying again may work.
    Transient,
    /// User must do something (pick another printer, sign in, plug in USB).
    ActionRequired,
    /// Cannot be fixed by retrying or user action.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same action can help.
    pub retriable: bool,
    pub severity: Severity,
}

/// Message for an error event emitted by the destination store.
pub fn humanize_store_error(kind: StoreErrorKind) -> HumanError {
    match kind {
        StoreErrorKind::Invalid => HumanError {
            message: "The selected printer is not available or not installed correctly.".into(),
            suggestion: "Check your printers or try selecting another printer.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
        StoreErrorKind::NoDestinations => HumanError {
            message: "No printers were found.".into(),
            suggestion: "Make sure a printer is installed and turned on, then open the print dialog again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
    }
}

/// Convert a `ZielwerkError` into a `HumanError`.
pub fn humanize_error(err: &ZielwerkError) -> HumanError {
    match err {
        ZielwerkError::NotInitialized | ZielwerkError::AlreadyInitialized => HumanError {
            message: "The print dialog isn't ready yet.".into(),
            suggestion: "Close the print dialog and open it again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ZielwerkError::UnknownDestination(key) => HumanError {
            message: "That printer is no longer available.".into(),
            suggestion: format!("Choose a different printer from the list. ({})", key.id),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ZielwerkError::ProvisionalNotSelectable(_) | ZielwerkError::NotProvisional(_) => HumanError {
            message: "This printer needs permission before it can be used.".into(),
            suggestion: "Allow the extension to use the USB printer, then select it again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ZielwerkError::InvalidSelectionRules(_) => HumanError {
            message: "The default printer setting from your administrator couldn't be read.".into(),
            suggestion: "Choose a printer yourself. Your administrator may need to fix the printer policy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ZielwerkError::UnsupportedAppStateVersion(_) | ZielwerkError::Serialization(_) => HumanError {
            message: "Your recent printers couldn't be restored.".into(),
            suggestion: "Pick a printer again; it will be remembered next time.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ZielwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to save your printer choice.".into(),
                    suggestion: "Check the permissions of the app's data folder.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }
    }
}
