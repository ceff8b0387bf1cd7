// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zielwerk bridge: printer provider abstractions.
//
// The destination store never enumerates printers itself. It asks a
// `NativeLayer` (OS, privet and extension printers) and an optional
// `CloudPrintInterface`, and is told about results later. The `stub` module
// provides recording doubles used by tests and by headless runs.

pub mod stub;
pub mod traits;

pub use stub::{CloudCall, CloudPrintStub, NativeCall, NativeLayerStub};
pub use traits::{CloudPrintInterface, NativeLayer};
