// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: configuration and app-state persistence, plus a native
// provider that answers from a printer fixture file.

pub mod app_services;
pub mod data_dir;
pub mod fixture;
