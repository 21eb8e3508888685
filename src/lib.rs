// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! AgroLens: crop flood-damage assessment portal
//!
//! Accepts uploaded field photos, classifies flood damage with a pretrained
//! vision model, and renders one-page PDF damage reports alongside a set of
//! static advisory pages.

pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod report;
pub mod storage;
pub mod web;

pub use config::AppConfig;
pub use error::{AgroLensError, Result};
