// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-crate tracing targets, declared at link time, and the subscriber setup built from them.

pub mod control;
pub mod display;
pub mod targets;

// re-exports
pub use control::{TraceCtl, TraceCtlError};
pub use tracing::level_filters::LevelFilter;
