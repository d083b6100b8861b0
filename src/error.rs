//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! Error types for the rollup state tracker.

use displaydoc::Display;
use thiserror::Error;

/// Errors surfaced by the rollup tracker.
///
/// Most operations in this crate are infallible by design (see the error
/// handling section of the design doc): `coarser()` exhaustion is caught
/// internally by the propagation walk and never reaches a caller. This type
/// exists for the handful of paths that can genuinely fail at construction
/// time.
#[non_exhaustive]
#[derive(Display, Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    /// granularity has no coarser level: {0}
    GranularityExhausted(String),
    /// invalid tracker configuration: {0}
    InvalidConfig(String),
}
