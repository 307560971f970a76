//! # Error Types
//!
//! This module defines error types used throughout the remito library.
//!
//! Backend trait methods deliberately expose a boolean contract (see
//! [`crate::backend::PrinterBackend`]): every failure is recovered at the
//! backend boundary and collapsed to `false` plus a stored diagnostic.
//! `RemitoError` is used by the private fallible helpers behind that
//! boundary, and by the server/bootstrap layers that do propagate errors.

use thiserror::Error;

/// Main error type for remito operations
#[derive(Debug, Error)]
pub enum RemitoError {
    /// Backend was not connected when a submission was attempted
    #[error("Backend not ready: {0}")]
    NotReady(String),

    /// USB transfer error or host print-service invocation failure
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// USB permission was refused or never granted
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// USB enumeration found no candidate printer device
    #[error("No device found: {0}")]
    NoDeviceFound(String),

    /// Capability probing found no vendor printer API on this host
    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
