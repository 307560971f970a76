//! # Remito - Receipt Print Dispatch Server
//!
//! Remito accepts a print request (arbitrary UTF-8 text, e.g. a receipt)
//! over HTTP and reliably renders it on exactly one local output device,
//! chosen from three heterogeneous printer backends:
//!
//! - **Thermal**: USB ESC/POS receipt printer, driven over bulk transfer
//! - **Spooler**: the OS print service (CUPS), fed a rendered markup document
//! - **Integrated**: a vendor POS printer reached through probed capabilities
//!
//! A dispatch coordinator tries the preferred backend first and walks the
//! remaining backends in fixed priority order until one succeeds.
//!
//! ## Quick Start
//!
//! ```no_run
//! use remito::{
//!     backend::{BackendKind, IntegratedBackend, PrinterBackend, SpoolerBackend, ThermalBackend},
//!     dispatch::{Dispatcher, PrintRequest},
//! };
//!
//! let backends: Vec<Box<dyn PrinterBackend>> = vec![
//!     Box::new(ThermalBackend::new()),
//!     Box::new(SpoolerBackend::new()),
//!     Box::new(IntegratedBackend::new()),
//! ];
//! let dispatcher = Dispatcher::new(backends);
//!
//! let request = PrintRequest::new("Hello World!\n", BackendKind::Thermal);
//! let outcome = dispatcher.dispatch(&request);
//! println!("printed: {} via {:?}", outcome.succeeded, outcome.backend_used);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | Backend contract and the three implementations |
//! | [`dispatch`] | Fallback-chain coordinator and outcome types |
//! | [`protocol`] | ESC/POS command framing and markup translation |
//! | [`server`] | HTTP ingress |
//! | [`error`] | Error types |

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;

// Re-exports for convenience
pub use backend::{BackendKind, PrinterBackend};
pub use dispatch::{Dispatcher, PrintOutcome, PrintRequest};
pub use error::RemitoError;
