//! # Printer Protocol Encoding
//!
//! Device-specific encodings for the print backends.
//!
//! ## Modules
//!
//! - [`commands`]: ESC/POS command builders and job framing (thermal)
//! - [`markup`]: ESC/POS to markup translation (spooler)

pub mod commands;
pub mod markup;
