//! # Printer Backends
//!
//! A backend is one concrete mechanism for getting text onto paper. Three
//! exist, differing in connection model, command protocol, and
//! availability:
//!
//! | Backend | Transport | Encoding |
//! |---------|-----------|----------|
//! | [`thermal`] | USB bulk transfer | ESC/POS |
//! | [`spooler`] | OS print service (CUPS) | markup document |
//! | [`integrated`] | vendor capability | pass-through text |
//!
//! All three implement the [`PrinterBackend`] contract. Backends never call
//! each other; the dispatch coordinator walks them in fallback order and
//! each reports only a boolean outcome plus a diagnostic string.
//!
//! ## Failure Containment
//!
//! No backend operation panics or propagates an error. Every failure is
//! recovered locally and collapsed to `false` with a stored diagnostic, so
//! a dead printer can never take the dispatch loop down with it.

pub mod integrated;
pub mod spooler;
pub mod thermal;

pub use integrated::IntegratedBackend;
pub use spooler::SpoolerBackend;
pub use thermal::ThermalBackend;

use std::fmt;
use std::str::FromStr;

/// Identity of a concrete backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// USB thermal receipt printer (ESC/POS over bulk transfer)
    Thermal,
    /// OS print spooler (rendered markup document)
    Spooler,
    /// Vendor-integrated printer (probed capability)
    Integrated,
}

impl BackendKind {
    /// Fixed fallback priority: integrated first, thermal last.
    ///
    /// The dispatch coordinator appends these (minus the preferred backend)
    /// after the preferred backend, so the attempt order is always
    /// predictable for a given preference.
    pub const PRIORITY: [BackendKind; 3] = [
        BackendKind::Integrated,
        BackendKind::Spooler,
        BackendKind::Thermal,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Thermal => "thermal",
            BackendKind::Spooler => "spooler",
            BackendKind::Integrated => "integrated",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thermal" => Ok(BackendKind::Thermal),
            "spooler" => Ok(BackendKind::Spooler),
            "integrated" => Ok(BackendKind::Integrated),
            other => Err(format!(
                "unknown backend '{}' (expected thermal, spooler, or integrated)",
                other
            )),
        }
    }
}

/// Connection lifecycle of a backend.
///
/// Transitions are owned exclusively by the backend instance itself; the
/// coordinator only ever reads the state through [`PrinterBackend::is_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No device or service bound. The initial and post-failure state.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Device or service bound; submissions are allowed.
    Ready,
    /// A connection attempt failed in a way worth distinguishing from
    /// plain disconnection (diagnostic holds the detail).
    Error,
}

/// # Printer Backend Contract
///
/// Uniform operations across all backend variants. One instance per kind
/// exists for the process lifetime, owned by the dispatch coordinator.
///
/// ## Contract
///
/// - `connect` is idempotent: calling it on an already-`Ready` backend is
///   a no-op returning `true`, with no additional hardware calls.
/// - `submit` requires `is_ready()`; when not ready it returns `false`
///   without attempting any I/O. This is a deliberate precondition, not an
///   implicit retry: one `submit` call is single-shot and side-effect
///   bounded, and callers must `connect` first.
/// - A transport failure during `submit` forces the state back to
///   `Disconnected`, never silently stays `Ready`.
/// - `disconnect` is safe from any state, including never-connected, and
///   releases all held OS/hardware resources.
pub trait PrinterBackend: Send {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Current connection state. Pure read, no I/O.
    fn state(&self) -> ConnectionState;

    /// Attempt to reach `Ready`. Never panics; all failures collapse to
    /// `false` plus a stored diagnostic.
    fn connect(&mut self) -> bool;

    /// Whether a submission may be attempted right now. Pure read, O(1).
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Render and deliver one text payload. Requires `is_ready()`.
    fn submit(&mut self, text: &str) -> bool;

    /// Release all resources. Idempotent, safe from any state.
    fn disconnect(&mut self);

    /// Diagnostic detail from the most recent failed operation, or a
    /// status note from the most recent successful one.
    fn last_diagnostic(&self) -> &str;
}

// ============================================================================
// TESTS
// ============================================================================
