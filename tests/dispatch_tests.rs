//! # Dispatch Scenario Tests
//!
//! End-to-end exercises of the fallback chain through the public API,
//! using scriptable backend doubles. The per-module unit tests cover the
//! individual state machines; these tests cover the contract a caller of
//! [`remito::Dispatcher`] observes.

use remito::backend::{BackendKind, ConnectionState, PrinterBackend};
use remito::dispatch::{Dispatcher, PrintRequest};
use remito::protocol::commands;

use pretty_assertions::assert_eq;

// ============================================================================
// BACKEND DOUBLE
// ============================================================================

/// Scriptable stand-in for a hardware backend.
///
/// `hardware_calls` counts real connection work; idempotent `connect()`
/// calls on a `Ready` backend must not increase it.
struct ScriptedBackend {
    kind: BackendKind,
    state: ConnectionState,
    connect_ok: bool,
    submit_ok: bool,
    diagnostic: String,
    hardware_calls: usize,
}

impl ScriptedBackend {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            state: ConnectionState::Disconnected,
            connect_ok: true,
            submit_ok: true,
            diagnostic: String::new(),
            hardware_calls: 0,
        }
    }

    fn ready(mut self) -> Self {
        self.state = ConnectionState::Ready;
        self
    }

    fn failing_connect(mut self, diagnostic: &str) -> Self {
        self.connect_ok = false;
        self.diagnostic = diagnostic.to_string();
        self
    }
}

impl PrinterBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Ready {
            return true;
        }
        self.hardware_calls += 1;
        if self.connect_ok {
            self.state = ConnectionState::Ready;
            true
        } else {
            self.state = ConnectionState::Disconnected;
            false
        }
    }

    fn submit(&mut self, _text: &str) -> bool {
        if self.state != ConnectionState::Ready {
            self.diagnostic = "not ready".to_string();
            return false;
        }
        if self.submit_ok {
            true
        } else {
            self.state = ConnectionState::Disconnected;
            false
        }
    }

    fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    fn last_diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_thermal_dead_spooler_catches_request() {
    // Preferred thermal backend has no device; the spooler is up. The
    // outcome must show both attempts in walked order.
    let dispatcher = Dispatcher::new(vec![
        Box::new(ScriptedBackend::new(BackendKind::Thermal).failing_connect("no devices"))
            as Box<dyn PrinterBackend>,
        Box::new(ScriptedBackend::new(BackendKind::Spooler).ready()),
    ]);

    let outcome = dispatcher.dispatch(&PrintRequest::new("TRAIN TICKET\n", BackendKind::Thermal));

    assert!(outcome.succeeded);
    assert_eq!(outcome.backend_used, Some(BackendKind::Spooler));
    assert_eq!(outcome.attempts.len(), 2);

    assert_eq!(outcome.attempts[0].kind, BackendKind::Thermal);
    assert!(!outcome.attempts[0].succeeded);
    assert_eq!(outcome.attempts[0].reason, "no devices");

    assert_eq!(outcome.attempts[1].kind, BackendKind::Spooler);
    assert!(outcome.attempts[1].succeeded);
    assert_eq!(outcome.attempts[1].reason, "");
}

#[test]
fn test_full_chain_walk_with_all_three_backends() {
    let dispatcher = Dispatcher::new(vec![
        Box::new(ScriptedBackend::new(BackendKind::Thermal).failing_connect("no devices"))
            as Box<dyn PrinterBackend>,
        Box::new(ScriptedBackend::new(BackendKind::Spooler).ready()),
        Box::new(
            ScriptedBackend::new(BackendKind::Integrated)
                .failing_connect("Unsupported host: no vendor printer capability detected"),
        ),
    ]);

    let outcome = dispatcher.dispatch(&PrintRequest::new("receipt", BackendKind::Thermal));

    // Preferred first, then fixed priority: integrated before spooler.
    let kinds: Vec<_> = outcome.attempts.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BackendKind::Thermal,
            BackendKind::Integrated,
            BackendKind::Spooler
        ]
    );
    assert!(outcome.succeeded);
    assert_eq!(outcome.backend_used, Some(BackendKind::Spooler));
}

#[test]
fn test_connect_is_idempotent_on_ready_backend() {
    let mut backend = ScriptedBackend::new(BackendKind::Thermal);

    assert!(backend.connect());
    assert_eq!(backend.hardware_calls, 1);

    // Already Ready: no additional hardware calls, still true.
    assert!(backend.connect());
    assert!(backend.connect());
    assert_eq!(backend.hardware_calls, 1);
}

#[test]
fn test_exhaustion_reports_every_backend() {
    let dispatcher = Dispatcher::new(vec![
        Box::new(ScriptedBackend::new(BackendKind::Thermal).failing_connect("no devices"))
            as Box<dyn PrinterBackend>,
        Box::new(ScriptedBackend::new(BackendKind::Spooler).failing_connect("scheduler down")),
        Box::new(ScriptedBackend::new(BackendKind::Integrated).failing_connect("no vendor API")),
    ]);

    let outcome = dispatcher.dispatch(&PrintRequest::new("receipt", BackendKind::Integrated));

    assert!(!outcome.succeeded);
    assert_eq!(outcome.backend_used, None);
    assert_eq!(outcome.attempts.len(), 3);
    for kind in BackendKind::PRIORITY {
        assert_eq!(
            outcome.attempts.iter().filter(|a| a.kind == kind).count(),
            1,
            "{} must appear exactly once",
            kind
        );
    }
}

// ============================================================================
// THERMAL FRAMING
// ============================================================================

#[test]
fn test_thermal_submission_framing_is_bit_exact() {
    // The exact transfer sequence for a submission: INIT, ALIGN_LEFT,
    // TEXT_NORMAL, payload, NEW_LINE x2, CUT. Devices interpret these in
    // firmware; the bytes must never drift.
    let frames = commands::job_frames("ABC");

    assert_eq!(
        frames,
        vec![
            vec![0x1B, 0x40],
            vec![0x1B, 0x61, 0x00],
            vec![0x1D, 0x21, 0x00],
            b"ABC".to_vec(),
            vec![0x0A],
            vec![0x0A],
            vec![0x1D, 0x56, 0x41, 0x10],
        ]
    );
}
