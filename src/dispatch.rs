//! # Dispatch Coordinator
//!
//! Owns the three printer backends and runs the fallback algorithm for
//! each print request.
//!
//! ## Fallback Order
//!
//! The attempt order is the preferred backend followed by the remaining
//! backends in fixed priority (`integrated > spooler > thermal`, see
//! [`BackendKind::PRIORITY`]), each kind at most once. Given the same
//! preference and the same backend readiness, the order is always the
//! same — callers can predict which backend is tried second and third.
//!
//! ## Failure Model
//!
//! Every backend failure is non-fatal: the coordinator records the attempt
//! and advances the chain. Only exhaustion of the entire chain surfaces to
//! the caller, as an aggregate outcome carrying every attempt's
//! diagnostic. A failed dispatch leaves all backends in a well-defined
//! (possibly `Disconnected`) state, ready for the next request.
//!
//! ## Serialization
//!
//! Each backend sits behind its own mutex. Concurrent dispatches serialize
//! per backend, so two requests can never interleave bulk transfers on the
//! same USB endpoint; dispatches touching different backends still
//! overlap.

use std::sync::Mutex;

use tracing::{info, info_span};
use uuid::Uuid;

use crate::backend::{BackendKind, PrinterBackend};

/// One inbound print request.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    /// UTF-8 text payload, opaque to the coordinator.
    pub payload: String,
    /// Backend to try first.
    pub preferred: BackendKind,
    /// Correlation id for diagnostics and logging only; never persisted.
    pub correlation_id: Uuid,
}

impl PrintRequest {
    /// Create a request with a fresh correlation id.
    pub fn new(payload: impl Into<String>, preferred: BackendKind) -> Self {
        Self {
            payload: payload.into(),
            preferred,
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// Record of one backend attempt during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub kind: BackendKind,
    pub succeeded: bool,
    /// Failure diagnostic; empty on success.
    pub reason: String,
}

/// Aggregate result of one dispatch.
///
/// `attempts` is append-only during the dispatch and its order equals the
/// fallback chain actually walked. `succeeded` is true iff the last
/// attempt succeeded.
#[derive(Debug, Clone)]
pub struct PrintOutcome {
    pub succeeded: bool,
    pub backend_used: Option<BackendKind>,
    pub attempts: Vec<Attempt>,
}

impl PrintOutcome {
    /// Diagnostic of the last attempt, for failure reporting upward.
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.attempts.last().map(|attempt| attempt.reason.as_str())
    }

    /// Render the attempt chain for logs and error bodies, e.g.
    /// `thermal: no devices; spooler: ok`.
    pub fn describe(&self) -> String {
        self.attempts
            .iter()
            .map(|attempt| {
                if attempt.succeeded {
                    format!("{}: ok", attempt.kind)
                } else {
                    format!("{}: {}", attempt.kind, attempt.reason)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// One slot in the coordinator: the backend plus its serialization lock.
struct Slot {
    kind: BackendKind,
    backend: Mutex<Box<dyn PrinterBackend>>,
}

/// # Dispatch Coordinator
///
/// Holds the ordered backend list and runs the fallback algorithm. The
/// backends are injected at construction; the coordinator is the sole
/// owner and only ever reads their state through `is_ready()`.
pub struct Dispatcher {
    slots: Vec<Slot>,
}

impl Dispatcher {
    /// Build a coordinator over the given backends.
    ///
    /// Backends missing from the list are simply never attempted; the
    /// production bootstrap always passes all three kinds.
    pub fn new(backends: Vec<Box<dyn PrinterBackend>>) -> Self {
        let slots = backends
            .into_iter()
            .map(|backend| Slot {
                kind: backend.kind(),
                backend: Mutex::new(backend),
            })
            .collect();
        Self { slots }
    }

    /// The deterministic attempt order for a given preference.
    pub fn attempt_order(preferred: BackendKind) -> Vec<BackendKind> {
        let mut order = vec![preferred];
        order.extend(
            BackendKind::PRIORITY
                .into_iter()
                .filter(|kind| *kind != preferred),
        );
        order
    }

    /// Walk the fallback chain for one request.
    ///
    /// Blocking: returns only on terminal success or chain exhaustion. A
    /// caller wanting a time bound imposes its own deadline around the
    /// whole call.
    pub fn dispatch(&self, request: &PrintRequest) -> PrintOutcome {
        let span = info_span!("dispatch", id = %request.correlation_id);
        let _guard = span.enter();

        let mut attempts = Vec::new();

        for kind in Self::attempt_order(request.preferred) {
            let Some(slot) = self.slots.iter().find(|slot| slot.kind == kind) else {
                continue;
            };

            // A backend that panicked mid-operation poisons its lock;
            // its state machine still guarantees a defined state, so the
            // lock is recovered rather than propagating the poison.
            let mut backend = match slot.backend.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if !backend.is_ready() {
                backend.connect();
            }

            if !backend.is_ready() {
                let reason = if backend.last_diagnostic().is_empty() {
                    "not ready".to_string()
                } else {
                    backend.last_diagnostic().to_string()
                };
                info!(backend = %kind, %reason, "backend unavailable, advancing chain");
                attempts.push(Attempt {
                    kind,
                    succeeded: false,
                    reason,
                });
                continue;
            }

            let succeeded = backend.submit(&request.payload);
            let reason = if succeeded {
                String::new()
            } else {
                backend.last_diagnostic().to_string()
            };
            attempts.push(Attempt {
                kind,
                succeeded,
                reason,
            });

            if succeeded {
                info!(backend = %kind, "print request served");
                return PrintOutcome {
                    succeeded: true,
                    backend_used: Some(kind),
                    attempts,
                };
            }

            info!(backend = %kind, "submission failed, advancing chain");
        }

        info!("fallback chain exhausted");
        PrintOutcome {
            succeeded: false,
            backend_used: None,
            attempts,
        }
    }

    /// Release every backend's resources. Runs once at process shutdown;
    /// safe regardless of connection state.
    pub fn disconnect_all(&self) {
        for slot in &self.slots {
            let mut backend = match slot.backend.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            backend.disconnect();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
