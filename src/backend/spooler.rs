//! # OS Spooler Backend
//!
//! Prints through the host's print service (CUPS). The incoming text is
//! translated to a markup document (see [`crate::protocol::markup`]) so
//! that payloads carrying raw ESC/POS styling degrade gracefully on a
//! generic printer, then handed to the scheduler with `lp`.
//!
//! ## Acceptance vs Completion
//!
//! `submit` returns `true` once the scheduler *accepts* the job (an id
//! comes back), not once paper comes out. Completion is tracked
//! asynchronously: the job handle is kept and [`SpoolerBackend::job_state`]
//! polls the scheduler, mapping its report onto [`JobState`]. The dispatch
//! outcome never waits on completion.
//!
//! ## Readiness
//!
//! The scheduler probe (`lpstat -r`) runs once at construction; `connect()`
//! re-runs it, which is cheap and idempotent. The renderer half of the
//! pipeline is the compiled-in markup module and cannot be absent.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::backend::{BackendKind, ConnectionState, PrinterBackend};
use crate::error::RemitoError;
use crate::protocol::markup;

/// Physical attributes for spooled receipt jobs: narrow media, no implicit
/// margins, monochrome, thermal-typical resolution.
const JOB_OPTIONS: [&str; 4] = [
    "media=Custom.58x210mm",
    "fit-to-page",
    "ColorModel=Gray",
    "Resolution=203dpi",
];

/// Title the job carries in the queue.
const JOB_TITLE: &str = "remito-receipt";

// ============================================================================
// JOB TRACKING
// ============================================================================

/// Handle to a job accepted by the scheduler.
///
/// Created on submit, released when the scheduler reports a terminal state
/// or when the backend disconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolerJob {
    /// Scheduler-assigned id, e.g. `Receipts-42`.
    pub id: String,
}

/// Lifecycle of a spooled job, derived from the scheduler's report.
///
/// `Unknown` is the default whenever no mapping applies; the backend
/// never assumes success it cannot observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    Queued,
    Blocked,
    Started,
    Completed,
    Failed,
    Cancelled,
    #[default]
    Unknown,
}

/// Extract the job id from `lp` output.
///
/// The scheduler answers acceptance with a line like
/// `request id is Receipts-42 (1 file(s))`.
fn parse_job_id(output: &str) -> Option<SpoolerJob> {
    let rest = output.split("request id is ").nth(1)?;
    let id = rest.split_whitespace().next()?;
    if id.is_empty() {
        return None;
    }
    Some(SpoolerJob { id: id.to_string() })
}

/// Map a scheduler status report onto [`JobState`].
///
/// The report is the `lpstat` line for the tracked job; keyword matching
/// is deliberately loose because the exact wording varies between
/// scheduler versions.
fn parse_job_state(report: &str) -> JobState {
    let report = report.to_lowercase();

    if report.contains("completed") {
        JobState::Completed
    } else if report.contains("canceled") || report.contains("cancelled") {
        JobState::Cancelled
    } else if report.contains("aborted") || report.contains("error") {
        JobState::Failed
    } else if report.contains("held") {
        JobState::Blocked
    } else if report.contains("processing") || report.contains("printing") {
        JobState::Started
    } else if report.contains("pending") || report.contains("queued") {
        JobState::Queued
    } else {
        JobState::Unknown
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// # Spooler Backend
///
/// See the module documentation for the acceptance/completion split.
pub struct SpoolerBackend {
    state: ConnectionState,
    diagnostic: String,
    job: Option<SpoolerJob>,
}

impl SpoolerBackend {
    /// Create the backend and probe scheduler availability once.
    pub fn new() -> Self {
        let mut backend = Self {
            state: ConnectionState::Disconnected,
            diagnostic: String::new(),
            job: None,
        };
        backend.connect();
        backend
    }

    /// State of the most recently submitted job, polled from the
    /// scheduler. `Unknown` when no job is tracked or the scheduler cannot
    /// be queried.
    pub fn job_state(&self) -> JobState {
        let Some(job) = &self.job else {
            return JobState::Unknown;
        };

        // `-W all` includes completed jobs, which plain `lpstat -o` hides.
        let output = Command::new("lpstat")
            .args(["-W", "all", "-o", &job.id])
            .output();

        match output {
            Ok(out) if out.status.success() => {
                parse_job_state(&String::from_utf8_lossy(&out.stdout))
            }
            _ => JobState::Unknown,
        }
    }

    /// Probe whether the print scheduler is reachable.
    fn probe_scheduler() -> Result<(), RemitoError> {
        let output = Command::new("lpstat").arg("-r").output().map_err(|e| {
            RemitoError::TransportFailure(format!("print service unavailable: {}", e))
        })?;

        let report = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && report.contains("scheduler is running") {
            Ok(())
        } else {
            Err(RemitoError::TransportFailure(
                "print scheduler is not running".to_string(),
            ))
        }
    }

    /// Render the document and hand it to the scheduler.
    fn try_submit(&mut self, text: &str) -> Result<SpoolerJob, RemitoError> {
        let document = markup::render_document(text);

        let mut command = Command::new("lp");
        command.args(["-t", JOB_TITLE]);
        for option in JOB_OPTIONS {
            command.args(["-o", option]);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemitoError::TransportFailure(format!("lp spawn failed: {}", e)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            if let Err(e) = stdin.write_all(document.as_bytes()) {
                // Reap the child before surfacing the error; a dropped
                // Child lingers as a zombie for the process lifetime.
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemitoError::TransportFailure(format!(
                    "lp write failed: {}",
                    e
                )));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| RemitoError::TransportFailure(format!("lp failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemitoError::TransportFailure(format!(
                "job rejected: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_job_id(&stdout).ok_or_else(|| {
            RemitoError::TransportFailure("scheduler returned no job id".to_string())
        })
    }
}

impl Default for SpoolerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterBackend for SpoolerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Spooler
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Ready {
            return true;
        }

        self.state = ConnectionState::Connecting;

        match Self::probe_scheduler() {
            Ok(()) => {
                debug!("print scheduler is running");
                self.state = ConnectionState::Ready;
                self.diagnostic.clear();
                true
            }
            Err(e) => {
                warn!(error = %e, "spooler probe failed");
                self.diagnostic = e.to_string();
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    fn submit(&mut self, text: &str) -> bool {
        if self.state != ConnectionState::Ready {
            self.diagnostic = "not ready".to_string();
            return false;
        }

        match self.try_submit(text) {
            Ok(job) => {
                info!(job = %job.id, "spooler job accepted");
                self.job = Some(job);
                self.diagnostic.clear();
                true
            }
            Err(e) => {
                warn!(error = %e, "spooler submit failed");
                self.diagnostic = e.to_string();
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(job) = self.job.take() {
            debug!(job = %job.id, "releasing tracked spooler job");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn last_diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_job_id() {
        let job = parse_job_id("request id is Receipts-42 (1 file(s))\n");
        assert_eq!(job, Some(SpoolerJob { id: "Receipts-42".to_string() }));
    }

    #[test]
    fn test_parse_job_id_rejects_garbage() {
        assert_eq!(parse_job_id(""), None);
        assert_eq!(parse_job_id("lp: no default destination"), None);
    }

    #[test]
    fn test_job_state_mapping() {
        assert_eq!(parse_job_state("Receipts-42  user  1024  completed at ..."), JobState::Completed);
        assert_eq!(parse_job_state("Receipts-42  user  1024  canceled"), JobState::Cancelled);
        assert_eq!(parse_job_state("Receipts-42  user  1024  aborted"), JobState::Failed);
        assert_eq!(parse_job_state("job is held"), JobState::Blocked);
        assert_eq!(parse_job_state("Receipts-42 processing since ..."), JobState::Started);
        assert_eq!(parse_job_state("Receipts-42 pending"), JobState::Queued);
    }

    #[test]
    fn test_job_state_defaults_to_unknown() {
        assert_eq!(parse_job_state(""), JobState::Unknown);
        assert_eq!(parse_job_state("something unexpected"), JobState::Unknown);
        assert_eq!(JobState::default(), JobState::Unknown);
    }

    #[test]
    fn test_no_tracked_job_is_unknown() {
        let backend = SpoolerBackend {
            state: ConnectionState::Disconnected,
            diagnostic: String::new(),
            job: None,
        };
        assert_eq!(backend.job_state(), JobState::Unknown);
    }

    #[test]
    fn test_submit_without_ready_does_no_io() {
        let mut backend = SpoolerBackend {
            state: ConnectionState::Disconnected,
            diagnostic: String::new(),
            job: None,
        };
        assert!(!backend.submit("receipt"));
        assert_eq!(backend.last_diagnostic(), "not ready");
        assert!(backend.job.is_none());
    }

    #[test]
    fn test_disconnect_never_connected() {
        let mut backend = SpoolerBackend {
            state: ConnectionState::Disconnected,
            diagnostic: String::new(),
            job: None,
        };
        backend.disconnect();
        backend.disconnect();
        assert_eq!(backend.state(), ConnectionState::Disconnected);
    }
}
