//! # Vendor-Integrated Backend
//!
//! POS terminals with a built-in printer expose it through wildly different
//! vendor APIs. This backend probes for a usable one at construction and
//! passes text straight through to whatever it finds.
//!
//! ## Probe Registry
//!
//! Probes run once, in fixed order, stopping at the first success:
//!
//! 1. **Service**: a vendor print daemon listening on a known Unix socket
//! 2. **Broadcast**: a spool drop directory watched by a vendor component
//! 3. **Driver**: a vendor print tool found by name on `PATH`
//!
//! Each probe is independent; failure of one never prevents the next. When
//! all three come up empty the backend stays `Disconnected` for the whole
//! process lifetime — there is no periodic re-probe, because vendor
//! hardware does not appear at runtime.
//!
//! The search paths live in [`ProbeConfig`]: the exact per-vendor protocol
//! is a configurable extension point, not hardcoded behavior. The defaults
//! cover common POS conventions and are expected to be replaced per target
//! hardware.
//!
//! ## Best-Effort Contract
//!
//! `submit` prefers direct invocation of the resolved capability and falls
//! back to the broadcast drop directory when the direct path fails. It
//! never panics; like every backend, failure is `false` plus a diagnostic.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendKind, ConnectionState, PrinterBackend};
use crate::error::RemitoError;

// ============================================================================
// CAPABILITIES AND PROBES
// ============================================================================

/// A resolved way of reaching the vendor printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Vendor print daemon socket; payloads are written to it directly.
    Service(PathBuf),
    /// Spool drop directory; payloads are broadcast as files.
    Broadcast(PathBuf),
    /// Vendor print tool; payloads are piped to its stdin.
    Driver(PathBuf),
}

/// Search paths for the capability probes.
///
/// Replace these per target hardware; the defaults cover common POS
/// terminal conventions.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Candidate vendor daemon sockets, tried in order.
    pub service_sockets: Vec<PathBuf>,
    /// Candidate spool drop directories, tried in order.
    pub broadcast_dirs: Vec<PathBuf>,
    /// Vendor tool names searched on `PATH`, tried in order.
    pub driver_names: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            service_sockets: vec![
                PathBuf::from("/run/vendor-printer.sock"),
                PathBuf::from("/var/run/pos/printer.sock"),
            ],
            broadcast_dirs: vec![PathBuf::from("/var/spool/pos-print")],
            driver_names: vec![
                "sunmi-printer".to_string(),
                "pos-print".to_string(),
                "vendor-print".to_string(),
            ],
        }
    }
}

/// One entry in the probe registry.
struct Probe {
    name: &'static str,
    run: fn(&ProbeConfig) -> Option<Capability>,
}

/// The registry, in probe order. First success wins.
const PROBES: [Probe; 3] = [
    Probe { name: "vendor service socket", run: probe_service },
    Probe { name: "broadcast drop directory", run: probe_broadcast },
    Probe { name: "vendor driver tool", run: probe_driver },
];

fn probe_service(config: &ProbeConfig) -> Option<Capability> {
    config
        .service_sockets
        .iter()
        .find(|path| path.exists())
        .map(|path| Capability::Service(path.clone()))
}

fn probe_broadcast(config: &ProbeConfig) -> Option<Capability> {
    config
        .broadcast_dirs
        .iter()
        .find(|path| path.is_dir())
        .map(|path| Capability::Broadcast(path.clone()))
}

fn probe_driver(config: &ProbeConfig) -> Option<Capability> {
    let path_var = std::env::var_os("PATH")?;
    let dirs: Vec<PathBuf> = std::env::split_paths(&path_var).collect();
    locate_driver(&config.driver_names, &dirs).map(Capability::Driver)
}

/// Search the given directories for the first matching tool name.
fn locate_driver(names: &[String], dirs: &[PathBuf]) -> Option<PathBuf> {
    for name in names {
        for dir in dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

// ============================================================================
// BACKEND
// ============================================================================

/// # Integrated Printer Backend
///
/// See the module documentation for the probe registry and the best-effort
/// contract.
pub struct IntegratedBackend {
    state: ConnectionState,
    diagnostic: String,
    config: ProbeConfig,
    capability: Option<Capability>,
}

impl IntegratedBackend {
    /// Probe with the default search paths.
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Probe with custom search paths. Probing happens here, once.
    pub fn with_config(config: ProbeConfig) -> Self {
        let mut capability = None;

        for probe in &PROBES {
            match (probe.run)(&config) {
                Some(found) => {
                    info!(probe = probe.name, capability = ?found, "vendor capability detected");
                    capability = Some(found);
                    break;
                }
                None => debug!(probe = probe.name, "probe found nothing"),
            }
        }

        let (state, diagnostic) = match &capability {
            Some(_) => (ConnectionState::Ready, String::new()),
            None => (
                ConnectionState::Disconnected,
                RemitoError::UnsupportedHost(
                    "no vendor printer capability detected".to_string(),
                )
                .to_string(),
            ),
        };

        Self {
            state,
            diagnostic,
            config,
            capability,
        }
    }

    /// The capability the probes resolved, if any.
    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }

    /// Direct invocation of a resolved capability.
    fn invoke(capability: &Capability, text: &str) -> Result<(), RemitoError> {
        match capability {
            Capability::Service(socket) => {
                let mut stream = UnixStream::connect(socket).map_err(|e| {
                    RemitoError::TransportFailure(format!(
                        "vendor service connect failed: {}",
                        e
                    ))
                })?;
                stream.write_all(text.as_bytes()).map_err(|e| {
                    RemitoError::TransportFailure(format!("vendor service write failed: {}", e))
                })?;
                stream
                    .shutdown(std::net::Shutdown::Write)
                    .map_err(|e| {
                        RemitoError::TransportFailure(format!(
                            "vendor service shutdown failed: {}",
                            e
                        ))
                    })
            }
            Capability::Broadcast(dir) => broadcast(dir, text),
            Capability::Driver(tool) => {
                let mut child = Command::new(tool)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| {
                        RemitoError::TransportFailure(format!(
                            "vendor tool spawn failed: {}",
                            e
                        ))
                    })?;

                if let Some(stdin) = child.stdin.as_mut() {
                    if let Err(e) = stdin.write_all(text.as_bytes()) {
                        // Reap the child before surfacing the error; a
                        // dropped Child lingers as a zombie.
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(RemitoError::TransportFailure(format!(
                            "vendor tool write failed: {}",
                            e
                        )));
                    }
                }

                let status = child.wait().map_err(|e| {
                    RemitoError::TransportFailure(format!("vendor tool failed: {}", e))
                })?;

                if status.success() {
                    Ok(())
                } else {
                    Err(RemitoError::TransportFailure(format!(
                        "vendor tool exited with {}",
                        status
                    )))
                }
            }
        }
    }
}

/// Drop the payload into a spool directory as its own file.
fn broadcast(dir: &Path, text: &str) -> Result<(), RemitoError> {
    let filename = format!("remito-{}.txt", Uuid::new_v4());
    std::fs::write(dir.join(filename), text)
        .map_err(|e| RemitoError::TransportFailure(format!("broadcast write failed: {}", e)))
}

impl Default for IntegratedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterBackend for IntegratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Integrated
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Ready {
            return true;
        }

        // No re-probe: the capability either resolved at construction or
        // never will on this host.
        match &self.capability {
            Some(_) => {
                self.state = ConnectionState::Ready;
                self.diagnostic.clear();
                true
            }
            None => {
                self.diagnostic = RemitoError::UnsupportedHost(
                    "no vendor printer capability detected".to_string(),
                )
                .to_string();
                false
            }
        }
    }

    fn submit(&mut self, text: &str) -> bool {
        let capability = match &self.capability {
            Some(capability) if self.state == ConnectionState::Ready => capability.clone(),
            _ => {
                self.diagnostic = "not ready".to_string();
                return false;
            }
        };

        match Self::invoke(&capability, text) {
            Ok(()) => {
                info!(capability = ?capability, "integrated job delivered");
                self.diagnostic.clear();
                return true;
            }
            Err(direct_err) => {
                warn!(error = %direct_err, "direct vendor invocation failed");

                // Generic broadcast fallback, unless the direct path was
                // already the broadcast.
                if !matches!(capability, Capability::Broadcast(_)) {
                    if let Some(dir) = self.config.broadcast_dirs.iter().find(|d| d.is_dir()) {
                        match broadcast(dir, text) {
                            Ok(()) => {
                                info!(dir = %dir.display(), "integrated job broadcast");
                                self.diagnostic.clear();
                                return true;
                            }
                            Err(e) => warn!(error = %e, "broadcast fallback failed"),
                        }
                    }
                }

                self.diagnostic = direct_err.to_string();
                self.state = ConnectionState::Disconnected;
                false
            }
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
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn empty_config() -> ProbeConfig {
        ProbeConfig {
            service_sockets: vec![],
            broadcast_dirs: vec![],
            driver_names: vec![],
        }
    }

    #[test]
    fn test_absent_host_stays_disconnected() {
        let mut backend = IntegratedBackend::with_config(empty_config());

        assert_eq!(backend.state(), ConnectionState::Disconnected);
        assert!(backend.capability().is_none());
        assert!(backend.last_diagnostic().contains("Unsupported host"));

        // connect() never re-probes; the host stays unsupported.
        assert!(!backend.connect());
        assert!(!backend.connect());
        assert_eq!(backend.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_submit_on_unsupported_host_is_refused() {
        let mut backend = IntegratedBackend::with_config(empty_config());
        assert!(!backend.submit("receipt"));
        assert_eq!(backend.last_diagnostic(), "not ready");
    }

    #[test]
    fn test_broadcast_probe_resolves_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig {
            service_sockets: vec![],
            broadcast_dirs: vec![dir.path().to_path_buf()],
            driver_names: vec![],
        };

        let backend = IntegratedBackend::with_config(config);
        assert_eq!(
            backend.capability(),
            Some(&Capability::Broadcast(dir.path().to_path_buf()))
        );
        assert!(backend.is_ready());
    }

    #[test]
    fn test_probe_order_prefers_service() {
        // A socket path that exists (any file works for the existence
        // check) must win over a broadcast dir.
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("printer.sock");
        std::fs::write(&socket, b"").unwrap();

        let config = ProbeConfig {
            service_sockets: vec![socket.clone()],
            broadcast_dirs: vec![dir.path().to_path_buf()],
            driver_names: vec![],
        };

        let backend = IntegratedBackend::with_config(config);
        assert_eq!(backend.capability(), Some(&Capability::Service(socket)));
    }

    #[test]
    fn test_broadcast_submit_drops_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig {
            service_sockets: vec![],
            broadcast_dirs: vec![dir.path().to_path_buf()],
            driver_names: vec![],
        };

        let mut backend = IntegratedBackend::with_config(config);
        assert!(backend.submit("TICKET\n"));

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "TICKET\n");
    }

    #[test]
    fn test_failed_direct_path_falls_back_to_broadcast() {
        // Service socket exists as a plain file, so connecting to it as a
        // Unix socket fails; the broadcast dir must catch the job.
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("printer.sock");
        std::fs::write(&socket, b"").unwrap();
        let spool = dir.path().join("spool");
        std::fs::create_dir(&spool).unwrap();

        let config = ProbeConfig {
            service_sockets: vec![socket],
            broadcast_dirs: vec![spool.clone()],
            driver_names: vec![],
        };

        let mut backend = IntegratedBackend::with_config(config);
        assert!(backend.submit("fallback"));
        assert_eq!(std::fs::read_dir(&spool).unwrap().count(), 1);
    }

    /// Count children of this process sitting in state `Z` (exited but
    /// not yet reaped).
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };

        entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .chars()
                    .all(|c| c.is_ascii_digit())
            })
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
            .filter(|stat| {
                // stat is `pid (comm) state ppid ...`; comm may contain
                // spaces, so parse after the closing paren.
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[test]
    fn test_failed_driver_write_reaps_child() {
        use std::os::unix::fs::PermissionsExt;

        // A tool that exits without reading stdin; writing a payload
        // larger than the pipe buffer then fails with a broken pipe.
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("pos-print");
        std::fs::write(&tool, b"#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let payload = "x".repeat(1024 * 1024);
        let result = IntegratedBackend::invoke(&Capability::Driver(tool), &payload);

        assert!(result.is_err());
        assert_eq!(zombie_children(), 0);
    }

    #[test]
    fn test_locate_driver() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("pos-print");
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();

        let names = vec!["sunmi-printer".to_string(), "pos-print".to_string()];
        let dirs = vec![dir.path().to_path_buf()];

        assert_eq!(locate_driver(&names, &dirs), Some(tool));
        assert_eq!(locate_driver(&names, &[]), None);
    }

    #[test]
    fn test_disconnect_then_connect_without_reprobe() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig {
            service_sockets: vec![],
            broadcast_dirs: vec![dir.path().to_path_buf()],
            driver_names: vec![],
        };

        let mut backend = IntegratedBackend::with_config(config);
        assert!(backend.is_ready());

        backend.disconnect();
        assert!(!backend.is_ready());

        // The capability survives disconnection; connect restores Ready.
        assert!(backend.connect());
        assert!(backend.is_ready());
    }
}
