//! # USB Thermal Backend
//!
//! Drives a generic ESC/POS thermal receipt printer over USB bulk
//! transfer.
//!
//! ## Connection State Machine
//!
//! ```text
//! Disconnected
//!   → enumerate USB devices        (fail: "no devices")
//!   → select candidate
//!   → open device                  (fail: "permission denied")
//!   → locate bulk-OUT endpoint     (fail: "no suitable endpoint")
//!   → claim interface              (fail: "claim failed")
//!   → Ready
//! ```
//!
//! Any step failure returns the backend to `Disconnected` with a
//! diagnostic. Connect is idempotent: a `Ready` backend returns `true`
//! immediately without touching the bus again.
//!
//! ## Device Selection Policy
//!
//! No attached device is assumed to be a printer with certainty. Candidates
//! are preferred in this order:
//!
//! 1. Device class 7 (the USB printer class)
//! 2. Device class 0 (class defined per interface — vendor-specific
//!    thermal printers commonly report this)
//! 3. Product string containing a printer hint ("printer", "print", "pos")
//! 4. First enumerated device, best-effort
//!
//! ## Permission Negotiation
//!
//! Opening a device can fail with an access error until the host grants
//! permission, which arrives asynchronously. The grant is modeled as a
//! [`PermissionGate`] channel the backend waits on with a bounded timeout
//! inside `connect()`. Without a grant in time, `connect()` returns
//! `false`; callers poll `is_ready()` after the grant lands and call
//! `connect()` again. This is a documented precondition, not a hidden
//! retry loop.

use std::sync::mpsc;
use std::time::Duration;

use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType};
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, ConnectionState, PrinterBackend};
use crate::error::RemitoError;
use crate::protocol::commands;

/// USB base class code for the printer device class.
const USB_CLASS_PRINTER: u8 = 0x07;

/// USB base class 0: class defined per interface. Vendor-specific thermal
/// printers commonly report this at the device level.
const USB_CLASS_PER_INTERFACE: u8 = 0x00;

/// Product-string fragments that suggest a printer (matched lowercase).
const PRINTER_NAME_HINTS: [&str; 3] = ["printer", "print", "pos"];

/// Timeout for each bulk transfer (milliseconds)
const TRANSFER_TIMEOUT_MS: u64 = 5000;

/// Bounded wait for an asynchronous permission grant during `connect()`
/// (milliseconds). Long enough for an already-answered prompt, short
/// enough that `connect()` stays responsive.
const PERMISSION_WAIT_MS: u64 = 500;

// ============================================================================
// PERMISSION GATE
// ============================================================================

/// Host side of the permission channel.
///
/// The component that owns the OS permission dialog resolves the user's
/// answer through this handle.
pub struct PermissionGranter {
    tx: mpsc::Sender<bool>,
}

impl PermissionGranter {
    /// Report that the user granted device access.
    pub fn grant(&self) {
        // A dropped gate just means the backend stopped waiting.
        let _ = self.tx.send(true);
    }

    /// Report that the user denied device access.
    pub fn deny(&self) {
        let _ = self.tx.send(false);
    }
}

/// Backend side of the permission channel.
///
/// Created in a pair with [`PermissionGranter`] via [`PermissionGate::channel`]
/// and installed on the backend with [`ThermalBackend::with_permission_gate`].
pub struct PermissionGate {
    rx: mpsc::Receiver<bool>,
}

impl PermissionGate {
    /// Create a connected granter/gate pair.
    pub fn channel() -> (PermissionGranter, PermissionGate) {
        let (tx, rx) = mpsc::channel();
        (PermissionGranter { tx }, PermissionGate { rx })
    }

    /// Wait up to `timeout` for a grant decision.
    ///
    /// Returns `Some(granted)` when a decision arrived, `None` on timeout.
    /// A dropped granter counts as a denial.
    fn wait(&self, timeout: Duration) -> Option<bool> {
        match self.rx.recv_timeout(timeout) {
            Ok(granted) => Some(granted),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(false),
        }
    }
}

// ============================================================================
// USB DEVICE BINDING
// ============================================================================

/// Claimed USB binding: open handle, claimed interface, bulk-OUT endpoint.
///
/// Dropping the link closes the handle; [`UsbLink::release`] additionally
/// hands the interface back to the kernel driver if one was detached.
struct UsbLink {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint: u8,
    driver_detached: bool,
}

impl UsbLink {
    /// Release the claimed interface and reattach the kernel driver.
    fn release(self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!(interface = self.interface, error = %e, "interface release failed");
        }
        if self.driver_detached {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!(interface = self.interface, error = %e, "kernel driver reattach failed");
            }
        }
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// # USB Thermal Printer Backend
///
/// See the module documentation for the connection state machine and the
/// device selection policy.
pub struct ThermalBackend {
    state: ConnectionState,
    link: Option<UsbLink>,
    diagnostic: String,
    permission: Option<PermissionGate>,
}

impl ThermalBackend {
    /// Create a disconnected backend with no permission gate installed.
    ///
    /// Without a gate, an access error during `connect()` is immediately a
    /// `permission denied` failure.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            link: None,
            diagnostic: String::new(),
            permission: None,
        }
    }

    /// Install a permission gate for asynchronous access grants.
    pub fn with_permission_gate(mut self, gate: PermissionGate) -> Self {
        self.permission = Some(gate);
        self
    }

    /// Full connection sequence: enumerate, select, open, bind endpoint,
    /// claim interface.
    fn try_connect(&mut self) -> Result<UsbLink, RemitoError> {
        let devices = rusb::devices()
            .map_err(|e| RemitoError::TransportFailure(format!("enumeration failed: {}", e)))?;

        let device = select_device(devices.iter())
            .ok_or_else(|| RemitoError::NoDeviceFound("no devices".to_string()))?;

        let handle = self.open_with_permission(&device)?;

        let (interface, endpoint) = find_bulk_out(&device)
            .ok_or_else(|| RemitoError::TransportFailure("no suitable endpoint".to_string()))?;

        // A kernel usblp driver holding the interface blocks the claim.
        let driver_detached = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                handle.detach_kernel_driver(interface).map_err(|e| {
                    RemitoError::TransportFailure(format!("claim failed: {}", e))
                })?;
                true
            }
            _ => false,
        };

        handle
            .claim_interface(interface)
            .map_err(|e| RemitoError::TransportFailure(format!("claim failed: {}", e)))?;

        info!(interface, endpoint, "thermal printer bound");

        Ok(UsbLink {
            handle,
            interface,
            endpoint,
            driver_detached,
        })
    }

    /// Open the device, negotiating permission when access is refused.
    fn open_with_permission(
        &self,
        device: &Device<GlobalContext>,
    ) -> Result<DeviceHandle<GlobalContext>, RemitoError> {
        match device.open() {
            Ok(handle) => Ok(handle),
            Err(rusb::Error::Access) => {
                let Some(gate) = &self.permission else {
                    return Err(RemitoError::PermissionDenied(
                        "permission denied".to_string(),
                    ));
                };

                debug!("device access refused, waiting on permission gate");
                match gate.wait(Duration::from_millis(PERMISSION_WAIT_MS)) {
                    Some(true) => device.open().map_err(|e| {
                        RemitoError::PermissionDenied(format!("open after grant failed: {}", e))
                    }),
                    Some(false) => {
                        Err(RemitoError::PermissionDenied("permission denied".to_string()))
                    }
                    None => Err(RemitoError::PermissionDenied(
                        "permission pending".to_string(),
                    )),
                }
            }
            Err(e) => Err(RemitoError::TransportFailure(format!("open failed: {}", e))),
        }
    }

    /// Send every frame of the job as its own bulk transfer.
    ///
    /// A transfer error or a zero-byte result aborts the remaining
    /// sequence; the caller must then drop the link and return to
    /// `Disconnected`.
    fn send_frames(link: &UsbLink, frames: &[Vec<u8>]) -> Result<(), RemitoError> {
        let timeout = Duration::from_millis(TRANSFER_TIMEOUT_MS);

        for frame in frames {
            if frame.is_empty() {
                continue;
            }

            let written = link
                .handle
                .write_bulk(link.endpoint, frame, timeout)
                .map_err(|e| {
                    RemitoError::TransportFailure(format!("bulk transfer failed: {}", e))
                })?;

            if written == 0 {
                return Err(RemitoError::TransportFailure(
                    "bulk transfer wrote 0 bytes".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for ThermalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterBackend for ThermalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Thermal
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Ready {
            return true;
        }

        self.state = ConnectionState::Connecting;

        match self.try_connect() {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Ready;
                self.diagnostic.clear();
                true
            }
            Err(e) => {
                warn!(error = %e, "thermal connect failed");
                self.diagnostic = e.to_string();
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    fn submit(&mut self, text: &str) -> bool {
        let frames = commands::job_frames(text);

        let result = match &self.link {
            Some(link) if self.state == ConnectionState::Ready => {
                Self::send_frames(link, &frames)
            }
            _ => {
                self.diagnostic = "not ready".to_string();
                return false;
            }
        };

        match result {
            Ok(()) => {
                info!(bytes = text.len(), "thermal job printed");
                self.diagnostic.clear();
                true
            }
            Err(e) => {
                warn!(error = %e, "thermal submit failed");
                self.diagnostic = e.to_string();
                // The endpoint state is unknown after a failed transfer;
                // force a fresh connection sequence next time.
                if let Some(link) = self.link.take() {
                    link.release();
                }
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.release();
            debug!("thermal printer released");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn last_diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

// ============================================================================
// DEVICE SELECTION
// ============================================================================

/// Pick the most printer-like device from the enumeration.
///
/// See the module documentation for the preference order. Returns `None`
/// only when the bus is empty.
fn select_device<I>(devices: I) -> Option<Device<GlobalContext>>
where
    I: Iterator<Item = Device<GlobalContext>>,
{
    let mut first: Option<Device<GlobalContext>> = None;
    let mut class_match: Option<Device<GlobalContext>> = None;
    let mut vendor_match: Option<Device<GlobalContext>> = None;
    let mut name_match: Option<Device<GlobalContext>> = None;

    for device in devices {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };

        debug!(
            vendor_id = format!("{:04x}", descriptor.vendor_id()),
            product_id = format!("{:04x}", descriptor.product_id()),
            class = descriptor.class_code(),
            "usb device enumerated"
        );

        if first.is_none() {
            first = Some(device.clone());
        }

        match descriptor.class_code() {
            USB_CLASS_PRINTER if class_match.is_none() => {
                class_match = Some(device);
                continue;
            }
            USB_CLASS_PER_INTERFACE if vendor_match.is_none() => {
                vendor_match = Some(device.clone());
            }
            _ => {}
        }

        // Product strings need an open handle; skip devices we can't open.
        if name_match.is_none() {
            if let Ok(handle) = device.open() {
                if let Ok(product) = handle.read_product_string_ascii(&descriptor) {
                    let product = product.to_lowercase();
                    if PRINTER_NAME_HINTS.iter().any(|hint| product.contains(hint)) {
                        name_match = Some(device);
                    }
                }
            }
        }
    }

    class_match.or(vendor_match).or(name_match).or(first)
}

/// Locate the first interface exposing a bulk-OUT endpoint.
///
/// Returns `(interface number, endpoint address)`.
fn find_bulk_out(device: &Device<GlobalContext>) -> Option<(u8, u8)> {
    let config = device.active_config_descriptor().ok()?;

    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            for endpoint in descriptor.endpoint_descriptors() {
                if endpoint.direction() == Direction::Out
                    && endpoint.transfer_type() == TransferType::Bulk
                {
                    return Some((descriptor.interface_number(), endpoint.address()));
                }
            }
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_is_disconnected() {
        let backend = ThermalBackend::new();
        assert_eq!(backend.state(), ConnectionState::Disconnected);
        assert!(!backend.is_ready());
        assert!(backend.last_diagnostic().is_empty());
    }

    #[test]
    fn test_submit_without_connect_does_no_io() {
        let mut backend = ThermalBackend::new();
        assert!(!backend.submit("ABC"));
        assert!(backend.last_diagnostic().contains("not ready"));
        // State is unchanged: submit on an unready backend is not a failure
        // transition, just a refused precondition.
        assert_eq!(backend.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disconnect_never_connected() {
        let mut backend = ThermalBackend::new();
        backend.disconnect();
        backend.disconnect();
        assert_eq!(backend.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_permission_gate_grant() {
        let (granter, gate) = PermissionGate::channel();
        granter.grant();
        assert_eq!(gate.wait(Duration::from_millis(10)), Some(true));
    }

    #[test]
    fn test_permission_gate_deny() {
        let (granter, gate) = PermissionGate::channel();
        granter.deny();
        assert_eq!(gate.wait(Duration::from_millis(10)), Some(false));
    }

    #[test]
    fn test_permission_gate_timeout() {
        let (_granter, gate) = PermissionGate::channel();
        assert_eq!(gate.wait(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_permission_gate_dropped_granter_is_denial() {
        let (granter, gate) = PermissionGate::channel();
        drop(granter);
        assert_eq!(gate.wait(Duration::from_millis(5)), Some(false));
    }

    // Connection and transfer paths require attached hardware; the framing
    // they send is covered byte-exact in protocol::commands.
}
