//! Device descriptors.
//!
//! Each descriptor is a plain value that knows how to render itself
//! as `-flag value` tokens. Optional fields are omitted from the value
//! entirely when unset.

use super::render::{flag_value, Render};
use std::fmt;
use std::path::PathBuf;

/// An emulated disk (`-drive`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drive {
    /// Backing file.
    pub path: PathBuf,
    /// Image format (e.g. "raw").
    pub format: String,
    /// Bus interface (e.g. "virtio").
    pub interface: Option<String>,
    /// Drive index on its bus.
    pub index: Option<u32>,
}

impl Drive {
    /// Create a drive with no index or interface.
    pub fn new(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            interface: None,
            index: None,
        }
    }

    /// Set the drive index.
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the bus interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

impl Render for Drive {
    fn render(&self) -> Vec<String> {
        let mut fields = vec![
            format!("file={}", self.path.display()),
            format!("format={}", self.format),
        ];
        if let Some(index) = self.index {
            fields.push(format!("index={}", index));
        }
        if let Some(interface) = &self.interface {
            fields.push(format!("if={}", interface));
        }
        flag_value("-drive", fields)
    }
}

/// A guest network card (`-device <driver>,netdev=<id>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetDevice {
    /// Device model (e.g. "virtio-net").
    pub driver: String,
    /// Fixed MAC address; QEMU picks one when unset.
    pub mac: Option<String>,
    /// Id of the [`NetBackend`] this card attaches to.
    pub netdev: String,
}

impl NetDevice {
    /// Create a card attached to backend `netdev`.
    pub fn new(driver: impl Into<String>, netdev: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            mac: None,
            netdev: netdev.into(),
        }
    }

    /// Pin the card's MAC address.
    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }
}

impl Render for NetDevice {
    fn render(&self) -> Vec<String> {
        let mut fields = vec![self.driver.clone(), format!("netdev={}", self.netdev)];
        if let Some(mac) = &self.mac {
            fields.push(format!("mac={}", mac));
        }
        flag_value("-device", fields)
    }
}

/// Host transport kind for a [`NetBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetBackendKind {
    /// Host TAP interface.
    Tap,
    /// User-mode NAT (slirp).
    User,
}

impl fmt::Display for NetBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetBackendKind::Tap => write!(f, "tap"),
            NetBackendKind::User => write!(f, "user"),
        }
    }
}

/// Transport protocol of a [`PortForward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Forward a host port to the same port in the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortForward {
    /// Port on both host and guest.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl PortForward {
    /// Create a TCP forward.
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }

    /// Create a UDP forward.
    pub fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Udp,
        }
    }
}

/// Renders as the `hostfwd=` fragment of a `-netdev` value.
impl fmt::Display for PortForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hostfwd={}::{}-:{}",
            self.protocol, self.port, self.port
        )
    }
}

/// A host-side network backend (`-netdev`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetBackend {
    /// Transport kind.
    pub kind: NetBackendKind,
    /// Backend id referenced by a [`NetDevice`].
    pub id: String,
    /// Host interface name (TAP only).
    pub ifname: Option<String>,
    /// Interface up script.
    pub script: Option<String>,
    /// Interface down script.
    pub downscript: Option<String>,
    /// Port forwards, rendered in order.
    pub forwards: Vec<PortForward>,
}

impl NetBackend {
    fn new(kind: NetBackendKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            ifname: None,
            script: None,
            downscript: None,
            forwards: Vec::new(),
        }
    }

    /// TAP backend bound to host interface `ifname`.
    pub fn tap(id: impl Into<String>, ifname: impl Into<String>) -> Self {
        let mut backend = Self::new(NetBackendKind::Tap, id);
        backend.ifname = Some(ifname.into());
        backend
    }

    /// User-mode backend with no forwards.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(NetBackendKind::User, id)
    }

    /// Set the up/down hook scripts.
    pub fn with_scripts(mut self, script: impl Into<String>, downscript: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self.downscript = Some(downscript.into());
        self
    }

    /// Append a port forward.
    pub fn with_port_forward(mut self, forward: PortForward) -> Self {
        self.forwards.push(forward);
        self
    }
}

impl Render for NetBackend {
    fn render(&self) -> Vec<String> {
        let mut fields = vec![self.kind.to_string(), format!("id={}", self.id)];
        if let Some(ifname) = &self.ifname {
            fields.push(format!("ifname={}", ifname));
        }
        if let Some(script) = &self.script {
            fields.push(format!("script={}", script));
        }
        if let Some(downscript) = &self.downscript {
            fields.push(format!("downscript={}", downscript));
        }
        fields.extend(self.forwards.iter().map(PortForward::to_string));
        flag_value("-netdev", fields)
    }
}

/// Display output (`-display`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    /// Display mode (e.g. "none").
    pub mode: String,
}

impl Display {
    /// Create a display descriptor.
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

impl Render for Display {
    fn render(&self) -> Vec<String> {
        vec!["-display".to_string(), self.mode.clone()]
    }
}

/// Serial console (`-serial`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Serial {
    /// Serial backend (e.g. "stdio").
    pub mode: String,
}

impl Serial {
    /// Create a serial descriptor.
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

impl Render for Serial {
    fn render(&self) -> Vec<String> {
        vec!["-serial".to_string(), self.mode.clone()]
    }
}
