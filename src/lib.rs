//! vmlaunch - QEMU launcher with host network bootstrap
//!
//! vmlaunch turns a [`RunConfig`] into a QEMU command line, runs the
//! hypervisor in the foreground, and prepares the host-side network
//! path a bridged VM depends on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  vmlaunch CLI / Library                         │
//! ├─────────────────────────────────────────────────┤
//! │  Invocation builder (Descriptor, Render)        │
//! ├─────────────────────────────────────────────────┤
//! │  Qemu lifecycle (start / stop)                  │
//! ├─────────────────────────────────────────────────┤
//! │  Network bootstrap (bridge, TAP, DHCP)          │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vmlaunch::{Qemu, RunConfig};
//!
//! let config = RunConfig {
//!     memory: "2G".into(),
//!     ports: vec![80, 443],
//!     ..RunConfig::default()
//! };
//!
//! let qemu = Qemu::new();
//! qemu.start(&config)?;
//! # Ok::<(), vmlaunch::Error>(())
//! ```
//!
//! # Network topologies
//!
//! | Mode | Backend | Reachability |
//! |------|---------|--------------|
//! | user (default) | `-netdev user` | host port forwards |
//! | bridged | `-netdev tap` on `tap0` | host bridge, KVM enabled |
//!
//! The bridged topology assumes [`network::setup_bridge_network`] and
//! [`network::add_tap_device`] have already run on the host.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod network;
pub mod process;
pub mod qemu;

// Re-export main types for convenience
pub use config::{LauncherConfig, RunConfig};
pub use error::{Error, Result};
pub use qemu::{Invocation, Qemu, VmState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
