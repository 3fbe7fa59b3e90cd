//! Invocation assembly.
//!
//! Turns a [`RunConfig`] into the full, ordered QEMU argument list.
//! The order is fixed:
//!
//! ```text
//! display, serial, boot drive, display, baseline flags,
//! storage drive, nic device, netdev backend [, -enable-kvm]
//! ```
//!
//! The second display segment is a historical duplicate that is kept
//! so generated command lines stay byte-identical across releases.

use super::devices::{Display, Drive, NetBackend, NetDevice, PortForward, Serial};
use super::render::{Descriptor, Render};
use crate::config::RunConfig;

/// NIC model used for both topologies.
pub const NIC_DRIVER: &str = "virtio-net";

/// MAC pinned on the NIC in bridged mode.
pub const BRIDGED_MAC: &str = "7e:b8:7e:87:4a:ea";

/// Backend id shared by the NIC and its netdev.
pub const NETDEV_ID: &str = "n0";

/// Host TAP interface used by the bridged topology.
pub const TAP_IFNAME: &str = "tap0";

/// Disk image format for the boot and storage drives.
const DRIVE_FORMAT: &str = "raw";

/// A fully ordered hypervisor argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<String>,
}

impl Invocation {
    /// Build the invocation for `config`.
    pub fn build(config: &RunConfig) -> Self {
        let boot = Drive::new(&config.image, DRIVE_FORMAT).with_index(0);
        let storage = Drive::new(&config.image, DRIVE_FORMAT).with_interface("virtio");
        let display = Descriptor::from(Display::new("none"));
        let serial = Descriptor::from(Serial::new("stdio"));
        let (device, backend) = network_pair(config);

        let mut args = Vec::new();
        args.extend(display.render());
        args.extend(serial.render());
        args.extend(Descriptor::from(boot).render());
        args.extend(display.render());
        args.extend(baseline_flags(&config.memory));
        args.extend(Descriptor::from(storage).render());
        args.extend(Descriptor::from(device).render());
        args.extend(Descriptor::from(backend).render());
        if config.bridged {
            args.push("-enable-kvm".to_string());
        }

        tracing::debug!(
            bridged = config.bridged,
            ports = config.ports.len(),
            args = args.len(),
            "built hypervisor invocation"
        );

        Self { args }
    }

    /// Arguments in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Consume the invocation, yielding its arguments.
    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    /// Render as a single shell-style line prefixed by `binary`.
    pub fn command_line(&self, binary: &str) -> String {
        let mut line = binary.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// NIC and backend for the selected topology.
fn network_pair(config: &RunConfig) -> (NetDevice, NetBackend) {
    if config.bridged {
        // The host bridge provides reachability, so no forwards.
        (
            NetDevice::new(NIC_DRIVER, NETDEV_ID).with_mac(BRIDGED_MAC),
            NetBackend::tap(NETDEV_ID, TAP_IFNAME),
        )
    } else {
        let backend = config
            .ports
            .iter()
            .fold(NetBackend::user(NETDEV_ID), |backend, &port| {
                backend.with_port_forward(PortForward::tcp(port))
            });
        (NetDevice::new(NIC_DRIVER, NETDEV_ID), backend)
    }
}

fn baseline_flags(memory: &str) -> Vec<String> {
    ["-nodefaults", "-no-reboot", "-m", memory, "-device", "isa-debug-exit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_config(ports: Vec<u16>) -> RunConfig {
        RunConfig {
            memory: "2G".into(),
            ports,
            ..RunConfig::default()
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str, nth: usize) -> &'a str {
        let positions: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == flag)
            .map(|(i, _)| i)
            .collect();
        &args[positions[nth] + 1]
    }

    #[test]
    fn test_user_mode_backend_token() {
        let invocation = Invocation::build(&user_config(vec![80, 443]));
        let args = invocation.args();

        assert_eq!(
            value_after(args, "-netdev", 0),
            "user,id=n0,hostfwd=tcp::80-:80,hostfwd=tcp::443-:443"
        );
        assert!(!args.iter().any(|a| a == "-enable-kvm"));
    }

    #[test]
    fn test_user_mode_nic_has_no_mac() {
        let invocation = Invocation::build(&user_config(vec![]));
        // -device isa-debug-exit comes first, the NIC second
        assert_eq!(value_after(invocation.args(), "-device", 1), "virtio-net,netdev=n0");
        assert_eq!(value_after(invocation.args(), "-netdev", 0), "user,id=n0");
    }

    #[test]
    fn test_bridged_topology() {
        let config = RunConfig {
            bridged: true,
            ports: vec![80],
            ..RunConfig::default()
        };
        let invocation = Invocation::build(&config);
        let args = invocation.args();

        assert_eq!(
            value_after(args, "-device", 1),
            "virtio-net,netdev=n0,mac=7e:b8:7e:87:4a:ea"
        );
        assert_eq!(value_after(args, "-netdev", 0), "tap,id=n0,ifname=tap0");
        assert!(!args.iter().any(|a| a.contains("hostfwd")));
        assert_eq!(args.iter().filter(|a| *a == "-enable-kvm").count(), 1);
        assert_eq!(args.last().map(String::as_str), Some("-enable-kvm"));
    }

    #[test]
    fn test_display_rendered_twice() {
        let invocation = Invocation::build(&RunConfig::default());
        let displays = invocation
            .args()
            .iter()
            .filter(|a| *a == "-display")
            .count();
        assert_eq!(displays, 2);
    }

    #[test]
    fn test_memory_and_image_from_config() {
        let config = RunConfig {
            memory: "512M".into(),
            image: "/tmp/disk.raw".into(),
            ..RunConfig::default()
        };
        let invocation = Invocation::build(&config);
        let args = invocation.args();

        assert_eq!(value_after(args, "-m", 0), "512M");
        assert_eq!(value_after(args, "-drive", 0), "file=/tmp/disk.raw,format=raw,index=0");
        assert_eq!(value_after(args, "-drive", 1), "file=/tmp/disk.raw,format=raw,if=virtio");
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = user_config(vec![22, 8080]);
        assert_eq!(Invocation::build(&config), Invocation::build(&config));
    }

    #[test]
    fn test_command_line() {
        let invocation = Invocation::build(&user_config(vec![]));
        let line = invocation.command_line("qemu-system-x86_64");
        assert!(line.starts_with("qemu-system-x86_64 -display none -serial stdio "));
        assert!(line.ends_with("-netdev user,id=n0"));
    }
}
