//! Host network bootstrap for the bridged topology.
//!
//! A bridged VM expects this host state before QEMU starts:
//!
//! ```text
//!   eth0 (first active adapter) ──┐
//!                                 ├── br0 (192.168.42.1/24, up)
//!   tap0 (persistent TAP, up) ────┘
//! ```
//!
//! [`setup_bridge_network`] builds the bridge side once per host and
//! [`add_tap_device`] adds one TAP link per VM. Every step short-circuits
//! on the first failure and nothing is rolled back, so a failed setup
//! can leave, for example, a bridge without an address.
//!
//! Host primitives sit behind [`HostNetwork`]; [`NetlinkHost`] is the
//! Linux implementation.

pub mod dhcp;
mod mac;
#[cfg(target_os = "linux")]
mod netlink;
#[cfg(target_os = "linux")]
mod tap;

pub use mac::MacAddress;
#[cfg(target_os = "linux")]
pub use netlink::NetlinkHost;
#[cfg(target_os = "linux")]
pub use tap::create_persistent_tap;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use std::net::Ipv4Addr;

/// A host network link as seen by the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Kernel interface index.
    pub index: u32,
    /// Interface name.
    pub name: String,
    /// Administratively up.
    pub up: bool,
    /// Operationally running (carrier present).
    pub running: bool,
    /// Loopback interface.
    pub loopback: bool,
    /// Software link with a kind (bridge, tun, veth, ...).
    pub virtual_link: bool,
}

impl Link {
    /// Whether this is an up, running, physical adapter.
    pub fn is_active_adapter(&self) -> bool {
        self.up && self.running && !self.loopback && !self.virtual_link
    }
}

/// Privileged host networking primitives.
///
/// Links are addressed by name. Implementations report failures as
/// [`Error::HostNetwork`] or [`Error::LinkNotFound`].
pub trait HostNetwork {
    /// All links on the host, ordered by index.
    fn links(&mut self) -> Result<Vec<Link>>;

    /// Look up a link by name.
    fn link(&mut self, name: &str) -> Result<Option<Link>>;

    /// Create a persistent TAP interface.
    fn create_tap(&mut self, name: &str) -> Result<()>;

    /// Create a bridge interface.
    fn create_bridge(&mut self, name: &str) -> Result<()>;

    /// Bring a link administratively up.
    fn set_link_up(&mut self, name: &str) -> Result<()>;

    /// Enslave `name` to the bridge `controller`.
    fn set_controller(&mut self, name: &str, controller: &str) -> Result<()>;

    /// Assign an IPv4 address to a link. An already-present address is not an error.
    fn add_address(&mut self, name: &str, address: Ipv4Addr, prefix: u8) -> Result<()>;
}

/// Result of a successful [`setup_bridge_network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSetup {
    /// Bridge name.
    pub bridge: String,
    /// Physical adapter attached to the bridge.
    pub adapter: String,
    /// Address assigned to the bridge.
    pub address: Ipv4Addr,
    /// Prefix length of `address`.
    pub prefix: u8,
    /// The bridge already existed and was reused.
    pub reused: bool,
}

/// Create TAP link `name`, bring it up and attach it to `bridge`.
///
/// On failure the host is left in whatever state the failed step
/// reached; nothing is cleaned up.
pub fn add_tap_device<H: HostNetwork + ?Sized>(host: &mut H, name: &str, bridge: &str) -> Result<()> {
    tracing::info!(tap = %name, bridge = %bridge, "adding tap device");

    host.create_tap(name)?;
    host.set_link_up(name)?;
    host.set_controller(name, bridge)?;

    tracing::debug!(tap = %name, bridge = %bridge, "tap device attached");
    Ok(())
}

/// Bridge the host's first active adapter and give the bridge an address.
pub fn setup_bridge_network<H: HostNetwork + ?Sized>(
    host: &mut H,
    config: &BridgeConfig,
) -> Result<BridgeSetup> {
    let adapter = find_first_active_adapter(host)?;
    let reused = create_bridge_network(host, &config.name, &adapter.name)?;
    assign_ip(host, &config.name, config.address, config.prefix)?;

    tracing::info!(
        bridge = %config.name,
        adapter = %adapter.name,
        address = %config.address,
        prefix = config.prefix,
        "bridge network ready"
    );

    Ok(BridgeSetup {
        bridge: config.name.clone(),
        adapter: adapter.name,
        address: config.address,
        prefix: config.prefix,
        reused,
    })
}

/// First up-and-running physical adapter, by interface index.
pub fn find_first_active_adapter<H: HostNetwork + ?Sized>(host: &mut H) -> Result<Link> {
    let mut links = host.links()?;
    links.sort_by_key(|link| link.index);

    let adapter = links
        .into_iter()
        .find(Link::is_active_adapter)
        .ok_or(Error::NoActiveAdapter)?;

    tracing::debug!(adapter = %adapter.name, index = adapter.index, "found active adapter");
    Ok(adapter)
}

/// Create (or reuse) `bridge`, attach `adapter` to it and bring it up.
///
/// Returns true when the bridge already existed.
pub fn create_bridge_network<H: HostNetwork + ?Sized>(
    host: &mut H,
    bridge: &str,
    adapter: &str,
) -> Result<bool> {
    let reused = host.link(bridge)?.is_some();
    if reused {
        tracing::debug!(bridge = %bridge, "reusing existing bridge");
    } else {
        host.create_bridge(bridge)?;
    }

    host.set_controller(adapter, bridge)?;
    host.set_link_up(bridge)?;
    Ok(reused)
}

/// Assign `address/prefix` to the bridge.
pub fn assign_ip<H: HostNetwork + ?Sized>(
    host: &mut H,
    bridge: &str,
    address: Ipv4Addr,
    prefix: u8,
) -> Result<()> {
    if prefix > 32 {
        return Err(Error::Config(format!("invalid prefix length /{}", prefix)));
    }
    host.add_address(bridge, address, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory host that records every primitive call.
    #[derive(Default)]
    struct FakeHost {
        links: Vec<Link>,
        calls: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl FakeHost {
        fn with_links(links: Vec<Link>) -> Self {
            Self {
                links,
                ..Self::default()
            }
        }

        fn record(&mut self, op: &'static str, detail: String) -> Result<()> {
            self.calls.push(format!("{} {}", op, detail));
            if self.fail_on == Some(op) {
                return Err(Error::host_network(format!("{} failed", op)));
            }
            Ok(())
        }
    }

    impl HostNetwork for FakeHost {
        fn links(&mut self) -> Result<Vec<Link>> {
            Ok(self.links.clone())
        }

        fn link(&mut self, name: &str) -> Result<Option<Link>> {
            Ok(self.links.iter().find(|l| l.name == name).cloned())
        }

        fn create_tap(&mut self, name: &str) -> Result<()> {
            self.record("create_tap", name.to_string())
        }

        fn create_bridge(&mut self, name: &str) -> Result<()> {
            self.record("create_bridge", name.to_string())
        }

        fn set_link_up(&mut self, name: &str) -> Result<()> {
            self.record("set_link_up", name.to_string())
        }

        fn set_controller(&mut self, name: &str, controller: &str) -> Result<()> {
            self.record("set_controller", format!("{} {}", name, controller))
        }

        fn add_address(&mut self, name: &str, address: Ipv4Addr, prefix: u8) -> Result<()> {
            self.record("add_address", format!("{} {}/{}", name, address, prefix))
        }
    }

    fn link(index: u32, name: &str) -> Link {
        Link {
            index,
            name: name.to_string(),
            up: true,
            running: true,
            loopback: false,
            virtual_link: false,
        }
    }

    fn host_links() -> Vec<Link> {
        vec![
            Link {
                loopback: true,
                ..link(1, "lo")
            },
            Link {
                running: false,
                ..link(2, "eno1")
            },
            Link {
                virtual_link: true,
                ..link(3, "docker0")
            },
            link(5, "wlan0"),
            link(4, "eth0"),
        ]
    }

    #[test]
    fn test_add_tap_device_order() {
        let mut host = FakeHost::default();
        add_tap_device(&mut host, "tap0", "br0").unwrap();
        assert_eq!(
            host.calls,
            vec!["create_tap tap0", "set_link_up tap0", "set_controller tap0 br0"]
        );
    }

    #[test]
    fn test_add_tap_device_short_circuits() {
        let mut host = FakeHost {
            fail_on: Some("set_link_up"),
            ..FakeHost::default()
        };
        let err = add_tap_device(&mut host, "tap0", "br0").unwrap_err();
        assert!(matches!(err, Error::HostNetwork(_)));
        // No attach after a failed activation, and no cleanup either
        assert_eq!(host.calls, vec!["create_tap tap0", "set_link_up tap0"]);
    }

    #[test]
    fn test_find_first_active_adapter_skips_inactive() {
        let mut host = FakeHost::with_links(host_links());
        let adapter = find_first_active_adapter(&mut host).unwrap();
        assert_eq!(adapter.name, "eth0");
    }

    #[test]
    fn test_no_active_adapter() {
        let mut host = FakeHost::with_links(vec![Link {
            loopback: true,
            ..link(1, "lo")
        }]);
        assert!(matches!(
            find_first_active_adapter(&mut host),
            Err(Error::NoActiveAdapter)
        ));
        assert!(host.calls.is_empty());
    }

    #[test]
    fn test_setup_bridge_network_creates_bridge() {
        let mut host = FakeHost::with_links(host_links());
        let setup = setup_bridge_network(&mut host, &BridgeConfig::default()).unwrap();

        assert_eq!(setup.adapter, "eth0");
        assert_eq!(setup.bridge, "br0");
        assert!(!setup.reused);
        assert_eq!(
            host.calls,
            vec![
                "create_bridge br0",
                "set_controller eth0 br0",
                "set_link_up br0",
                "add_address br0 192.168.42.1/24",
            ]
        );
    }

    #[test]
    fn test_setup_bridge_network_reuses_bridge() {
        let mut links = host_links();
        links.push(Link {
            virtual_link: true,
            ..link(9, "br0")
        });
        let mut host = FakeHost::with_links(links);

        let setup = setup_bridge_network(&mut host, &BridgeConfig::default()).unwrap();
        assert!(setup.reused);
        assert!(!host.calls.iter().any(|c| c.starts_with("create_bridge")));
    }

    #[test]
    fn test_setup_bridge_network_leaves_addressless_bridge_on_failure() {
        let mut host = FakeHost {
            fail_on: Some("add_address"),
            ..FakeHost::with_links(host_links())
        };
        let err = setup_bridge_network(&mut host, &BridgeConfig::default()).unwrap_err();
        assert!(matches!(err, Error::HostNetwork(_)));
        assert_eq!(host.calls.first().map(String::as_str), Some("create_bridge br0"));
    }

    #[test]
    fn test_assign_ip_rejects_bad_prefix() {
        let mut host = FakeHost::default();
        let err = assign_ip(&mut host, "br0", Ipv4Addr::new(10, 0, 0, 1), 33).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(host.calls.is_empty());
    }
}
