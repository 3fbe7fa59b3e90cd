//! DHCPv4 address acquisition.
//!
//! [`DhcpClient`] runs a minimal smoltcp stack (one Ethernet interface,
//! one DHCPv4 socket) over a [`LinkDevice`] until the server hands out a
//! lease. The loop never sleeps longer than [`POLL_INTERVAL`], so a
//! cancelled token is noticed promptly.

use super::MacAddress;
use crate::error::{Error, Result};
use smoltcp::iface::{Config, Interface, SocketHandle, SocketSet};
use smoltcp::phy::Device;
use smoltcp::socket::dhcpv4;
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest single wait on the link device.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A smoltcp device the client can block on.
pub trait LinkDevice: Device {
    /// Block until the device is readable or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> Result<()>;
}

#[cfg(target_os = "linux")]
impl LinkDevice for smoltcp::phy::TunTapInterface {
    fn wait(&mut self, timeout: Duration) -> Result<()> {
        use std::os::unix::io::AsRawFd;

        let timeout = smoltcp::time::Duration::from_micros(timeout.as_micros() as u64);
        smoltcp::phy::wait(self.as_raw_fd(), Some(timeout))
            .map_err(|e| Error::dhcp(format!("wait on link device failed: {}", e)))
    }
}

/// Address configuration handed out by a DHCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpLease {
    /// Leased address.
    pub address: Ipv4Addr,
    /// Prefix length of the leased subnet.
    pub prefix_len: u8,
    /// Default gateway, if offered.
    pub router: Option<Ipv4Addr>,
    /// DNS servers, if offered.
    pub dns_servers: Vec<Ipv4Addr>,
}

impl fmt::Display for DhcpLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// DHCPv4 client bound to one link device.
pub struct DhcpClient<D: LinkDevice> {
    device: D,
    iface: Interface,
    sockets: SocketSet<'static>,
    dhcp: SocketHandle,
}

impl<D: LinkDevice> DhcpClient<D> {
    /// Create a client sending from `mac` over `device`.
    pub fn new(mut device: D, mac: MacAddress) -> Self {
        let config = Config::new(HardwareAddress::Ethernet(EthernetAddress(mac.octets())));
        let iface = Interface::new(config, &mut device, Instant::now());

        let mut sockets = SocketSet::new(Vec::new());
        let dhcp = sockets.add(dhcpv4::Socket::new());

        Self {
            device,
            iface,
            sockets,
            dhcp,
        }
    }

    /// The underlying link device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Run the exchange until a lease is configured.
    ///
    /// Returns [`Error::DhcpCancelled`] once `cancel` fires and
    /// [`Error::DhcpTimeout`] when no lease arrives within `timeout`.
    pub fn request(&mut self, cancel: &CancellationToken, timeout: Duration) -> Result<DhcpLease> {
        let deadline = std::time::Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!("dhcp request cancelled");
                return Err(Error::DhcpCancelled);
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::DhcpTimeout(timeout));
            }

            let timestamp = Instant::now();
            self.iface.poll(timestamp, &mut self.device, &mut self.sockets);

            let event = self.sockets.get_mut::<dhcpv4::Socket>(self.dhcp).poll();
            match event {
                Some(dhcpv4::Event::Configured(config)) => {
                    let lease = DhcpLease {
                        address: Ipv4Addr::from(config.address.address().0),
                        prefix_len: config.address.prefix_len(),
                        router: config.router.map(|r| Ipv4Addr::from(r.0)),
                        dns_servers: config.dns_servers.iter().map(|d| Ipv4Addr::from(d.0)).collect(),
                    };
                    tracing::info!(
                        address = %lease.address,
                        prefix = lease.prefix_len,
                        router = ?lease.router,
                        "dhcp lease acquired"
                    );
                    return Ok(lease);
                }
                Some(dhcpv4::Event::Deconfigured) => {
                    tracing::debug!("dhcp lease lost, restarting discovery");
                }
                None => {}
            }

            let delay = self
                .iface
                .poll_delay(timestamp, &self.sockets)
                .map(|d| Duration::from_micros(d.total_micros()))
                .unwrap_or(POLL_INTERVAL)
                .min(POLL_INTERVAL)
                .min(remaining);
            self.device.wait(delay)?;
        }
    }
}

/// Acquire an address on TAP `interface`, sending from `mac`.
#[cfg(target_os = "linux")]
pub fn acquire_address(
    interface: &str,
    mac: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<DhcpLease> {
    use smoltcp::phy::{Medium, TunTapInterface};

    let mac: MacAddress = mac.parse()?;
    let device = TunTapInterface::new(interface, Medium::Ethernet)
        .map_err(|e| Error::dhcp(format!("failed to open {}: {}", interface, e)))?;

    tracing::info!(interface = %interface, mac = %mac, timeout = ?timeout, "requesting dhcp lease");
    DhcpClient::new(device, mac).request(cancel, timeout)
}
