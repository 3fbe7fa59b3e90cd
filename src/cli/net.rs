//! Host network commands.
//!
//! These need CAP_NET_ADMIN and only work on Linux.

use clap::{Args, Subcommand};
use std::net::Ipv4Addr;
use std::time::Duration;
use vmlaunch::config::LauncherConfig;
use vmlaunch::qemu::{BRIDGED_MAC, TAP_IFNAME};
use vmlaunch::{Error, Result};

/// Parse a duration string (e.g., "10s", "1m").
fn parse_duration(s: &str) -> std::result::Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Manage host networking
#[derive(Subcommand, Debug)]
pub enum NetCmd {
    /// Bridge the first active adapter and assign the bridge address.
    SetupBridge(SetupBridgeCmd),

    /// Create a persistent TAP device and attach it to the bridge.
    AddTap(AddTapCmd),

    /// Acquire an IPv4 address over a TAP device with DHCP.
    Dhcp(DhcpCmd),
}

impl NetCmd {
    /// Execute the net subcommand.
    pub fn run(self, config: &LauncherConfig) -> Result<()> {
        match self {
            NetCmd::SetupBridge(cmd) => cmd.run(config),
            NetCmd::AddTap(cmd) => cmd.run(config),
            NetCmd::Dhcp(cmd) => cmd.run(config),
        }
    }
}

/// Create and address the host bridge.
#[derive(Args, Debug)]
pub struct SetupBridgeCmd {
    /// Bridge name (defaults to the configured bridge).
    #[arg(long)]
    pub name: Option<String>,

    /// Bridge address.
    #[arg(long)]
    pub address: Option<Ipv4Addr>,

    /// Bridge prefix length.
    #[arg(long)]
    pub prefix: Option<u8>,
}

impl SetupBridgeCmd {
    /// Execute the setup-bridge command.
    pub fn run(self, config: &LauncherConfig) -> Result<()> {
        let mut bridge = config.bridge.clone();
        if let Some(name) = self.name {
            bridge.name = name;
        }
        if let Some(address) = self.address {
            bridge.address = address;
        }
        if let Some(prefix) = self.prefix {
            bridge.prefix = prefix;
        }

        let setup = with_host(|host| vmlaunch::network::setup_bridge_network(host, &bridge))?;
        println!(
            "Bridge {} ({}/{}) attached to {}{}",
            setup.bridge,
            setup.address,
            setup.prefix,
            setup.adapter,
            if setup.reused { " (existing)" } else { "" }
        );
        Ok(())
    }
}

/// Create a TAP device.
#[derive(Args, Debug)]
pub struct AddTapCmd {
    /// TAP interface name.
    #[arg(default_value = TAP_IFNAME)]
    pub name: String,

    /// Bridge to attach to (defaults to the configured bridge).
    #[arg(long)]
    pub bridge: Option<String>,
}

impl AddTapCmd {
    /// Execute the add-tap command.
    pub fn run(self, config: &LauncherConfig) -> Result<()> {
        let bridge = self.bridge.unwrap_or_else(|| config.bridge.name.clone());
        with_host(|host| vmlaunch::network::add_tap_device(host, &self.name, &bridge))?;
        println!("TAP {} attached to {}", self.name, bridge);
        Ok(())
    }
}

/// Request a DHCP lease.
#[derive(Args, Debug)]
pub struct DhcpCmd {
    /// TAP interface to run DHCP on.
    #[arg(default_value = TAP_IFNAME)]
    pub interface: String,

    /// Client MAC address.
    #[arg(long, default_value = BRIDGED_MAC)]
    pub mac: String,

    /// Give up after this long (e.g. "10s"; defaults to the configured timeout).
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

impl DhcpCmd {
    /// Execute the dhcp command.
    #[cfg(target_os = "linux")]
    pub fn run(self, config: &LauncherConfig) -> Result<()> {
        use tokio_util::sync::CancellationToken;

        let timeout = self.timeout.unwrap_or_else(|| config.dhcp_timeout());
        let cancel = CancellationToken::new();

        let runtime = tokio::runtime::Runtime::new().map_err(Error::Io)?;
        let lease = runtime.block_on(async {
            // Ctrl-C cancels the request instead of killing the process
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::debug!("interrupt received, cancelling dhcp");
                        cancel.cancel();
                    }
                })
            };

            let request = {
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || {
                    vmlaunch::network::dhcp::acquire_address(
                        &self.interface,
                        &self.mac,
                        &cancel,
                        timeout,
                    )
                })
            };

            let result = request
                .await
                .map_err(|e| Error::dhcp(format!("dhcp task failed: {}", e)))
                .and_then(|lease| lease);
            watcher.abort();
            result
        })?;

        println!("{}", lease);
        if let Some(router) = lease.router {
            tracing::info!(router = %router, prefix = lease.prefix_len, "lease details");
        }
        Ok(())
    }

    /// Execute the dhcp command.
    #[cfg(not(target_os = "linux"))]
    pub fn run(self, _config: &LauncherConfig) -> Result<()> {
        Err(Error::dhcp("TAP devices are only supported on Linux"))
    }
}

#[cfg(target_os = "linux")]
fn with_host<T>(f: impl FnOnce(&mut vmlaunch::network::NetlinkHost) -> Result<T>) -> Result<T> {
    let mut host = vmlaunch::network::NetlinkHost::connect()?;
    f(&mut host)
}

#[cfg(not(target_os = "linux"))]
fn with_host<T>(_f: impl FnOnce(&mut dyn vmlaunch::network::HostNetwork) -> Result<T>) -> Result<T> {
    Err(Error::host_network("host networking is only supported on Linux"))
}
