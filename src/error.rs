//! Error types for vmlaunch.

use std::process::ExitStatus;
use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by vmlaunch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The hypervisor binary could not be spawned.
    #[error("failed to launch {binary}: {source}")]
    Launch {
        /// Binary that was executed.
        binary: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The hypervisor ran but exited unsuccessfully.
    #[error("hypervisor exited with {0}")]
    HypervisorExit(ExitStatus),

    /// A lifecycle operation was attempted in the wrong state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: String,
        /// State the instance is in.
        actual: String,
    },

    /// Link, bridge or address manipulation on the host failed.
    #[error("host networking error: {0}")]
    HostNetwork(String),

    /// No up-and-running physical adapter exists on the host.
    #[error("no active network adapter found")]
    NoActiveAdapter,

    /// A named link does not exist.
    #[error("network link not found: {0}")]
    LinkNotFound(String),

    /// The DHCP exchange did not produce a lease in time.
    #[error("DHCP request timed out after {0:?}")]
    DhcpTimeout(Duration),

    /// The DHCP request was cancelled by the caller.
    #[error("DHCP request cancelled")]
    DhcpCancelled,

    /// The DHCP link device failed.
    #[error("DHCP error: {0}")]
    Dhcp(String),

    /// A MAC address string could not be parsed.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read or parsed.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// The configuration file could not be written.
    #[error("failed to save config: {0}")]
    ConfigSave(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a host networking error.
    pub fn host_network(msg: impl Into<String>) -> Self {
        Error::HostNetwork(msg.into())
    }

    /// Create a DHCP error.
    pub fn dhcp(msg: impl Into<String>) -> Self {
        Error::Dhcp(msg.into())
    }

    /// Whether this is a launch failure, which `Qemu::start` has already
    /// written to stderr.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Error::Launch { .. } | Error::HypervisorExit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dhcp_timeout_message() {
        let err = Error::DhcpTimeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "DHCP request timed out after 10s");
    }

    #[test]
    fn test_launch_failure_kinds() {
        let launch = Error::Launch {
            binary: "qemu-system-x86_64".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(launch.is_launch_failure());
        assert!(!Error::NoActiveAdapter.is_launch_failure());
        assert!(!Error::Io(std::io::Error::from(std::io::ErrorKind::Interrupted)).is_launch_failure());
    }

    #[test]
    fn test_launch_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::Launch {
            binary: "qemu-system-x86_64".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to launch qemu-system-x86_64"));
        assert!(err.source().is_some());
    }
}
