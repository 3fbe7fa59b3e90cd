//! Persistent TAP creation through `/dev/net/tun`.
//!
//! rtnetlink cannot create TUN/TAP links, so this goes through the tun
//! driver's ioctls directly. The link survives after the descriptor is
//! closed because it is marked persistent.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;

const TUN_DEVICE: &str = "/dev/net/tun";

/// Build the `TUNSETIFF` request for TAP link `name`.
fn tap_request(name: &str) -> Result<libc::ifreq> {
    let bytes = name.as_bytes();
    // Leave room for the trailing NUL
    if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ || bytes.contains(&0) {
        return Err(Error::host_network(format!("invalid interface name '{}'", name)));
    }

    // SAFETY: ifreq is plain data; all-zero is a valid value.
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, &src) in req.ifr_name.iter_mut().zip(bytes) {
        *dst = src as libc::c_char;
    }
    req.ifr_ifru.ifru_flags = (libc::IFF_TAP | libc::IFF_NO_PI) as libc::c_short;
    Ok(req)
}

/// Create a persistent TAP interface called `name`.
///
/// The interface is left down; bring it up separately. Requires
/// CAP_NET_ADMIN.
pub fn create_persistent_tap(name: &str) -> Result<()> {
    let mut req = tap_request(name)?;

    let tun = OpenOptions::new()
        .read(true)
        .write(true)
        .open(TUN_DEVICE)
        .map_err(|e| Error::host_network(format!("failed to open {}: {}", TUN_DEVICE, e)))?;
    let fd = tun.as_raw_fd();

    // SAFETY: fd is an open tun descriptor and req outlives the call.
    if unsafe { libc::ioctl(fd, libc::TUNSETIFF, &mut req as *mut libc::ifreq) } < 0 {
        let err = std::io::Error::last_os_error();
        return Err(Error::host_network(format!("TUNSETIFF {}: {}", name, err)));
    }

    // SAFETY: TUNSETPERSIST takes an integer argument.
    if unsafe { libc::ioctl(fd, libc::TUNSETPERSIST, 1 as libc::c_ulong) } < 0 {
        let err = std::io::Error::last_os_error();
        return Err(Error::host_network(format!("TUNSETPERSIST {}: {}", name, err)));
    }

    tracing::debug!(tap = %name, "created persistent tap");
    Ok(())
}
