//! rtnetlink-backed [`HostNetwork`].

use super::{tap, HostNetwork, Link};
use crate::error::{Error, Result};
use futures::stream::TryStreamExt;
use netlink_packet_route::link::{LinkAttribute, LinkFlag, LinkInfo, LinkMessage};
use rtnetlink::Handle;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use tokio::runtime::Runtime;

/// Host networking over a route netlink socket.
///
/// Owns a single-threaded tokio runtime that drives the netlink
/// connection, so callers stay synchronous.
pub struct NetlinkHost {
    runtime: Runtime,
    handle: Handle,
}

impl NetlinkHost {
    /// Open a netlink connection.
    pub fn connect() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::host_network(format!("failed to build runtime: {}", e)))?;

        let handle = {
            let _guard = runtime.enter();
            let (connection, handle, _) = rtnetlink::new_connection().map_err(|e| {
                Error::host_network(format!("failed to create netlink connection: {}", e))
            })?;
            runtime.spawn(connection);
            handle
        };

        Ok(Self { runtime, handle })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn find(handle: &Handle, name: &str) -> Result<Option<LinkMessage>> {
        let mut links = handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(link) => Ok(link),
            // The kernel answers a name lookup for a missing link with ENODEV
            Err(e) if e.to_string().contains("No such device") => Ok(None),
            Err(e) => Err(Error::host_network(format!("failed to look up {}: {}", name, e))),
        }
    }

    fn index_of(&self, name: &str) -> Result<u32> {
        self.block_on(Self::find(&self.handle, name))?
            .map(|msg| msg.header.index)
            .ok_or_else(|| Error::LinkNotFound(name.to_string()))
    }
}

impl HostNetwork for NetlinkHost {
    fn links(&mut self) -> Result<Vec<Link>> {
        let messages: Vec<LinkMessage> = self
            .block_on(self.handle.link().get().execute().try_collect())
            .map_err(|e| Error::host_network(format!("failed to list links: {}", e)))?;

        let mut links: Vec<Link> = messages.iter().map(to_link).collect();
        links.sort_by_key(|link| link.index);
        Ok(links)
    }

    fn link(&mut self, name: &str) -> Result<Option<Link>> {
        Ok(self.block_on(Self::find(&self.handle, name))?.as_ref().map(to_link))
    }

    fn create_tap(&mut self, name: &str) -> Result<()> {
        tap::create_persistent_tap(name)
    }

    fn create_bridge(&mut self, name: &str) -> Result<()> {
        self.block_on(self.handle.link().add().bridge(name.to_string()).execute())
            .map_err(|e| Error::host_network(format!("failed to create bridge {}: {}", name, e)))?;
        tracing::debug!(bridge = %name, "created bridge");
        Ok(())
    }

    fn set_link_up(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        self.block_on(self.handle.link().set(index).up().execute())
            .map_err(|e| Error::host_network(format!("failed to bring up {}: {}", name, e)))
    }

    fn set_controller(&mut self, name: &str, controller: &str) -> Result<()> {
        let index = self.index_of(name)?;
        let controller_index = self.index_of(controller)?;
        self.block_on(
            self.handle
                .link()
                .set(index)
                .controller(controller_index)
                .execute(),
        )
        .map_err(|e| {
            Error::host_network(format!("failed to attach {} to {}: {}", name, controller, e))
        })
    }

    fn add_address(&mut self, name: &str, address: Ipv4Addr, prefix: u8) -> Result<()> {
        let index = self.index_of(name)?;
        self.block_on(
            self.handle
                .address()
                .add(index, IpAddr::V4(address), prefix)
                .execute(),
        )
        .or_else(|e| {
            if e.to_string().contains("File exists") {
                tracing::debug!(link = %name, address = %address, "address already assigned");
                Ok(())
            } else {
                Err(e)
            }
        })
        .map_err(|e| {
            Error::host_network(format!(
                "failed to assign {}/{} to {}: {}",
                address, prefix, name, e
            ))
        })
    }
}

fn to_link(msg: &LinkMessage) -> Link {
    let flags = &msg.header.flags;
    let mut name = String::new();
    let mut virtual_link = false;

    for attr in &msg.attributes {
        match attr {
            LinkAttribute::IfName(n) => name = n.clone(),
            LinkAttribute::LinkInfo(infos) => {
                virtual_link |= infos.iter().any(|info| matches!(info, LinkInfo::Kind(_)));
            }
            _ => {}
        }
    }

    Link {
        index: msg.header.index,
        name,
        up: flags.contains(&LinkFlag::Up),
        running: flags.contains(&LinkFlag::Running),
        loopback: flags.contains(&LinkFlag::Loopback),
        virtual_link,
    }
}
