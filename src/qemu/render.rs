//! Command-line rendering for device descriptors.

use super::devices::{Display, Drive, NetBackend, NetDevice, Serial};

/// A value that renders itself as QEMU command-line tokens.
///
/// Rendering is pure formatting: it never fails and never mutates.
/// Implementations return a flag token followed by one comma-joined
/// value token.
pub trait Render {
    /// Produce the ordered tokens representing this value.
    fn render(&self) -> Vec<String>;
}

/// Every descriptor kind that can appear in an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// `-drive`
    Drive(Drive),
    /// `-device <nic>`
    NetDevice(NetDevice),
    /// `-netdev`
    NetBackend(NetBackend),
    /// `-display`
    Display(Display),
    /// `-serial`
    Serial(Serial),
}

impl Render for Descriptor {
    fn render(&self) -> Vec<String> {
        match self {
            Descriptor::Drive(d) => d.render(),
            Descriptor::NetDevice(d) => d.render(),
            Descriptor::NetBackend(d) => d.render(),
            Descriptor::Display(d) => d.render(),
            Descriptor::Serial(d) => d.render(),
        }
    }
}

impl From<Drive> for Descriptor {
    fn from(d: Drive) -> Self {
        Descriptor::Drive(d)
    }
}

impl From<NetDevice> for Descriptor {
    fn from(d: NetDevice) -> Self {
        Descriptor::NetDevice(d)
    }
}

impl From<NetBackend> for Descriptor {
    fn from(d: NetBackend) -> Self {
        Descriptor::NetBackend(d)
    }
}

impl From<Display> for Descriptor {
    fn from(d: Display) -> Self {
        Descriptor::Display(d)
    }
}

impl From<Serial> for Descriptor {
    fn from(d: Serial) -> Self {
        Descriptor::Serial(d)
    }
}

/// Join a flag and its comma-separated value fields into two tokens.
pub(crate) fn flag_value<I>(flag: &str, fields: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let value = fields.into_iter().collect::<Vec<_>>().join(",");
    vec![flag.to_string(), value]
}
