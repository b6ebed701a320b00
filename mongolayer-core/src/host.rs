//! Host descriptors and decoding of the engine's linked host list.
//!
//! Engines describe the hosts a connection string or cursor is bound to as a singly
//! linked list of [`HostListNode`]s with fixed-size, NUL-terminated name buffers.
//! [`Host::from_host_list`] turns such a list into an ordered `Vec<Host>`.

use std::fmt;

/// Maximum length of a host name, excluding the terminating NUL.
pub const HOST_NAME_MAX: usize = 255;

/// Size of the host name buffer in a [`HostListNode`].
pub const HOST_BUFFER_LEN: usize = HOST_NAME_MAX + 1;

/// Size of the `host:port` buffer in a [`HostListNode`]. Leaves room for brackets,
/// the colon and a five digit port.
pub const HOST_AND_PORT_BUFFER_LEN: usize = HOST_NAME_MAX + 7;

/// Address family of a host entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFamily {
    #[default]
    Unspecified,
    Inet,
    Inet6,
    Unix,
}

/// One node of the engine's host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostListNode {
    pub next: Option<Box<HostListNode>>,
    pub host: [u8; HOST_BUFFER_LEN],
    pub host_and_port: [u8; HOST_AND_PORT_BUFFER_LEN],
    pub port: u16,
    pub family: AddressFamily,
}

impl HostListNode {
    /// A zeroed node, as handed out by an engine that is not bound to any host yet.
    pub fn unbound() -> Self {
        Self {
            next: None,
            host: [0; HOST_BUFFER_LEN],
            host_and_port: [0; HOST_AND_PORT_BUFFER_LEN],
            port: 0,
            family: AddressFamily::Unspecified,
        }
    }

    /// Builds a node for `host` and `port`.
    ///
    /// Returns `None` if the host name does not fit in the fixed buffers.
    pub fn new(host: &str, port: u16, family: AddressFamily) -> Option<Self> {
        let host_and_port = match family {
            AddressFamily::Inet6 => format!("[{host}]:{port}"),
            AddressFamily::Unix => host.to_string(),
            _ => format!("{host}:{port}"),
        };

        let mut node = Self::unbound();
        write_buffer(&mut node.host, host)?;
        write_buffer(&mut node.host_and_port, &host_and_port)?;
        node.port = port;
        node.family = family;

        Some(node)
    }

    /// Links `nodes` into a list, preserving their order.
    pub fn link(nodes: Vec<HostListNode>) -> Option<HostListNode> {
        nodes.into_iter().rev().fold(None, |next, mut node| {
            node.next = next.map(Box::new);
            Some(node)
        })
    }

    /// Host name, decoded up to the first NUL.
    pub fn decode_host(&self) -> String {
        read_buffer(&self.host)
    }

    /// `host:port` text, decoded up to the first NUL.
    pub fn decode_host_and_port(&self) -> String {
        read_buffer(&self.host_and_port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostListNode> {
        std::iter::successors(Some(self), |node| node.next.as_deref())
    }
}

/// A host the client is or may be connected to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    pub host: String,
    pub host_port: String,
    pub port: u16,
}

impl Host {
    /// Decodes a host list, starting at `head`.
    ///
    /// An empty host or `host:port` on the head node marks a list the engine never
    /// populated, and yields no hosts. Empty fields on later nodes are kept verbatim.
    pub fn from_host_list(head: &HostListNode) -> Vec<Host> {
        let mut hosts = Vec::new();

        for node in head.iter() {
            let host = Host {
                host: node.decode_host(),
                host_port: node.decode_host_and_port(),
                port: node.port,
            };

            // TODO: check whether later empty nodes should also end the walk; only the
            // head is treated as an unbound marker for now.
            if hosts.is_empty() && (host.host.is_empty() || host.host_port.is_empty()) {
                return Vec::new();
            }

            hosts.push(host);
        }

        hosts
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_port)
    }
}

fn write_buffer(buffer: &mut [u8], value: &str) -> Option<()> {
    let bytes = value.as_bytes();

    // Keep one byte for the terminator.
    if bytes.len() >= buffer.len() || bytes.contains(&0) {
        return None;
    }

    buffer[..bytes.len()].copy_from_slice(bytes);
    buffer[bytes.len()..].fill(0);

    Some(())
}

fn read_buffer(buffer: &[u8]) -> String {
    let end = buffer
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(buffer.len());

    String::from_utf8_lossy(&buffer[..end]).into_owned()
}
