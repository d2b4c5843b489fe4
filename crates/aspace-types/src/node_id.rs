use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// The payload half of a [`NodeId`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Uuid),
    Opaque(Vec<u8>),
}

/// Identity of a node, scoped by a namespace index.
///
/// Two NodeIds are equal iff both the namespace and the payload match by
/// value. The null NodeId (namespace 0, numeric 0) means "no identity"; the
/// store assigns a fresh id to nodes inserted with it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    pub fn guid(namespace: u16, value: Uuid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(value),
        }
    }

    pub fn opaque(namespace: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace,
            identifier: Identifier::Opaque(value.into()),
        }
    }

    /// The null NodeId (namespace 0, numeric 0).
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Returns `true` if this is the null NodeId.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// The numeric payload, if this is a numeric NodeId.
    pub fn as_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(n) => Some(n),
            _ => None,
        }
    }

    /// Stable 32-bit hash used for table addressing.
    ///
    /// A pure function of namespace and payload. Used only to place and find
    /// entries, never for ordering.
    pub fn hash32(&self) -> u32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"aspace-nodeid-v1:");
        hasher.update(&self.namespace.to_le_bytes());
        match &self.identifier {
            Identifier::Numeric(n) => {
                hasher.update(b"i:");
                hasher.update(&n.to_le_bytes());
            }
            Identifier::String(s) => {
                hasher.update(b"s:");
                hasher.update(s.as_bytes());
            }
            Identifier::Guid(g) => {
                hasher.update(b"g:");
                hasher.update(g.as_bytes());
            }
            Identifier::Opaque(b) => {
                hasher.update(b"b:");
                hasher.update(b);
            }
        }
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "i={n}"),
            Identifier::String(s) => write!(f, "s={s}"),
            Identifier::Guid(g) => write!(f, "g={g}"),
            Identifier::Opaque(b) => write!(f, "b={}", hex::encode(b)),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    /// Parse the textual form `ns=<u16>;{i|s|g|b}=<value>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidNodeId(s.to_string());
        let (namespace, rest) = match s.trim().strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, rest)
            }
            None => (0, s.trim()),
        };
        let (kind, value) = rest.split_once('=').ok_or_else(invalid)?;
        let identifier = match kind {
            "i" => Identifier::Numeric(value.parse().map_err(|_| invalid())?),
            "s" => Identifier::String(value.to_string()),
            "g" => Identifier::Guid(Uuid::parse_str(value).map_err(|_| invalid())?),
            "b" => Identifier::Opaque(
                hex::decode(value).map_err(|e| TypeError::InvalidHex(e.to_string()))?,
            ),
            _ => return Err(invalid()),
        };
        Ok(Self {
            namespace,
            identifier,
        })
    }
}

/// A NodeId plus an optional namespace URI and server index.
///
/// Used only as a reference target. It names the target, it never owns it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: Option<String>,
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Returns `true` if the target lives in this server's local namespaces.
    pub fn is_local(&self) -> bool {
        self.server_index == 0 && self.namespace_uri.is_none()
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={uri};")?;
        }
        write!(f, "{}", self.node_id)
    }
}

impl fmt::Debug for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpandedNodeId({self})")
    }
}

impl FromStr for ExpandedNodeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidExpandedNodeId(s.to_string());
        let mut rest = s.trim();
        let mut server_index = 0;
        if let Some(tail) = rest.strip_prefix("svr=") {
            let (svr, tail) = tail.split_once(';').ok_or_else(invalid)?;
            server_index = svr.parse().map_err(|_| invalid())?;
            rest = tail;
        }
        let mut namespace_uri = None;
        if let Some(tail) = rest.strip_prefix("nsu=") {
            let (uri, tail) = tail.split_once(';').ok_or_else(invalid)?;
            namespace_uri = Some(uri.to_string());
            rest = tail;
        }
        let node_id = rest.parse().map_err(|_| invalid())?;
        Ok(Self {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}
