//! Server handles and descriptions.
//!
//! The core treats a [`Server`] as an opaque handle onto one network endpoint; everything it
//! needs to know is exposed through [`ServerDescription`]. Discovery, monitoring, and the
//! connection pool behind the handle are owned by the `Topology` collaborator.

use derive_more::Display;

/// The address of one server in the topology.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub struct ServerAddress(pub String);

impl ServerAddress {
    /// Creates a new address from a host:port string (or any other opaque endpoint identifier
    /// the `Topology` collaborator uses internally).
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

/// The kind of node a server currently is, as last reported by the topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerType {
    /// A replica set primary.
    Primary,
    /// A replica set secondary.
    Secondary,
    /// A sharded-cluster router.
    Mongos,
    /// A load balancer fronting a sharded cluster.
    LoadBalancer,
    /// A standalone server, reachable but not part of a replica set.
    Standalone,
    /// The server's type has not yet been determined.
    Unknown,
}

impl ServerType {
    /// Whether this server type can accept writes.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ServerType::Primary | ServerType::Mongos | ServerType::LoadBalancer | ServerType::Standalone
        )
    }
}

/// A snapshot of one server's capabilities, as last observed by the topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerDescription {
    /// The server's address.
    pub address: ServerAddress,
    /// The server's last-known type.
    pub server_type: ServerType,
    /// The server's max wire version, or `None` if it has not yet been determined.
    pub max_wire_version: Option<i32>,
    /// Whether the server has advertised support for retryable writes.
    pub supports_retryable_writes: bool,
}

impl ServerDescription {
    /// Whether this server's wire version is high enough to support the retryable-read
    /// protocol (`OP_MSG`, wire version >= 6).
    pub fn supports_retryable_reads(&self) -> bool {
        self.max_wire_version.unwrap_or(0) >= crate::topology::SUPPORTS_OP_MSG
    }
}

/// A selected server, held for the duration of one attempt.
///
/// Connection pooling, monitoring, and opcount accounting live in the `Topology` collaborator;
/// the core only ever reads the description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    /// The description of the selected server.
    pub description: ServerDescription,
}

impl Server {
    /// Creates a new selected-server handle wrapping the given description.
    pub fn new(description: ServerDescription) -> Self {
        Self { description }
    }
}
