//! Compute API client boundary
//!
//! Everything the toolkit needs from the cloud provider is expressed as two
//! object-safe traits: a [`SessionFactory`] that authenticates, and the
//! [`ComputeSession`] it hands back. Provisioning tasks never share a
//! session — each task authenticates its own through the factory, because a
//! session is not guaranteed safe for concurrent use.
//!
//! The REST implementation lives in [`crate::rest`]; tests drive the same
//! traits through in-memory mocks.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A bootable image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
}

/// A server size/hardware profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
}

/// An SSH keypair registered with the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// Keypair name (also its identifier for deletion)
    pub name: String,
}

/// An isolated network in the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// One server as returned by the account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    /// Server identifier
    pub id: String,
    /// Server name
    pub name: String,
}

/// Request body for creating one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateServerRequest {
    /// Server name
    pub name: String,
    /// Image to boot; account default when absent
    pub image_ref: Option<String>,
    /// Flavor to boot on; account default when absent
    pub flavor_ref: Option<String>,
    /// Keypair to inject
    pub key_name: Option<String>,
}

/// Create response: the provider acknowledged the request with an id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedServer {
    /// Server identifier
    pub id: String,
}

/// Build state reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    /// Built and running
    Active,
    /// Still building
    Build,
    /// Terminal failed state
    Error,
    /// Anything the provider reports that this tool does not track
    Unknown,
}

impl ServerStatus {
    /// Parse from the provider's status string
    pub fn parse(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "BUILD" => Self::Build,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Provider-reported error condition on a created server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFault {
    /// Human-readable fault detail
    pub message: String,
}

/// Current detail of one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDetail {
    /// Server identifier
    pub id: String,
    /// Current build state
    pub status: ServerStatus,
    /// Fault detail, when the provider reports one
    pub fault: Option<ServerFault>,
}

/// One authenticated conversation with the compute API.
///
/// `wait_for_build` blocks until the server reaches a terminal build state;
/// implementations bound the wait with their own ceiling and report
/// expiry as [`crate::error::FleetError::Timeout`].
#[async_trait]
pub trait ComputeSession: Send + Sync {
    /// List all images visible to the account
    async fn list_images(&self) -> Result<Vec<Image>>;

    /// List all flavors visible to the account
    async fn list_flavors(&self) -> Result<Vec<Flavor>>;

    /// Submit a server create request
    async fn create_server(&self, req: &CreateServerRequest) -> Result<CreatedServer>;

    /// Block until the server finishes building or fails
    async fn wait_for_build(&self, server_id: &str) -> Result<()>;

    /// Fetch the current detail of one server
    async fn get_server(&self, server_id: &str) -> Result<ServerDetail>;

    /// Delete one server
    async fn delete_server(&self, server_id: &str) -> Result<()>;

    /// List all servers in the account
    async fn list_servers(&self) -> Result<Vec<ServerSummary>>;

    /// List the account's keypairs
    async fn list_keypairs(&self) -> Result<Vec<Keypair>>;

    /// Delete one keypair by name
    async fn delete_keypair(&self, name: &str) -> Result<()>;

    /// List the account's image snapshots
    async fn list_snapshots(&self) -> Result<Vec<Image>>;

    /// Delete one image by id
    async fn delete_image(&self, image_id: &str) -> Result<()>;

    /// List the account's networks
    async fn list_networks(&self) -> Result<Vec<Network>>;

    /// Delete one network by id
    async fn delete_network(&self, network_id: &str) -> Result<()>;
}

/// Authenticates and hands out independent sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Obtain a fresh authenticated session
    async fn authenticate(&self) -> Result<Arc<dyn ComputeSession>>;
}
