//! Common types for ethbaas: project model, errors, and Kubernetes utilities

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod project;

pub use error::Error;
pub use project::{ProjectLayout, ProjectRecord, ProjectSpec};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix for every project namespace (`ethbaas-<project>`)
pub const NAMESPACE_PREFIX: &str = "ethbaas";

/// Namespace assigned to namespaced resources that don't declare one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Node label the cluster operator sets to pin chain nodes to machines
pub const NODE_AFFINITY_LABEL: &str = "ethbaas_node";

/// Geth JSON-RPC container port
pub const RPC_PORT: u16 = 8545;

/// Geth websocket container port
pub const WS_PORT: u16 = 8546;

/// Geth devp2p port (TCP and UDP)
pub const P2P_PORT: u16 = 30303;
