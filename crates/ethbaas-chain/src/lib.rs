//! Chain node access for ethbaas projects
//!
//! JSON-RPC to geth nodes exposed on a project's node ports, peer cluster
//! formation and per-node status.

#![deny(missing_docs)]

pub mod cluster;
pub mod enode;
pub mod info;
pub mod rpc;

pub use cluster::{ClusterFormer, ClusterReport};
pub use info::{chain_info, ChainInfo};
pub use rpc::{HttpDialer, HttpNodeRpc, NodeDialer, NodeInfo, NodeRpc, SyncProgress};
