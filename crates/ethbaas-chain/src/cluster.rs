//! Peer cluster formation
//!
//! Node 0 is the bootstrap node: every other node's enode is registered with it
//! through `admin_addPeer`, after which devp2p discovery meshes the rest.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use ethbaas_common::{Error, ProjectRecord, Result};

use crate::enode::rewrite_loopback;
use crate::rpc::NodeDialer;

/// Outcome of a successful cluster call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterReport {
    /// Rewritten enode URIs registered with node 0, in node order
    pub peers_added: Vec<String>,
}

/// Connects a project's nodes to its bootstrap node
pub struct ClusterFormer {
    dialer: Arc<dyn NodeDialer>,
}

impl ClusterFormer {
    /// Create a former that reaches nodes through `dialer`
    pub fn new(dialer: Arc<dyn NodeDialer>) -> Self {
        Self { dialer }
    }

    /// Register nodes `1..n` as peers of node 0, stopping at the first failure
    #[instrument(skip(self, record), fields(project = %record.name, nodes = record.node_count))]
    pub async fn cluster(&self, record: &ProjectRecord) -> Result<ClusterReport> {
        if !record.running {
            return Err(Error::validation_for(&record.name, "project is not running"));
        }

        let (bootstrap_port, peers) = match record.node_ports.split_first() {
            Some((first, rest)) if !rest.is_empty() => (*first, rest),
            _ => {
                debug!("single node project, nothing to cluster");
                return Ok(ClusterReport::default());
            }
        };

        let bootstrap = self.dialer.dial(bootstrap_port).await?;
        let mut report = ClusterReport::default();

        for (offset, port) in peers.iter().enumerate() {
            let index = offset as u32 + 1;
            let node = self.dialer.dial(*port).await?;
            let node_info = node.node_info().await?;
            let enode = rewrite_loopback(&node_info.enode, index);

            if !bootstrap.add_peer(&enode).await? {
                return Err(Error::rpc(
                    bootstrap.endpoint(),
                    format!("admin_addPeer rejected node{}", index),
                ));
            }
            debug!(node = index, enode = %enode, "peer added");
            report.peers_added.push(enode);
        }

        info!(peers = report.peers_added.len(), "cluster formed");
        Ok(report)
    }
}
