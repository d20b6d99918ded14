//! Per-node chain status

use std::fmt;

use tracing::instrument;

use ethbaas_common::{ProjectRecord, Result};

use crate::enode::shorten;
use crate::rpc::{NodeDialer, NodeRpc};

/// Status of one node as reported over RPC
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    /// Node index within the project
    pub node: u32,
    /// External port the node was reached on
    pub port: u16,
    /// `net_version`
    pub network_id: String,
    /// Imported block (sync progress while syncing, otherwise the head)
    pub current_block: u64,
    /// Highest known block (equal to `current_block` when not syncing)
    pub highest_block: u64,
    /// Whether the node reports an active sync
    pub syncing: bool,
    /// Difficulty of `current_block`
    pub difficulty: u128,
    /// Connected peers
    pub peer_count: u64,
    /// Shortened enode for display
    pub enode: String,
}

impl fmt::Display for ChainInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node{} ({}): network {} block {}/{} diff={} syncing={} peers={} {}",
            self.node,
            self.port,
            self.network_id,
            self.current_block,
            self.highest_block,
            self.difficulty,
            self.syncing,
            self.peer_count,
            self.enode
        )
    }
}

/// Query one node's status
pub async fn node_status(node: &dyn NodeRpc, index: u32, port: u16) -> Result<ChainInfo> {
    let network_id = node.network_id().await?;
    let block = node.block_number().await?;
    let peer_count = node.peer_count().await?;
    let progress = node.sync_progress().await?;
    let enode = node.node_info().await?.enode;

    let (current_block, highest_block) = match progress {
        Some(p) => (p.current_block, p.highest_block),
        None => (block, block),
    };
    let difficulty = node.block_difficulty(current_block).await?;

    Ok(ChainInfo {
        node: index,
        port,
        network_id,
        current_block,
        highest_block,
        syncing: progress.is_some(),
        difficulty,
        peer_count,
        enode: shorten(&enode),
    })
}

/// Query every node of a project in node order, stopping at the first failure
#[instrument(skip(dialer, record), fields(project = %record.name))]
pub async fn chain_info(dialer: &dyn NodeDialer, record: &ProjectRecord) -> Result<Vec<ChainInfo>> {
    let mut infos = Vec::with_capacity(record.node_ports.len());
    for (index, port) in record.node_ports.iter().enumerate() {
        let node = dialer.dial(*port).await?;
        infos.push(node_status(node.as_ref(), index as u32, *port).await?);
    }
    Ok(infos)
}
