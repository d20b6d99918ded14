//! Chain command - talk to a running project's nodes

use std::sync::Arc;

use clap::{Args, Subcommand};

use ethbaas_apply::PodBinding;
use ethbaas_chain::{chain_info, ChainInfo, ClusterFormer};

use super::format::{format_ports, print_table};
use crate::context::Context;
use crate::Result;

/// Chain operations
#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommand,
}

/// Chain subcommand
#[derive(Subcommand, Debug)]
pub enum ChainCommand {
    /// Connect every node to node 0
    Cluster {
        /// Project name
        #[arg(short, long)]
        name: String,
    },
    /// List chain pods and the services exposing them
    Pods {
        /// Project name
        #[arg(short, long)]
        name: String,
    },
    /// Show each node's network, block and peer status
    Info {
        /// Project name
        #[arg(short, long)]
        name: String,
    },
}

/// Run the chain command
pub async fn run(args: ChainArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.manager()?;
    match args.command {
        ChainCommand::Cluster { name } => {
            let record = manager.get(&name)?;
            let report = ClusterFormer::new(Arc::new(ctx.dialer()))
                .cluster(&record)
                .await?;
            println!(
                "Project {} clustered ({} peer(s) added).",
                name,
                report.peers_added.len()
            );
        }
        ChainCommand::Pods { name } => {
            let bindings = manager.pods(&name).await?;
            let rows: Vec<Vec<String>> = bindings.iter().map(pod_row).collect();
            print_table(&["NAME", "STATUS", "PORTS", "SERVICE", "NODEPORTS"], &rows);
        }
        ChainCommand::Info { name } => {
            let record = manager.get(&name)?;
            let infos = chain_info(&ctx.dialer(), &record).await?;
            let rows: Vec<Vec<String>> = infos.iter().map(info_row).collect();
            print_table(
                &["NODE", "NETID", "CURRENT", "HIGHEST", "DIFF", "SYNCING", "PEERS", "ENODE"],
                &rows,
            );
        }
    }
    Ok(())
}

fn pod_row(binding: &PodBinding) -> Vec<String> {
    vec![
        binding.pod.clone(),
        binding.phase.clone(),
        format_ports(&binding.container_ports),
        binding.service.clone(),
        format_ports(&binding.node_ports),
    ]
}

fn info_row(info: &ChainInfo) -> Vec<String> {
    vec![
        format!("node{}", info.node),
        info.network_id.clone(),
        info.current_block.to_string(),
        info.highest_block.to_string(),
        info.difficulty.to_string(),
        info.syncing.to_string(),
        info.peer_count.to_string(),
        info.enode.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_row_lists_ports() {
        let row = pod_row(&PodBinding {
            pod: "node0-5d9c".to_string(),
            phase: "Running".to_string(),
            container_ports: vec![8545, 8546, 30303],
            service: "node0".to_string(),
            node_ports: vec![30545],
        });
        assert_eq!(
            row,
            vec!["node0-5d9c", "Running", "8545,8546,30303", "node0", "30545"]
        );
    }

    #[test]
    fn info_row_names_node() {
        let row = info_row(&ChainInfo {
            node: 1,
            port: 30546,
            network_id: "1874".to_string(),
            current_block: 10,
            highest_block: 12,
            syncing: true,
            difficulty: 131072,
            peer_count: 2,
            enode: "enode://0123456789ab...".to_string(),
        });
        assert_eq!(row[0], "node1");
        assert_eq!(row[4], "131072");
        assert_eq!(row[5], "true");
    }
}
