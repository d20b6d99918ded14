//! Project command - init, inspect, start, stop and delete projects

use chrono::Utc;
use clap::{Args, Subcommand};
use serde_json::json;

use ethbaas_common::project::DEFAULT_FIRST_NODE_PORT;
use ethbaas_common::{ProjectRecord, ProjectSpec};
use ethbaas_project::{BatchReport, DeleteMode};

use super::format::{format_age, format_ports, print_table};
use super::OutputFormat;
use crate::context::Context;
use crate::Result;

/// Project operations
#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

/// Project subcommand
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Generate a project's manifests and record it
    Init {
        /// Project name (DNS label, at most 25 characters)
        #[arg(short, long)]
        name: String,
        /// Number of chain nodes
        #[arg(short = 'c', long = "nodes", alias = "nodeCount", default_value_t = 1)]
        nodes: u32,
        /// External port of node 0; node i gets port + i
        #[arg(short, long, default_value_t = DEFAULT_FIRST_NODE_PORT)]
        port: u16,
    },
    /// List projects
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },
    /// Show one project
    Get {
        /// Project name
        #[arg(short, long)]
        name: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },
    /// Apply a project's manifests to the cluster
    Start {
        /// Project name
        #[arg(short, long)]
        name: String,
    },
    /// Delete a project's resources from the cluster
    Stop {
        /// Project name
        #[arg(short, long)]
        name: String,
    },
    /// Tear a project down and remove its manifests and record
    Delete {
        /// Project name
        #[arg(short, long)]
        name: String,
        /// Skip the cluster teardown; running resources are left behind
        #[arg(long)]
        local_only: bool,
    },
}

/// Run the project command
pub async fn run(args: ProjectArgs, ctx: &Context) -> Result<()> {
    let manager = ctx.manager()?;
    match args.command {
        ProjectCommand::Init { name, nodes, port } => {
            let record = manager.init(&ProjectSpec::new(&name, nodes, port)).await?;
            println!(
                "Project {} initialized ({} node(s), ports {}).",
                record.name,
                record.node_count,
                format_ports(&record.node_ports)
            );
        }
        ProjectCommand::List { output } => {
            let list = manager.list()?;
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "count": list.count,
                        "projects": list.projects,
                    }))?
                ),
                OutputFormat::Table => {
                    println!("Project Amount: {}", list.count);
                    if list.count > 0 {
                        let rows: Vec<Vec<String>> = list.projects.iter().map(record_row).collect();
                        print_table(&RECORD_HEADERS, &rows);
                    }
                }
            }
        }
        ProjectCommand::Get { name, output } => {
            let record = manager.get(&name)?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Table => print_table(&RECORD_HEADERS, &[record_row(&record)]),
            }
        }
        ProjectCommand::Start { name } => {
            let report = manager.start(&name).await?;
            println!("Project {} started ({}).", name, summary(&report));
        }
        ProjectCommand::Stop { name } => {
            let report = manager.stop(&name).await?;
            println!("Project {} stopped ({}).", name, summary(&report));
        }
        ProjectCommand::Delete { name, local_only } => {
            let mode = if local_only {
                DeleteMode::LocalOnly
            } else {
                DeleteMode::Teardown
            };
            match manager.delete(&name, mode).await? {
                Some(report) => println!("Project {} deleted ({}).", name, summary(&report)),
                None => println!("Project {} deleted (local state only).", name),
            }
        }
    }
    Ok(())
}

const RECORD_HEADERS: [&str; 6] = ["NAME", "NODES", "PORTS", "RUNNING", "CREATED", "AGE"];

fn record_row(record: &ProjectRecord) -> Vec<String> {
    let (created, age) = match record.created_at() {
        Some(at) => (at.to_rfc3339(), format_age(&at, &Utc::now())),
        None => (record.created.to_string(), "-".to_string()),
    };
    vec![
        record.name.clone(),
        record.node_count.to_string(),
        format_ports(&record.node_ports),
        record.running.to_string(),
        created,
        age,
    ]
}

fn summary(report: &BatchReport) -> String {
    format!(
        "{} manifest(s), {} resource(s)",
        report.processed.len(),
        report.documents
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethbaas_project::BatchOperation;

    #[test]
    fn record_row_formats_ports_and_created() {
        let record = ProjectRecord::new(&ProjectSpec::new("net1", 2, 30545), 0);
        let row = record_row(&record);

        assert_eq!(row[0], "net1");
        assert_eq!(row[1], "2");
        assert_eq!(row[2], "30545,30546");
        assert_eq!(row[3], "false");
        assert_eq!(row[4], "1970-01-01T00:00:00+00:00");
        assert_eq!(row.len(), RECORD_HEADERS.len());
    }

    #[test]
    fn summary_counts_manifests_and_documents() {
        let report = BatchReport {
            project: "net1".to_string(),
            operation: BatchOperation::Start,
            processed: vec!["1.ns.yaml".to_string(), "cm.yaml".to_string()],
            documents: 2,
        };
        assert_eq!(summary(&report), "2 manifest(s), 2 resource(s)");
    }
}
