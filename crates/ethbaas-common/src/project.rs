//! Project model: descriptor, persisted record, and on-disk layout
//!
//! A project is one private chain: `node_count` geth nodes, each exposed on a
//! NodePort starting at `first_node_port`. Its manifests live under
//! `<base>/<name>` and its cluster objects under the `ethbaas-<name>` namespace.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, NAMESPACE_PREFIX};

/// Longest project name the store accepts
pub const MAX_NAME_LEN: usize = 25;

/// Lowest port in the Kubernetes NodePort range
pub const NODE_PORT_MIN: u16 = 30000;

/// Highest port in the Kubernetes NodePort range
pub const NODE_PORT_MAX: u16 = 32767;

/// Default NodePort of node 0
pub const DEFAULT_FIRST_NODE_PORT: u16 = 30545;

/// Separator used when persisting node ports
const PORT_SEPARATOR: char = ',';

/// Project descriptor used to initialize a project
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Unique project name
    pub name: String,
    /// Number of chain nodes (at least 1)
    pub node_count: u32,
    /// External port of node 0; node `i` uses `first_node_port + i`
    pub first_node_port: u16,
}

impl ProjectSpec {
    /// Create a new project descriptor
    pub fn new(name: impl Into<String>, node_count: u32, first_node_port: u16) -> Self {
        Self {
            name: name.into(),
            node_count,
            first_node_port,
        }
    }

    /// Check the name is a DNS label and every node port fits the NodePort range
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        if self.node_count == 0 {
            return Err(Error::validation_for_field(
                &self.name,
                "nodeCount",
                "must be at least 1",
            ));
        }

        if self.first_node_port < NODE_PORT_MIN {
            return Err(Error::validation_for_field(
                &self.name,
                "firstNodePort",
                format!("{} is below the NodePort range", self.first_node_port),
            ));
        }

        let last = u32::from(self.first_node_port).saturating_add(self.node_count - 1);
        if last > u32::from(NODE_PORT_MAX) {
            return Err(Error::validation_for_field(
                &self.name,
                "firstNodePort",
                format!(
                    "{} nodes from port {} exceed the NodePort range (max {})",
                    self.node_count, self.first_node_port, NODE_PORT_MAX
                ),
            ));
        }

        Ok(())
    }

    /// Namespace holding the project's cluster objects
    pub fn namespace(&self) -> String {
        namespace_for(&self.name)
    }

    /// External port of node `index`
    pub fn node_port(&self, index: u32) -> u16 {
        self.first_node_port + index as u16
    }

    /// External ports of all nodes, in node order
    pub fn node_ports(&self) -> Vec<u16> {
        (0..self.node_count).map(|i| self.node_port(i)).collect()
    }
}

/// Persisted project record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// Unique project name
    pub name: String,
    /// Number of chain nodes
    pub node_count: u32,
    /// Whether the project's manifests are believed applied
    pub running: bool,
    /// Creation time in unix seconds
    pub created: i64,
    /// External port of each node, in node order
    pub node_ports: Vec<u16>,
}

impl ProjectRecord {
    /// Build the initial (stopped) record for a descriptor
    pub fn new(spec: &ProjectSpec, created: i64) -> Self {
        Self {
            name: spec.name.clone(),
            node_count: spec.node_count,
            running: false,
            created,
            node_ports: spec.node_ports(),
        }
    }

    /// Rebuild the descriptor this record was created from
    pub fn spec(&self) -> Result<ProjectSpec> {
        let first = self.node_ports.first().copied().ok_or_else(|| {
            Error::store(format!("project {} has no node ports recorded", self.name))
        })?;
        Ok(ProjectSpec::new(&self.name, self.node_count, first))
    }

    /// Namespace holding the project's cluster objects
    pub fn namespace(&self) -> String {
        namespace_for(&self.name)
    }

    /// Node ports joined for storage (`30545,30546`)
    pub fn node_ports_string(&self) -> String {
        join_ports(&self.node_ports)
    }

    /// Creation time as a UTC timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created, 0).single()
    }
}

/// Where project manifests live on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectLayout {
    base: PathBuf,
}

impl ProjectLayout {
    /// Create a layout rooted at `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Root directory holding all project homes
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Home directory of a project (`<base>/<name>`)
    pub fn home(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    /// Directory manifests are rendered into before being published
    pub fn staging(&self, name: &str) -> PathBuf {
        self.base.join(format!(".{}.staging", name))
    }
}

/// Namespace for a project name (`ethbaas-<name>`)
pub fn namespace_for(name: &str) -> String {
    format!("{}-{}", NAMESPACE_PREFIX, name)
}

/// Join node ports for storage
pub fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(&PORT_SEPARATOR.to_string())
}

/// Parse node ports persisted by [`join_ports`]
pub fn parse_ports(value: &str) -> Result<Vec<u16>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(PORT_SEPARATOR)
        .map(|p| {
            p.trim()
                .parse::<u16>()
                .map_err(|e| Error::store(format!("invalid node port '{}': {}", p, e)))
        })
        .collect()
}

/// Validate a project name as a DNS-1123 label of bounded length
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation_for_field(name, "name", "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::validation_for_field(
            name,
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !name.starts_with('-') && !name.ends_with('-');
    if !valid_chars || !valid_edges {
        return Err(Error::validation_for_field(
            name,
            "name",
            "must be lowercase alphanumerics or '-', starting and ending alphanumeric",
        ));
    }

    Ok(())
}
