//! Manifest file naming and apply ordering
//!
//! Every project has the same shape of manifest set: a Namespace and a
//! ConfigMap, plus a PersistentVolume, PersistentVolumeClaim, Deployment and
//! Service per node. Ordering is derived from the kind, never from file names.

use std::fmt;
use std::path::{Path, PathBuf};

use ethbaas_common::ProjectSpec;

/// Kinds of resource a project consists of
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// Project namespace (once)
    Namespace,
    /// Genesis ConfigMap (once)
    ConfigMap,
    /// Chain data volume (per node)
    PersistentVolume,
    /// Claim binding a node to its volume (per node)
    PersistentVolumeClaim,
    /// Geth node (per node)
    Deployment,
    /// NodePort exposure (per node)
    Service,
}

impl ManifestKind {
    /// Kinds created once per project
    pub const SINGLETONS: [ManifestKind; 2] = [ManifestKind::Namespace, ManifestKind::ConfigMap];

    /// Kinds created once per node
    pub const PER_NODE: [ManifestKind; 4] = [
        ManifestKind::PersistentVolume,
        ManifestKind::PersistentVolumeClaim,
        ManifestKind::Deployment,
        ManifestKind::Service,
    ];

    /// Kubernetes kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::ConfigMap => "ConfigMap",
            Self::PersistentVolume => "PersistentVolume",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        }
    }

    /// Apply priority (lower = apply first, delete last)
    ///
    /// The namespace must exist before anything namespaced, volumes before the
    /// claims that bind them, and the genesis ConfigMap and claims before the
    /// Deployments that mount them.
    pub fn rank(&self) -> u8 {
        kind_rank(self.as_str())
    }

    /// File name holding this kind for a node (`index` ignored for singletons)
    pub fn file_name(&self, index: u32) -> String {
        match self {
            Self::Namespace => "1.ns.yaml".to_string(),
            Self::ConfigMap => "cm.yaml".to_string(),
            Self::PersistentVolume => format!("pv_{}.yaml", index),
            Self::PersistentVolumeClaim => format!("pvc_{}.yaml", index),
            Self::Deployment => format!("deploy_{}.yaml", index),
            Self::Service => format!("svc_{}.yaml", index),
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply priority for any Kubernetes kind (lower = apply first)
///
/// Kinds outside the project's own set sort last.
pub fn kind_rank(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "PersistentVolume" => 1,
        "ConfigMap" | "Secret" => 2,
        "PersistentVolumeClaim" => 3,
        "Service" => 4,
        "Deployment" | "StatefulSet" | "DaemonSet" => 5,
        _ => 10,
    }
}

/// One manifest file of a project
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestFile {
    /// Resource kind in the file
    pub kind: ManifestKind,
    /// Node index, `None` for project-wide singletons
    pub index: Option<u32>,
    /// File name inside the project home
    pub file_name: String,
}

impl ManifestFile {
    /// File for a project-wide singleton
    pub fn singleton(kind: ManifestKind) -> Self {
        Self {
            kind,
            index: None,
            file_name: kind.file_name(0),
        }
    }

    /// File for one node
    pub fn for_node(kind: ManifestKind, index: u32) -> Self {
        Self {
            kind,
            index: Some(index),
            file_name: kind.file_name(index),
        }
    }

    /// Apply priority of the file's kind
    pub fn rank(&self) -> u8 {
        self.kind.rank()
    }

    /// Full path inside a directory
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    fn sort_key(&self) -> (u8, u32) {
        (self.rank(), self.index.unwrap_or(0))
    }
}

/// The ordered manifest files of one project
///
/// Files are held in apply order: ascending kind rank, then node index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestSet {
    files: Vec<ManifestFile>,
}

impl ManifestSet {
    /// The manifest files a project with this descriptor consists of
    pub fn for_project(spec: &ProjectSpec) -> Self {
        Self::for_node_count(spec.node_count)
    }

    /// The manifest files for `node_count` nodes
    pub fn for_node_count(node_count: u32) -> Self {
        let mut files: Vec<ManifestFile> = ManifestKind::SINGLETONS
            .iter()
            .map(|kind| ManifestFile::singleton(*kind))
            .collect();

        for index in 0..node_count {
            for kind in ManifestKind::PER_NODE {
                files.push(ManifestFile::for_node(kind, index));
            }
        }

        files.sort_by_key(ManifestFile::sort_key);
        Self { files }
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in apply order
    pub fn apply_order(&self) -> impl Iterator<Item = &ManifestFile> {
        self.files.iter()
    }

    /// Files in delete order (reverse of apply order)
    pub fn delete_order(&self) -> impl Iterator<Item = &ManifestFile> {
        self.files.iter().rev()
    }
}
