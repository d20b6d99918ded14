//! Manifest generation for ethbaas projects
//!
//! A project renders to a fixed set of Kubernetes manifests: one Namespace,
//! one genesis ConfigMap, and a PersistentVolume, PersistentVolumeClaim,
//! Deployment and Service per node. [`ManifestSet`] names the files and fixes
//! the order they are applied and deleted in.

#![deny(missing_docs)]

pub mod generator;
pub mod k8s;
pub mod set;

pub use generator::{GeneratorOptions, GenesisTemplate, ManifestGenerator, RenderedManifest};
pub use set::{kind_rank, ManifestFile, ManifestKind, ManifestSet};
