//! Schema-agnostic resource apply and delete for ethbaas
//!
//! Manifest streams are decoded into [`UnstructuredResource`]s, resolved to a
//! [`RestMapping`] through live API discovery, and created or deleted through
//! an injected [`Orchestrator`].

#![deny(missing_docs)]

pub mod applier;
pub mod catalog;
pub mod orchestrator;
pub mod pods;
pub mod resource;

pub use applier::ResourceApplier;
pub use catalog::{ResourceCatalog, RestMapping};
pub use orchestrator::{
    KubeOrchestrator, Orchestrator, PodSummary, ServicePortSummary, ServiceSummary,
};
pub use pods::{bind_pods, list_pod_bindings, PodBinding};
pub use resource::{decode_documents, UnstructuredResource};
