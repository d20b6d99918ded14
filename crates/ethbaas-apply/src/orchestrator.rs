//! Orchestrator abstraction
//!
//! Provides a trait over the handful of API server calls the provisioning
//! engine makes, so tests can run against mocks or in-memory fakes while
//! production code talks to a real cluster through kube-rs.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::discovery::Discovery;
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use ethbaas_common::kube_utils::create_client;
use ethbaas_common::{Error, Result};

use crate::catalog::{ResourceCatalog, RestMapping};
use crate::resource::UnstructuredResource;

/// A pod as seen by the chain tooling
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodSummary {
    /// Pod name
    pub name: String,
    /// Lifecycle phase (Pending, Running, ...)
    pub phase: String,
    /// Pod labels
    pub labels: BTreeMap<String, String>,
    /// Ports of the first container
    pub container_ports: Vec<u16>,
}

/// A service as seen by the chain tooling
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceSummary {
    /// Service name
    pub name: String,
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Exposed ports
    pub ports: Vec<ServicePortSummary>,
}

/// One port of a service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServicePortSummary {
    /// Port name
    pub name: Option<String>,
    /// Cluster port
    pub port: u16,
    /// External port, when the service is a NodePort
    pub node_port: Option<u16>,
}

/// Trait abstracting the API server
///
/// Create and delete report API failures as [`Error::Api`] carrying the HTTP
/// status so callers can decide which codes are benign.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Query live API discovery
    async fn discover(&self) -> Result<ResourceCatalog>;

    /// Create a resource at a resolved location
    ///
    /// `resource.namespace` is already set for namespaced mappings.
    async fn create(&self, mapping: &RestMapping, resource: &UnstructuredResource) -> Result<()>;

    /// Delete a resource by name at a resolved location
    async fn delete(&self, mapping: &RestMapping, resource: &UnstructuredResource) -> Result<()>;

    /// List pods in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>>;

    /// List services in a namespace
    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceSummary>>;
}

/// Orchestrator backed by a kube client
pub struct KubeOrchestrator {
    client: Client,
}

impl KubeOrchestrator {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an explicit kubeconfig, or the inferred config when `None`
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        Ok(Self::new(create_client(kubeconfig).await?))
    }

    fn dynamic_api(&self, mapping: &RestMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = mapping.api_resource();
        match namespace {
            Some(ns) if mapping.namespaced => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn discover(&self) -> Result<ResourceCatalog> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| Error::discovery(e.to_string()))?;
        let catalog = ResourceCatalog::from_discovery(&discovery);
        debug!(mappings = catalog.len(), "ran API discovery");
        Ok(catalog)
    }

    async fn create(&self, mapping: &RestMapping, resource: &UnstructuredResource) -> Result<()> {
        let obj: DynamicObject = serde_json::from_value(resource.attributes.clone())
            .map_err(|e| Error::serialization_for_kind(resource.kind(), e.to_string()))?;
        self.dynamic_api(mapping, resource.namespace.as_deref())
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| with_object(e, resource))?;
        Ok(())
    }

    async fn delete(&self, mapping: &RestMapping, resource: &UnstructuredResource) -> Result<()> {
        self.dynamic_api(mapping, resource.namespace.as_deref())
            .delete(&resource.name, &DeleteParams::default())
            .await
            .map_err(|e| with_object(e, resource))?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default()).await?;
        Ok(list.items.into_iter().map(pod_summary).collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceSummary>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = services.list(&ListParams::default()).await?;
        Ok(list.items.into_iter().map(service_summary).collect())
    }
}

fn with_object(err: kube::Error, resource: &UnstructuredResource) -> Error {
    match Error::from(err) {
        Error::Api { code, message, .. } => {
            Error::api(resource.kind(), &resource.name, code, message)
        }
        other => other,
    }
}

fn pod_summary(pod: Pod) -> PodSummary {
    let container_ports = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .and_then(|c| c.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .filter_map(|p| u16::try_from(p.container_port).ok())
                .collect()
        })
        .unwrap_or_default();

    PodSummary {
        name: pod.metadata.name.unwrap_or_default(),
        phase: pod.status.and_then(|s| s.phase).unwrap_or_default(),
        labels: pod.metadata.labels.unwrap_or_default(),
        container_ports,
    }
}

fn service_summary(service: Service) -> ServiceSummary {
    let spec = service.spec.unwrap_or_default();
    let ports = spec
        .ports
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            Some(ServicePortSummary {
                port: u16::try_from(p.port).ok()?,
                node_port: p.node_port.and_then(|n| u16::try_from(n).ok()),
                name: p.name,
            })
        })
        .collect();

    ServiceSummary {
        name: service.metadata.name.unwrap_or_default(),
        selector: spec.selector.unwrap_or_default(),
        ports,
    }
}
