//! Apply/delete against an in-memory cluster that behaves like an API server:
//! 409 on duplicate create, 404 on delete of an absent object.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ethbaas_apply::{
    Orchestrator, PodSummary, ResourceApplier, ResourceCatalog, RestMapping, ServiceSummary,
    UnstructuredResource,
};
use ethbaas_common::error::{STATUS_CONFLICT, STATUS_NOT_FOUND};
use ethbaas_common::{Error, Result};

type Key = (String, Option<String>, String);

#[derive(Default)]
struct InMemoryCluster {
    objects: Mutex<BTreeSet<Key>>,
}

impl InMemoryCluster {
    fn key(resource: &UnstructuredResource) -> Key {
        (
            resource.kind().to_string(),
            resource.namespace.clone(),
            resource.name.clone(),
        )
    }

    fn contains(&self, kind: &str, namespace: Option<&str>, name: &str) -> bool {
        self.objects.lock().unwrap().contains(&(
            kind.to_string(),
            namespace.map(str::to_string),
            name.to_string(),
        ))
    }

    fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl Orchestrator for InMemoryCluster {
    async fn discover(&self) -> Result<ResourceCatalog> {
        Ok(ResourceCatalog::new(vec![
            RestMapping::new("", "v1", "Namespace", "namespaces", false),
            RestMapping::new("", "v1", "ConfigMap", "configmaps", true),
            RestMapping::new("", "v1", "PersistentVolume", "persistentvolumes", false),
            RestMapping::new("", "v1", "Service", "services", true),
            RestMapping::new("apps", "v1", "Deployment", "deployments", true),
        ]))
    }

    async fn create(&self, _: &RestMapping, resource: &UnstructuredResource) -> Result<()> {
        if self.objects.lock().unwrap().insert(Self::key(resource)) {
            Ok(())
        } else {
            Err(Error::api(resource.kind(), &resource.name, Some(STATUS_CONFLICT), "exists"))
        }
    }

    async fn delete(&self, _: &RestMapping, resource: &UnstructuredResource) -> Result<()> {
        if self.objects.lock().unwrap().remove(&Self::key(resource)) {
            Ok(())
        } else {
            Err(Error::api(resource.kind(), &resource.name, Some(STATUS_NOT_FOUND), "not found"))
        }
    }

    async fn list_pods(&self, _: &str) -> Result<Vec<PodSummary>> {
        Ok(Vec::new())
    }

    async fn list_services(&self, _: &str) -> Result<Vec<ServiceSummary>> {
        Ok(Vec::new())
    }
}

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: node0
  namespace: ethbaas-net1
spec:
  replicas: 1
"#;

const VOLUME: &str = r#"apiVersion: v1
kind: PersistentVolume
metadata:
  name: net1-node0-pv
"#;

#[tokio::test]
async fn apply_then_delete_leaves_resource_absent_from_empty_cluster() {
    let cluster = Arc::new(InMemoryCluster::default());
    let applier = ResourceApplier::new(cluster.clone());

    applier.apply_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();
    assert!(cluster.contains("Deployment", Some("ethbaas-net1"), "node0"));

    applier.delete_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();
    assert_eq!(cluster.len(), 0);
}

#[tokio::test]
async fn apply_then_delete_leaves_resource_absent_when_already_present() {
    let cluster = Arc::new(InMemoryCluster::default());
    let applier = ResourceApplier::new(cluster.clone());

    applier.apply_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();
    applier.apply_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();
    applier.delete_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();
    applier.delete_str("deploy_0.yaml", DEPLOYMENT).await.unwrap();

    assert_eq!(cluster.len(), 0);
}

#[tokio::test]
async fn namespaced_documents_without_namespace_land_in_default() {
    let cluster = Arc::new(InMemoryCluster::default());
    let applier = ResourceApplier::new(cluster.clone());

    applier
        .apply_str(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: configmap\ndata:\n  a: b\n",
        )
        .await
        .unwrap();

    assert!(cluster.contains("ConfigMap", Some("default"), "configmap"));
}

#[tokio::test]
async fn undiscoverable_kind_fails_and_keeps_earlier_documents() {
    let cluster = Arc::new(InMemoryCluster::default());
    let applier = ResourceApplier::new(cluster.clone());
    let stream = format!(
        "{}---\napiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n---\n{}",
        VOLUME, DEPLOYMENT
    );

    let err = applier.apply_str("mixed.yaml", &stream).await.unwrap_err();

    assert!(matches!(err, Error::Mapping { ref kind, .. } if kind == "Widget"));
    assert_eq!(cluster.len(), 1);
    assert!(cluster.contains("PersistentVolume", None, "net1-node0-pv"));
    assert!(!cluster.contains("Deployment", Some("ethbaas-net1"), "node0"));
}

#[tokio::test]
async fn files_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy_0.yaml");
    std::fs::write(&path, DEPLOYMENT).unwrap();

    let cluster = Arc::new(InMemoryCluster::default());
    let applier = ResourceApplier::new(cluster.clone());

    assert_eq!(applier.apply_file(&path).await.unwrap(), 1);
    assert_eq!(applier.delete_file(&path).await.unwrap(), 1);
    assert_eq!(cluster.len(), 0);
}
