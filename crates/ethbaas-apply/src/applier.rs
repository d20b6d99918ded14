//! Create or delete every document of a manifest file
//!
//! Each document is resolved against live API discovery, so any kind the
//! cluster serves can be applied without compiled-in bindings.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use ethbaas_common::{Error, Result, DEFAULT_NAMESPACE};

use crate::catalog::ResourceCatalog;
use crate::orchestrator::Orchestrator;
use crate::resource::decode_documents;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Create,
    Delete,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// Applies and deletes manifest streams through an [`Orchestrator`]
///
/// Documents are processed in stream order. The first decode, discovery,
/// mapping or API error stops the stream; documents before it stay applied.
/// Creating an object that already exists and deleting one that is already
/// gone both count as success.
#[derive(Clone)]
pub struct ResourceApplier {
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResourceApplier {
    /// Create an applier over an orchestrator
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// The orchestrator in use
    pub fn orchestrator(&self) -> &Arc<dyn Orchestrator> {
        &self.orchestrator
    }

    /// Create every document in a file; returns the number of documents
    ///
    /// Discovery runs once per non-empty file.
    pub async fn apply_file(&self, path: &Path) -> Result<usize> {
        let content = read_manifest(path).await?;
        self.process(&path.display().to_string(), &content, Action::Create)
            .await
    }

    /// Delete every document in a file; returns the number of documents
    pub async fn delete_file(&self, path: &Path) -> Result<usize> {
        let content = read_manifest(path).await?;
        self.process(&path.display().to_string(), &content, Action::Delete)
            .await
    }

    /// Create every document in an in-memory stream
    pub async fn apply_str(&self, source: &str, content: &str) -> Result<usize> {
        self.process(source, content, Action::Create).await
    }

    /// Delete every document in an in-memory stream
    pub async fn delete_str(&self, source: &str, content: &str) -> Result<usize> {
        self.process(source, content, Action::Delete).await
    }

    async fn process(&self, source: &str, content: &str, action: Action) -> Result<usize> {
        let documents = decode_documents(source, content);
        if documents.is_empty() {
            debug!(source = %source, "no documents");
            return Ok(0);
        }

        let catalog: ResourceCatalog = self.orchestrator.discover().await?;
        let mut processed = 0;

        for document in documents {
            let mut resource = document?;
            let mapping = catalog.resolve(&resource.gvk)?;

            if !mapping.namespaced {
                resource.clear_namespace();
            } else if resource.namespace.is_none() {
                resource.set_namespace(DEFAULT_NAMESPACE);
            }

            let outcome = match action {
                Action::Create => self.orchestrator.create(mapping, &resource).await,
                Action::Delete => self.orchestrator.delete(mapping, &resource).await,
            };

            match outcome {
                Ok(()) => {
                    info!(
                        action = action.as_str(),
                        resource = %resource.describe(),
                        namespace = ?resource.namespace,
                        "processed manifest document"
                    );
                }
                Err(e) if action == Action::Create && e.is_conflict() => {
                    debug!(resource = %resource.describe(), "already exists");
                }
                Err(e) if action == Action::Delete && e.is_api_not_found() => {
                    debug!(resource = %resource.describe(), "already absent");
                }
                Err(e) => return Err(e),
            }
            processed += 1;
        }

        Ok(processed)
    }
}

async fn read_manifest(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RestMapping;
    use crate::orchestrator::MockOrchestrator;
    use ethbaas_common::error::{STATUS_CONFLICT, STATUS_NOT_FOUND};
    use mockall::predicate::always;

    const TWO_DOCS: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: configmap
---
apiVersion: v1
kind: Namespace
metadata:
  name: ethbaas-net1
"#;

    fn catalog() -> ResourceCatalog {
        ResourceCatalog::new(vec![
            RestMapping::new("", "v1", "Namespace", "namespaces", false),
            RestMapping::new("", "v1", "ConfigMap", "configmaps", true),
        ])
    }

    #[tokio::test]
    async fn test_apply_defaults_namespace_only_for_namespaced_kinds() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover().times(1).returning(|| Ok(catalog()));
        mock.expect_create()
            .withf(|m, r| m.kind == "ConfigMap" && r.namespace.as_deref() == Some("default"))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_create()
            .withf(|m, r| m.kind == "Namespace" && r.namespace.is_none())
            .times(1)
            .returning(|_, _| Ok(()));

        let applier = ResourceApplier::new(Arc::new(mock));
        assert_eq!(applier.apply_str("test", TWO_DOCS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cluster_scoped_document_drops_namespace() {
        let content = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ethbaas-net1\n  namespace: stray\n";

        let mut mock = MockOrchestrator::new();
        mock.expect_discover().times(1).returning(|| Ok(catalog()));
        mock.expect_create()
            .withf(|m, r| {
                m.kind == "Namespace"
                    && r.namespace.is_none()
                    && r.attributes["metadata"].get("namespace").is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let applier = ResourceApplier::new(Arc::new(mock));
        assert_eq!(applier.apply_str("test", content).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_kind_stops_stream_after_earlier_documents() {
        let content = format!(
            "{}\n---\napiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n---\n{}",
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a",
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: b"
        );

        let mut mock = MockOrchestrator::new();
        mock.expect_discover().times(1).returning(|| Ok(catalog()));
        mock.expect_create()
            .withf(|_, r| r.name == "a")
            .times(1)
            .returning(|_, _| Ok(()));

        let applier = ResourceApplier::new(Arc::new(mock));
        let err = applier.apply_str("test", &content).await.unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));
    }

    #[tokio::test]
    async fn test_conflict_on_create_is_success() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover().returning(|| Ok(catalog()));
        mock.expect_create()
            .with(always(), always())
            .times(2)
            .returning(|_, r| {
                Err(Error::api(r.kind(), &r.name, Some(STATUS_CONFLICT), "exists"))
            });

        let applier = ResourceApplier::new(Arc::new(mock));
        assert_eq!(applier.apply_str("test", TWO_DOCS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_not_found_on_delete_is_success() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover().returning(|| Ok(catalog()));
        mock.expect_delete()
            .times(2)
            .returning(|_, r| Err(Error::api(r.kind(), &r.name, Some(STATUS_NOT_FOUND), "gone")));

        let applier = ResourceApplier::new(Arc::new(mock));
        assert_eq!(applier.delete_str("test", TWO_DOCS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_not_found_on_create_is_an_error() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover().returning(|| Ok(catalog()));
        mock.expect_create()
            .times(1)
            .returning(|_, r| Err(Error::api(r.kind(), &r.name, Some(STATUS_NOT_FOUND), "no ns")));

        let applier = ResourceApplier::new(Arc::new(mock));
        let err = applier.apply_str("test", TWO_DOCS).await.unwrap_err();
        assert!(err.is_api_not_found());
    }

    #[tokio::test]
    async fn test_discovery_failure_is_surfaced() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover()
            .times(1)
            .returning(|| Err(Error::discovery("connection refused")));
        mock.expect_create().never();

        let applier = ResourceApplier::new(Arc::new(mock));
        let err = applier.apply_str("test", TWO_DOCS).await.unwrap_err();
        assert!(matches!(err, Error::Discovery { .. }));
    }

    #[tokio::test]
    async fn test_empty_stream_skips_discovery() {
        let mut mock = MockOrchestrator::new();
        mock.expect_discover().never();

        let applier = ResourceApplier::new(Arc::new(mock));
        assert_eq!(applier.apply_str("test", "---\n").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let applier = ResourceApplier::new(Arc::new(MockOrchestrator::new()));
        let err = applier
            .apply_file(&dir.path().join("pv_0.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
