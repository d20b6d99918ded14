//! Wiring from resolved settings to the project manager and chain clients

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use ethbaas_apply::{
    KubeOrchestrator, Orchestrator, PodSummary, ResourceCatalog, RestMapping, ServiceSummary,
    UnstructuredResource,
};
use ethbaas_chain::HttpDialer;
use ethbaas_common::ProjectLayout;
use ethbaas_manifest::{GeneratorOptions, GenesisTemplate, ManifestGenerator};
use ethbaas_project::{ProjectManager, SqliteProjectStore};

use crate::config::Settings;
use crate::Result;

/// Kubernetes orchestrator that connects on first use
///
/// Commands that only touch local state (init, list, get, local-only delete)
/// never need cluster credentials.
pub struct LazyKubeOrchestrator {
    kubeconfig: Option<PathBuf>,
    inner: OnceCell<KubeOrchestrator>,
}

impl LazyKubeOrchestrator {
    /// Create an unconnected orchestrator
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self {
            kubeconfig,
            inner: OnceCell::new(),
        }
    }

    /// Whether a connection has been made
    pub fn is_connected(&self) -> bool {
        self.inner.initialized()
    }

    async fn get(&self) -> ethbaas_common::Result<&KubeOrchestrator> {
        self.inner
            .get_or_try_init(|| async {
                debug!(kubeconfig = ?self.kubeconfig, "connecting to cluster");
                KubeOrchestrator::connect(self.kubeconfig.as_deref()).await
            })
            .await
    }
}

#[async_trait]
impl Orchestrator for LazyKubeOrchestrator {
    async fn discover(&self) -> ethbaas_common::Result<ResourceCatalog> {
        self.get().await?.discover().await
    }

    async fn create(
        &self,
        mapping: &RestMapping,
        resource: &UnstructuredResource,
    ) -> ethbaas_common::Result<()> {
        self.get().await?.create(mapping, resource).await
    }

    async fn delete(
        &self,
        mapping: &RestMapping,
        resource: &UnstructuredResource,
    ) -> ethbaas_common::Result<()> {
        self.get().await?.delete(mapping, resource).await
    }

    async fn list_pods(&self, namespace: &str) -> ethbaas_common::Result<Vec<PodSummary>> {
        self.get().await?.list_pods(namespace).await
    }

    async fn list_services(&self, namespace: &str) -> ethbaas_common::Result<Vec<ServiceSummary>> {
        self.get().await?.list_services(namespace).await
    }
}

/// Per-invocation dependencies built from [`Settings`]
pub struct Context {
    settings: Settings,
}

impl Context {
    /// Create a context
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Resolved settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open the store and build a project manager
    pub fn manager(&self) -> Result<ProjectManager> {
        let store = SqliteProjectStore::open(&self.settings.db_path)?;
        let generator = ManifestGenerator::new(
            GeneratorOptions {
                volume_root: self.settings.volume_root.clone(),
                etherbase: self.settings.etherbase.clone(),
                image: self.settings.image.clone(),
            },
            GenesisTemplate::File(self.settings.genesis_path.clone()),
        );
        Ok(ProjectManager::new(
            Arc::new(store),
            ProjectLayout::new(&self.settings.home_dir),
            generator,
            Arc::new(LazyKubeOrchestrator::new(self.settings.kubeconfig.clone())),
        ))
    }

    /// Dialer for project nodes' RPC ports
    pub fn dialer(&self) -> HttpDialer {
        HttpDialer::new(&self.settings.rpc_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_orchestrator_starts_unconnected() {
        let orchestrator = LazyKubeOrchestrator::new(Some(PathBuf::from("/nonexistent")));
        assert!(!orchestrator.is_connected());
    }

    #[tokio::test]
    async fn lazy_orchestrator_surfaces_connect_errors() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = LazyKubeOrchestrator::new(Some(dir.path().join("missing-kubeconfig")));

        let err = orchestrator.discover().await.unwrap_err();

        assert!(matches!(err, ethbaas_common::Error::Config { .. }));
        assert!(!orchestrator.is_connected());
    }
}
