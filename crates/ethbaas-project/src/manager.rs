//! Project lifecycle
//!
//! ```text
//! Uninitialized --init--> Initialized --start--> Running
//!                              |                  |  ^
//!                              |                stop |start
//!                              |                  v  |
//!                              +----delete----> Stopped --delete--> Deleted
//! ```
//!
//! Batches run strictly in manifest order and stop at the first failing file.
//! Nothing is rolled back: whatever was applied before the failure stays, and
//! the returned [`Error::Incomplete`] says exactly how far the batch got.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use ethbaas_apply::{list_pod_bindings, Orchestrator, PodBinding, ResourceApplier};
use ethbaas_common::{Error, ProjectLayout, ProjectRecord, ProjectSpec, Result};
use ethbaas_manifest::{ManifestFile, ManifestGenerator, ManifestSet, RenderedManifest};

use crate::store::ProjectStore;

/// Batch operation over a project's manifests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOperation {
    /// Create every manifest, lowest rank first
    Start,
    /// Delete every manifest, highest rank first
    Stop,
    /// Teardown before removing the project
    Delete,
}

impl BatchOperation {
    /// Operation name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
        }
    }

    fn creates(&self) -> bool {
        matches!(self, Self::Start)
    }
}

/// Outcome of a batch that ran to completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport {
    /// Project the batch ran for
    pub project: String,
    /// What the batch did
    pub operation: BatchOperation,
    /// Manifest files processed, in order
    pub processed: Vec<String>,
    /// Documents created or deleted across all files
    pub documents: usize,
}

/// How `delete` treats live cluster objects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Delete the project's cluster objects before removing local state
    #[default]
    Teardown,
    /// Remove only the manifests and the record
    ///
    /// Anything still running in the cluster is orphaned and has to be
    /// removed by hand (deleting the `ethbaas-<name>` namespace and the
    /// project's PersistentVolumes).
    LocalOnly,
}

/// Every project in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectList {
    /// Number of projects
    pub count: usize,
    /// Records ordered by name
    pub projects: Vec<ProjectRecord>,
}

/// Sequences manifest generation, apply and delete against the project store
///
/// Callers must serialize operations on the same project name.
pub struct ProjectManager {
    store: Arc<dyn ProjectStore>,
    layout: ProjectLayout,
    generator: ManifestGenerator,
    applier: ResourceApplier,
}

impl ProjectManager {
    /// Create a manager
    pub fn new(
        store: Arc<dyn ProjectStore>,
        layout: ProjectLayout,
        generator: ManifestGenerator,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        Self {
            store,
            layout,
            generator,
            applier: ResourceApplier::new(orchestrator),
        }
    }

    /// Where project manifests live
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Generate a project's manifests and persist its record
    ///
    /// Manifests are rendered into a staging directory, the record is
    /// inserted, and only then is the directory moved into place. Any failure
    /// undoes the earlier steps, so the project either fully exists or not at
    /// all.
    #[instrument(skip(self, spec), fields(project = %spec.name))]
    pub async fn init(&self, spec: &ProjectSpec) -> Result<ProjectRecord> {
        spec.validate()?;

        if self.store.exists(&spec.name)? {
            return Err(Error::AlreadyExists {
                project: spec.name.clone(),
            });
        }
        let home = self.layout.home(&spec.name);
        if path_exists(&home).await? {
            warn!(home = %home.display(), "project directory exists without a record");
            return Err(Error::AlreadyExists {
                project: spec.name.clone(),
            });
        }

        let staging = self.layout.staging(&spec.name);
        remove_dir_if_present(&staging).await?;

        if let Err(e) = self.generator.generate(spec, &staging) {
            discard_staging(&staging).await;
            return Err(e);
        }

        let record = ProjectRecord::new(spec, Utc::now().timestamp());
        if let Err(e) = self.store.insert(&record) {
            discard_staging(&staging).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&staging, &home).await {
            if let Err(undo) = self.store.delete(&spec.name) {
                warn!(error = %undo, "failed to remove record after publish failure");
            }
            discard_staging(&staging).await;
            return Err(Error::io(&home, e));
        }

        info!(
            nodes = spec.node_count,
            namespace = %spec.namespace(),
            home = %home.display(),
            "project initialized"
        );
        Ok(record)
    }

    /// Apply every manifest of a project and mark it running
    #[instrument(skip(self))]
    pub async fn start(&self, name: &str) -> Result<BatchReport> {
        let mut record = self.store.get(name)?;
        let report = self.run_batch(&record, BatchOperation::Start).await?;

        record.running = true;
        self.store.update(&record)?;
        info!(manifests = report.processed.len(), "project started");
        Ok(report)
    }

    /// Delete every manifest of a project and mark it stopped
    #[instrument(skip(self))]
    pub async fn stop(&self, name: &str) -> Result<BatchReport> {
        let mut record = self.store.get(name)?;
        let report = self.run_batch(&record, BatchOperation::Stop).await?;

        record.running = false;
        self.store.update(&record)?;
        info!(manifests = report.processed.len(), "project stopped");
        Ok(report)
    }

    /// Remove a project: cluster objects (unless `LocalOnly`), manifests, record
    ///
    /// A failed teardown leaves the manifests and record in place so the
    /// delete can be retried. Manifests missing from the project home are
    /// regenerated from the record, and a leftover staging directory is
    /// removed along with the home.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str, mode: DeleteMode) -> Result<Option<BatchReport>> {
        let record = self.store.get(name)?;

        let report = match mode {
            DeleteMode::Teardown => Some(self.run_batch(&record, BatchOperation::Delete).await?),
            DeleteMode::LocalOnly => {
                if record.running {
                    warn!(
                        namespace = %record.namespace(),
                        "deleting running project without teardown; cluster objects are orphaned"
                    );
                }
                None
            }
        };

        remove_dir_if_present(&self.layout.staging(name)).await?;
        remove_dir_if_present(&self.layout.home(name)).await?;
        self.store.delete(name)?;
        info!("project deleted");
        Ok(report)
    }

    /// All projects
    pub fn list(&self) -> Result<ProjectList> {
        let projects = self.store.list()?;
        Ok(ProjectList {
            count: projects.len(),
            projects,
        })
    }

    /// One project
    pub fn get(&self, name: &str) -> Result<ProjectRecord> {
        self.store.get(name)
    }

    /// Pods of a project joined to the services exposing them
    pub async fn pods(&self, name: &str) -> Result<Vec<PodBinding>> {
        let record = self.store.get(name)?;
        list_pod_bindings(self.applier.orchestrator().as_ref(), &record.namespace()).await
    }

    async fn run_batch(
        &self,
        record: &ProjectRecord,
        operation: BatchOperation,
    ) -> Result<BatchReport> {
        let set = ManifestSet::for_node_count(record.node_count);
        let files: Vec<&ManifestFile> = if operation.creates() {
            set.apply_order().collect()
        } else {
            set.delete_order().collect()
        };

        let home = self.layout.home(&record.name);
        let mut processed = Vec::with_capacity(files.len());
        let mut documents = 0;
        let mut regenerated = None;

        for file in files {
            let path = file.path_in(&home);
            let result = if operation.creates() {
                self.applier.apply_file(&path).await
            } else {
                self.delete_manifest(record, file, &path, &mut regenerated)
                    .await
            };

            match result {
                Ok(count) => {
                    documents += count;
                    processed.push(file.file_name.clone());
                }
                Err(source) => {
                    warn!(
                        operation = operation.as_str(),
                        file = %file.file_name,
                        completed = processed.len(),
                        error = %source,
                        "batch stopped"
                    );
                    return Err(Error::Incomplete {
                        operation: operation.as_str().to_string(),
                        project: record.name.clone(),
                        completed: processed,
                        failed: file.file_name.clone(),
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(BatchReport {
            project: record.name.clone(),
            operation,
            processed,
            documents,
        })
    }

    /// Delete the documents of one manifest file
    ///
    /// When the file is gone the project's manifests are rendered again from
    /// the record, once per batch, and the matching document is deleted.
    async fn delete_manifest(
        &self,
        record: &ProjectRecord,
        file: &ManifestFile,
        path: &Path,
        regenerated: &mut Option<Vec<RenderedManifest>>,
    ) -> Result<usize> {
        if path_exists(path).await? {
            return self.applier.delete_file(path).await;
        }

        if regenerated.is_none() {
            warn!(
                file = %file.file_name,
                "manifest missing from project home; regenerating for teardown"
            );
            *regenerated = Some(self.generator.render(&record.spec()?)?);
        }

        let content = regenerated
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|m| m.file.file_name == file.file_name)
            .map(|m| m.content.as_str())
            .ok_or_else(|| {
                Error::serialization_for_kind(file.kind.as_str(), "manifest was not regenerated")
            })?;
        self.applier
            .delete_str(&path.display().to_string(), content)
            .await
    }
}

async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io(path, e))
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = remove_dir_if_present(staging).await {
        warn!(error = %e, "failed to remove staging directory");
    }
}
