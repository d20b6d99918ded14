//! Error types for ethbaas operations
//!
//! Errors carry the context needed to tell which project, manifest, or node
//! an operation failed on. None of them are retried internally; whether a
//! failure is fatal is left to the caller.

use std::path::Path;

use thiserror::Error;

/// HTTP status the API server returns when creating an object that exists
pub const STATUS_CONFLICT: u16 = 409;

/// HTTP status the API server returns for an absent object
pub const STATUS_NOT_FOUND: u16 = 404;

/// Main error type for ethbaas operations
#[derive(Debug, Error)]
pub enum Error {
    /// A project with this name is already initialized
    #[error("project {project} already exists")]
    AlreadyExists {
        /// Name of the existing project
        project: String,
    },

    /// The named object does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// What was looked up (e.g., "project")
        kind: String,
        /// Name that was looked up
        name: String,
    },

    /// A project descriptor failed validation
    #[error("validation error for {project}: {message}")]
    Validation {
        /// Name of the project with invalid configuration
        project: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g., "nodeCount")
        field: Option<String>,
    },

    /// A manifest document could not be decoded
    #[error("decode error in {source_name}: {message}")]
    Decode {
        /// File or stream the document came from
        source_name: String,
        /// Description of what failed
        message: String,
    },

    /// The orchestrator's API discovery could not be queried
    #[error("API discovery failed: {message}")]
    Discovery {
        /// Description of what failed
        message: String,
    },

    /// A resource kind is not served by the orchestrator
    #[error("no REST mapping for {api_version}/{kind}")]
    Mapping {
        /// Requested apiVersion (e.g., "apps/v1")
        api_version: String,
        /// Requested kind (e.g., "Deployment")
        kind: String,
    },

    /// The orchestrator rejected a create or delete
    #[error("API error on {kind}/{name}: {message}")]
    Api {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
        /// HTTP status returned by the API server, if any
        code: Option<u16>,
        /// Description of what failed
        message: String,
    },

    /// A chain node was unreachable or returned a bad response
    #[error("rpc error [{endpoint}]: {message}")]
    Rpc {
        /// Node endpoint (URL or node name)
        endpoint: String,
        /// Description of what failed
        message: String,
    },

    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being read or written
        path: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Project store failure
    #[error("store error: {message}")]
    Store {
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Client or application configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Description of what failed
        message: String,
    },

    /// A batch over a project's manifests stopped part way
    #[error("{operation} of {project} stopped at {failed} after {} manifest(s): {source}", .completed.len())]
    Incomplete {
        /// Batch operation ("start", "stop", "delete")
        operation: String,
        /// Project the batch ran for
        project: String,
        /// Manifests processed successfully before the failure
        completed: Vec<String>,
        /// Manifest that failed
        failed: String,
        /// The failure itself
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a not-found error for a project
    pub fn project_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "project".to_string(),
            name: name.into(),
        }
    }

    /// Create a validation error with project context
    pub fn validation_for(project: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            project: project.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with project context and field name
    pub fn validation_for_field(
        project: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            project: project.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a decode error for a named document source
    pub fn decode(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery {
            message: msg.into(),
        }
    }

    /// Create a mapping error for an unresolvable kind
    pub fn mapping(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Mapping {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Create an API error
    pub fn api(
        kind: impl Into<String>,
        name: impl Into<String>,
        code: Option<u16>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Api {
            kind: kind.into(),
            name: name.into(),
            code,
            message: msg.into(),
        }
    }

    /// Create an RPC error for a node endpoint
    pub fn rpc(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Rpc {
            endpoint: endpoint.into(),
            message: msg.into(),
        }
    }

    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the API server reported the object as already present
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { code: Some(STATUS_CONFLICT), .. })
    }

    /// Whether the API server reported the object as absent
    pub fn is_api_not_found(&self) -> bool {
        matches!(self, Self::Api { code: Some(STATUS_NOT_FOUND), .. })
    }

    /// The innermost error, looking through `Incomplete` batches
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Incomplete { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => Self::Api {
                kind: String::new(),
                name: String::new(),
                code: Some(resp.code),
                message: resp.message,
            },
            other => Self::Api {
                kind: String::new(),
                name: String::new(),
                code: None,
                message: other.to_string(),
            },
        }
    }
}
