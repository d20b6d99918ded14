//! REST mappings learned from API discovery
//!
//! A [`ResourceCatalog`] is a snapshot of every kind the API server serves,
//! keyed by group/version/kind, with the plural and scope needed to address it.

use kube::api::{ApiResource, GroupVersionKind};
use kube::discovery::{Discovery, Scope};

use ethbaas_common::kube_utils::join_api_version;
use ethbaas_common::{Error, Result};

/// Where a kind lives on the API server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestMapping {
    /// API group ("" for core)
    pub group: String,
    /// API version
    pub version: String,
    /// Kind
    pub kind: String,
    /// Plural resource name used in URLs
    pub plural: String,
    /// Whether objects of this kind live in a namespace
    pub namespaced: bool,
}

impl RestMapping {
    /// Create a mapping
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
            namespaced,
        }
    }

    /// apiVersion string for this mapping
    pub fn api_version(&self) -> String {
        join_api_version(&self.group, &self.version)
    }

    /// Whether this mapping serves `gvk`
    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.group == gvk.group && self.version == gvk.version && self.kind == gvk.kind
    }

    /// kube ApiResource for building a dynamic `Api`
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// All kinds served by the API server at discovery time
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceCatalog {
    mappings: Vec<RestMapping>,
}

impl ResourceCatalog {
    /// Build a catalog from explicit mappings
    pub fn new(mappings: Vec<RestMapping>) -> Self {
        Self { mappings }
    }

    /// Build a catalog from a completed discovery run
    ///
    /// Every served version of every group is included, not only the
    /// preferred one, so manifests pinned to an older version still resolve.
    pub fn from_discovery(discovery: &Discovery) -> Self {
        let mut mappings = Vec::new();
        for group in discovery.groups() {
            for version in group.versions() {
                for (ar, caps) in group.versioned_resources(version) {
                    mappings.push(RestMapping {
                        group: ar.group,
                        version: ar.version,
                        kind: ar.kind,
                        plural: ar.plural,
                        namespaced: matches!(caps.scope, Scope::Namespaced),
                    });
                }
            }
        }
        Self { mappings }
    }

    /// Look up the mapping for a kind
    pub fn resolve(&self, gvk: &GroupVersionKind) -> Result<&RestMapping> {
        self.mappings
            .iter()
            .find(|m| m.matches(gvk))
            .ok_or_else(|| Error::mapping(join_api_version(&gvk.group, &gvk.version), &gvk.kind))
    }

    /// Number of known mappings
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether discovery returned nothing
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gvk(group: &str, version: &str, kind: &str) -> GroupVersionKind {
        GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    fn catalog() -> ResourceCatalog {
        ResourceCatalog::new(vec![
            RestMapping::new("", "v1", "Namespace", "namespaces", false),
            RestMapping::new("", "v1", "Service", "services", true),
            RestMapping::new("apps", "v1", "Deployment", "deployments", true),
        ])
    }

    #[test]
    fn test_resolve_core_and_grouped_kinds() {
        let catalog = catalog();

        let ns = catalog.resolve(&gvk("", "v1", "Namespace")).unwrap();
        assert!(!ns.namespaced);
        assert_eq!(ns.api_version(), "v1");

        let deploy = catalog.resolve(&gvk("apps", "v1", "Deployment")).unwrap();
        assert!(deploy.namespaced);
        assert_eq!(deploy.api_version(), "apps/v1");
        assert_eq!(deploy.api_resource().plural, "deployments");
    }

    #[test]
    fn test_resolve_unknown_kind_is_mapping_error() {
        let err = catalog()
            .resolve(&gvk("example.com", "v1", "Widget"))
            .unwrap_err();
        match err {
            Error::Mapping { api_version, kind } => {
                assert_eq!(api_version, "example.com/v1");
                assert_eq!(kind, "Widget");
            }
            other => panic!("expected Mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_requires_matching_version() {
        assert!(catalog().resolve(&gvk("apps", "v1beta1", "Deployment")).is_err());
    }
}
