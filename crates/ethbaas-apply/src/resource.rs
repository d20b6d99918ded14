//! Generic decoded manifest documents
//!
//! Documents are decoded without knowing their schema: only apiVersion, kind,
//! metadata.name and metadata.namespace are read; everything else rides along
//! as an opaque attribute tree.

use kube::api::GroupVersionKind;
use serde::Deserialize;
use serde_json::Value;

use ethbaas_common::kube_utils::{join_api_version, parse_api_version};
use ethbaas_common::{Error, Result};

/// One decoded manifest document
#[derive(Clone, Debug, PartialEq)]
pub struct UnstructuredResource {
    /// Group, version and kind from `apiVersion` and `kind`
    pub gvk: GroupVersionKind,
    /// `metadata.name`
    pub name: String,
    /// `metadata.namespace`, if set
    pub namespace: Option<String>,
    /// The full document
    pub attributes: Value,
}

impl UnstructuredResource {
    /// Build from a decoded document
    pub fn from_value(source: &str, attributes: Value) -> Result<Self> {
        let api_version = attributes
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode(source, "document missing apiVersion"))?;
        let kind = attributes
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode(source, "document missing kind"))?;
        let name = attributes
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::decode(source, format!("{} document missing metadata.name", kind))
            })?
            .to_string();
        let namespace = attributes
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        let (group, version) = parse_api_version(api_version);
        let gvk = GroupVersionKind {
            group,
            version,
            kind: kind.to_string(),
        };

        Ok(Self {
            gvk,
            name,
            namespace,
            attributes,
        })
    }

    /// apiVersion string
    pub fn api_version(&self) -> String {
        join_api_version(&self.gvk.group, &self.gvk.version)
    }

    /// Kind
    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    /// Set the namespace, keeping the attribute tree in step
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        if let Some(metadata) = self
            .attributes
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
        {
            metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
        }
        self.namespace = Some(namespace);
    }

    /// Drop the namespace from both the field and `metadata`
    pub fn clear_namespace(&mut self) {
        if let Some(metadata) = self
            .attributes
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
        {
            metadata.remove("namespace");
        }
        self.namespace = None;
    }

    /// `Kind/name` for logs and errors
    pub fn describe(&self) -> String {
        format!("{}/{}", self.gvk.kind, self.name)
    }
}

/// Decode a `---` separated YAML stream
///
/// Empty documents are skipped. Decoding stops at the first bad document,
/// which is returned as the last element so callers can act on every good
/// document before it and then surface the error.
pub fn decode_documents(source: &str, content: &str) -> Vec<Result<UnstructuredResource>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let decoded = match Value::deserialize(document) {
            Ok(Value::Null) => continue,
            Ok(value) => UnstructuredResource::from_value(source, value),
            Err(e) => Err(Error::decode(source, e.to_string())),
        };
        let failed = decoded.is_err();
        documents.push(decoded);
        if failed {
            break;
        }
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"
apiVersion: v1
kind: Service
metadata:
  name: node0
  namespace: ethbaas-net1
spec:
  type: NodePort
"#;

    #[test]
    fn test_decode_single_document() {
        let docs = decode_documents("svc_0.yaml", SERVICE);
        assert_eq!(docs.len(), 1);
        let svc = docs[0].as_ref().unwrap();
        assert_eq!(svc.kind(), "Service");
        assert_eq!(svc.gvk.group, "");
        assert_eq!(svc.api_version(), "v1");
        assert_eq!(svc.name, "node0");
        assert_eq!(svc.namespace.as_deref(), Some("ethbaas-net1"));
        assert_eq!(svc.attributes["spec"]["type"], "NodePort");
    }

    #[test]
    fn test_decode_multi_document_skips_empty() {
        let content = format!(
            "---\n{}\n---\n---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: node0\n",
            SERVICE
        );
        let docs = decode_documents("multi.yaml", &content);
        assert_eq!(docs.len(), 2);
        let deploy = docs[1].as_ref().unwrap();
        assert_eq!(deploy.gvk.group, "apps");
        assert_eq!(deploy.namespace, None);
    }

    #[test]
    fn test_decode_stops_at_first_bad_document() {
        let content = format!(
            "{}\n---\napiVersion: v1\nmetadata:\n  name: nokind\n---\n{}",
            SERVICE, SERVICE
        );
        let docs = decode_documents("bad.yaml", &content);
        assert_eq!(docs.len(), 2);
        assert!(docs[0].is_ok());
        assert!(matches!(docs[1], Err(Error::Decode { .. })));
    }

    #[test]
    fn test_decode_empty_stream() {
        assert!(decode_documents("empty.yaml", "").is_empty());
    }

    #[test]
    fn test_set_namespace_updates_attributes() {
        let mut docs = decode_documents(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: configmap\n",
        );
        let mut cm = docs.remove(0).unwrap();
        cm.set_namespace("default");
        assert_eq!(cm.namespace.as_deref(), Some("default"));
        assert_eq!(cm.attributes["metadata"]["namespace"], "default");
        assert_eq!(cm.describe(), "ConfigMap/configmap");

        cm.clear_namespace();
        assert_eq!(cm.namespace, None);
        assert!(cm.attributes["metadata"].get("namespace").is_none());
    }
}
