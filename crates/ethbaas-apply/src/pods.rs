//! Pod to service binding for a project namespace
//!
//! Each chain pod carries a `node` label that its service selects on. Listing
//! pods together with their service shows which external port reaches which
//! node.

use std::collections::HashMap;

use ethbaas_common::{Error, Result};

use crate::orchestrator::{Orchestrator, PodSummary, ServiceSummary};

/// Label shared by a node's pod and its service selector
pub const NODE_LABEL: &str = "node";

/// A pod and the service that exposes it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodBinding {
    /// Pod name
    pub pod: String,
    /// Pod phase
    pub phase: String,
    /// Ports of the pod's first container
    pub container_ports: Vec<u16>,
    /// Name of the selecting service
    pub service: String,
    /// External ports of the service
    pub node_ports: Vec<u16>,
}

/// Join pods to the services selecting them by the node label
///
/// A pod no service selects is an error: every chain node is expected to be
/// reachable.
pub fn bind_pods(pods: Vec<PodSummary>, services: &[ServiceSummary]) -> Result<Vec<PodBinding>> {
    let by_selector: HashMap<&str, &ServiceSummary> = services
        .iter()
        .filter_map(|svc| svc.selector.get(NODE_LABEL).map(|v| (v.as_str(), svc)))
        .collect();

    pods.into_iter()
        .map(|pod| {
            let service = pod
                .labels
                .get(NODE_LABEL)
                .and_then(|value| by_selector.get(value.as_str()))
                .ok_or_else(|| Error::NotFound {
                    kind: "service for pod".to_string(),
                    name: pod.name.clone(),
                })?;

            Ok(PodBinding {
                service: service.name.clone(),
                node_ports: service.ports.iter().filter_map(|p| p.node_port).collect(),
                pod: pod.name,
                phase: pod.phase,
                container_ports: pod.container_ports,
            })
        })
        .collect()
}

/// List the pods of a namespace with their services
pub async fn list_pod_bindings(
    orchestrator: &dyn Orchestrator,
    namespace: &str,
) -> Result<Vec<PodBinding>> {
    let pods = orchestrator.list_pods(namespace).await?;
    let services = orchestrator.list_services(namespace).await?;
    bind_pods(pods, &services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{MockOrchestrator, ServicePortSummary};
    use std::collections::BTreeMap;

    fn labels(value: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(NODE_LABEL.to_string(), value.to_string())])
    }

    fn pod(name: &str, node: &str) -> PodSummary {
        PodSummary {
            name: name.to_string(),
            phase: "Running".to_string(),
            labels: labels(node),
            container_ports: vec![8545, 8546, 30303, 30303],
        }
    }

    fn service(name: &str, node: &str, node_port: u16) -> ServiceSummary {
        ServiceSummary {
            name: name.to_string(),
            selector: labels(node),
            ports: vec![
                ServicePortSummary {
                    name: Some("http".to_string()),
                    port: 8545,
                    node_port: Some(node_port),
                },
                ServicePortSummary {
                    name: Some("websocket".to_string()),
                    port: 8546,
                    node_port: None,
                },
            ],
        }
    }

    #[test]
    fn test_bind_pods_by_node_label() {
        let pods = vec![pod("node1-abc", "ethbaas-node1"), pod("node0-def", "ethbaas-node0")];
        let services = vec![
            service("node0", "ethbaas-node0", 30545),
            service("node1", "ethbaas-node1", 30546),
        ];

        let bound = bind_pods(pods, &services).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].pod, "node1-abc");
        assert_eq!(bound[0].service, "node1");
        assert_eq!(bound[0].node_ports, vec![30546]);
        assert_eq!(bound[1].service, "node0");
    }

    #[test]
    fn test_unbound_pod_is_an_error() {
        let err = bind_pods(
            vec![pod("stray", "ethbaas-node7")],
            &[service("node0", "ethbaas-node0", 30545)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref name, .. } if name == "stray"));
    }

    #[tokio::test]
    async fn test_list_pod_bindings_queries_namespace() {
        let mut mock = MockOrchestrator::new();
        mock.expect_list_pods()
            .withf(|ns| ns == "ethbaas-net1")
            .returning(|_| Ok(vec![pod("node0-x", "ethbaas-node0")]));
        mock.expect_list_services()
            .withf(|ns| ns == "ethbaas-net1")
            .returning(|_| Ok(vec![service("node0", "ethbaas-node0", 30545)]));

        let bound = list_pod_bindings(&mock, "ethbaas-net1").await.unwrap();
        assert_eq!(bound[0].node_ports, vec![30545]);
    }
}
