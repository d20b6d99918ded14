//! Manifest generation for a project
//!
//! Rendering is a pure function of the project descriptor, the generator
//! options and the genesis template. Writing is a separate step so callers can
//! render into a staging directory and publish it atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use ethbaas_common::{
    Error, ProjectSpec, Result, NODE_AFFINITY_LABEL, P2P_PORT, RPC_PORT, WS_PORT,
};

use crate::k8s::{
    Affinity, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, Deployment,
    DeploymentSpec, DeploymentStrategy, HostPathVolumeSource, LabelSelector, Namespace,
    ObjectMeta, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PersistentVolumeSpec, PodMeta, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount, VolumeResources,
};
use crate::set::{ManifestFile, ManifestKind, ManifestSet};

/// Geth image every node runs
pub const DEFAULT_IMAGE: &str = "docker.io/ethereum/client-go:v1.10.18";

/// Account mining rewards are paid to
pub const DEFAULT_ETHERBASE: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Host directory chain data volumes are created under
pub const DEFAULT_VOLUME_ROOT: &str = "/media/ethbaas";

/// Chain id baked into the genesis template
pub const NETWORK_ID: u32 = 1874;

/// Name of the genesis ConfigMap and its pod volume
pub const GENESIS_CONFIGMAP: &str = "configmap";

/// ConfigMap key (and mounted file name) of the genesis block
pub const GENESIS_KEY: &str = "genesis.json";

/// Size of each node's chain data volume
pub const VOLUME_SIZE: &str = "10Gi";

const CHAINDATA_VOLUME: &str = "chaindata";
const CHAINDATA_PATH: &str = "/chaindata";
const RUN_VOLUME: &str = "run";
const RUN_PATH: &str = "/var/run";
const ACCESS_MODE: &str = "ReadWriteMany";

/// Knobs that vary between installations but not between projects
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Host directory holding `<project>/node<i>` chain data
    pub volume_root: String,
    /// Miner etherbase passed to every node
    pub etherbase: String,
    /// Geth container image
    pub image: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            volume_root: DEFAULT_VOLUME_ROOT.to_string(),
            etherbase: DEFAULT_ETHERBASE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
        }
    }
}

/// Where the genesis block definition comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenesisTemplate {
    /// Read from a file at generation time
    File(PathBuf),
    /// Already in memory
    Inline(String),
}

impl GenesisTemplate {
    /// Load the template content
    ///
    /// The bytes are carried verbatim; they only need to be valid UTF-8 to fit
    /// in a ConfigMap `data` entry.
    pub fn load(&self) -> Result<String> {
        match self {
            Self::Inline(content) => Ok(content.clone()),
            Self::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
                String::from_utf8(bytes).map_err(|e| {
                    Error::serialization_for_kind(
                        ManifestKind::ConfigMap.as_str(),
                        format!("genesis template {} is not UTF-8: {}", path.display(), e),
                    )
                })
            }
        }
    }
}

/// One rendered manifest document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedManifest {
    /// File the document belongs in
    pub file: ManifestFile,
    /// YAML content
    pub content: String,
}

/// Renders and writes the manifests of a project
#[derive(Clone, Debug)]
pub struct ManifestGenerator {
    options: GeneratorOptions,
    genesis: GenesisTemplate,
}

impl ManifestGenerator {
    /// Create a generator
    pub fn new(options: GeneratorOptions, genesis: GenesisTemplate) -> Self {
        Self { options, genesis }
    }

    /// Generator options in use
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Render every manifest of a project, in apply order
    ///
    /// The spec is validated first; an out-of-range port set is rejected
    /// before any port is computed.
    pub fn render(&self, spec: &ProjectSpec) -> Result<Vec<RenderedManifest>> {
        spec.validate()?;
        let genesis = self.genesis.load()?;
        let namespace = spec.namespace();

        ManifestSet::for_project(spec)
            .apply_order()
            .map(|file| {
                let content = match (file.kind, file.index) {
                    (ManifestKind::Namespace, _) => to_yaml(file.kind, &Namespace::new(&namespace)),
                    (ManifestKind::ConfigMap, _) => to_yaml(
                        file.kind,
                        &ConfigMap::new(GENESIS_CONFIGMAP, &namespace)
                            .with_data(GENESIS_KEY, genesis.as_str()),
                    ),
                    (ManifestKind::PersistentVolume, Some(i)) => {
                        to_yaml(file.kind, &self.persistent_volume(spec, i))
                    }
                    (ManifestKind::PersistentVolumeClaim, Some(i)) => {
                        to_yaml(file.kind, &persistent_volume_claim(spec, i))
                    }
                    (ManifestKind::Deployment, Some(i)) => {
                        to_yaml(file.kind, &self.deployment(spec, i))
                    }
                    (ManifestKind::Service, Some(i)) => to_yaml(file.kind, &service(spec, i)),
                    (kind, None) => Err(Error::serialization_for_kind(
                        kind.as_str(),
                        "per-node manifest without a node index",
                    )),
                }?;
                Ok(RenderedManifest {
                    file: file.clone(),
                    content,
                })
            })
            .collect()
    }

    /// Render a project's manifests and write each to its file under `dir`
    ///
    /// `dir` is created if missing. The first write failure aborts generation.
    pub fn generate(&self, spec: &ProjectSpec, dir: &Path) -> Result<ManifestSet> {
        let rendered = self.render(spec)?;

        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        for manifest in &rendered {
            let path = manifest.file.path_in(dir);
            std::fs::write(&path, &manifest.content).map_err(|e| Error::io(&path, e))?;
            debug!(project = %spec.name, file = %manifest.file.file_name, "wrote manifest");
        }

        Ok(ManifestSet::for_project(spec))
    }

    fn persistent_volume(&self, spec: &ProjectSpec, index: u32) -> PersistentVolume {
        let name = volume_name(spec, index);
        PersistentVolume {
            api_version: "v1".to_string(),
            kind: ManifestKind::PersistentVolume.as_str().to_string(),
            metadata: ObjectMeta::cluster_scoped(&name).with_label("app", &name),
            spec: PersistentVolumeSpec {
                capacity: storage(),
                access_modes: vec![ACCESS_MODE.to_string()],
                host_path: HostPathVolumeSource {
                    path: format!(
                        "{}/{}/{}",
                        self.options.volume_root.trim_end_matches('/'),
                        spec.name,
                        node_name(index)
                    ),
                    type_: Some("DirectoryOrCreate".to_string()),
                },
            },
        }
    }

    fn deployment(&self, spec: &ProjectSpec, index: u32) -> Deployment {
        let node = node_name(index);
        let label = pod_label(index);

        let init = Container {
            name: "gen-genesis".to_string(),
            image: self.options.image.clone(),
            command: Some(vec![
                "geth".to_string(),
                "init".to_string(),
                format!("/{}", GENESIS_KEY),
            ]),
            args: Some(vec![format!("--datadir={}", CHAINDATA_PATH)]),
            ports: Vec::new(),
            volume_mounts: vec![
                VolumeMount::new(CHAINDATA_VOLUME, CHAINDATA_PATH),
                VolumeMount {
                    sub_path: Some(GENESIS_KEY.to_string()),
                    ..VolumeMount::new(GENESIS_CONFIGMAP, format!("/{}", GENESIS_KEY))
                },
            ],
        };

        let geth = Container {
            name: node.clone(),
            image: self.options.image.clone(),
            command: None,
            args: Some(self.geth_args()),
            ports: vec![
                ContainerPort {
                    container_port: RPC_PORT,
                    protocol: None,
                },
                ContainerPort {
                    container_port: WS_PORT,
                    protocol: None,
                },
                ContainerPort {
                    container_port: P2P_PORT,
                    protocol: Some("TCP".to_string()),
                },
                ContainerPort {
                    container_port: P2P_PORT,
                    protocol: Some("UDP".to_string()),
                },
            ],
            volume_mounts: vec![
                VolumeMount::new(CHAINDATA_VOLUME, CHAINDATA_PATH),
                VolumeMount {
                    read_only: Some(true),
                    ..VolumeMount::new(RUN_VOLUME, RUN_PATH)
                },
            ],
        };

        Deployment {
            api_version: "apps/v1".to_string(),
            kind: ManifestKind::Deployment.as_str().to_string(),
            metadata: ObjectMeta::namespaced(&node, spec.namespace()).with_label("node", &label),
            spec: DeploymentSpec {
                replicas: 1,
                min_ready_seconds: Some(10),
                selector: LabelSelector::single("node", &label),
                strategy: DeploymentStrategy {
                    type_: "Recreate".to_string(),
                },
                template: PodTemplateSpec {
                    metadata: PodMeta {
                        labels: single_label("node", &label),
                    },
                    spec: PodSpec {
                        affinity: Some(Affinity::require_node_label(NODE_AFFINITY_LABEL, &node)),
                        init_containers: vec![init],
                        containers: vec![geth],
                        volumes: vec![
                            Volume {
                                name: CHAINDATA_VOLUME.to_string(),
                                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                    claim_name: claim_name(index),
                                }),
                                config_map: None,
                                host_path: None,
                            },
                            Volume {
                                name: GENESIS_CONFIGMAP.to_string(),
                                persistent_volume_claim: None,
                                config_map: Some(ConfigMapVolumeSource {
                                    name: GENESIS_CONFIGMAP.to_string(),
                                }),
                                host_path: None,
                            },
                            Volume {
                                name: RUN_VOLUME.to_string(),
                                persistent_volume_claim: None,
                                config_map: None,
                                host_path: Some(HostPathVolumeSource {
                                    path: RUN_PATH.to_string(),
                                    type_: None,
                                }),
                            },
                        ],
                    },
                },
            },
        }
    }

    fn geth_args(&self) -> Vec<String> {
        vec![
            format!("--datadir={}", CHAINDATA_PATH),
            format!("--networkid={}", NETWORK_ID),
            "--mine".to_string(),
            "--miner.threads=1".to_string(),
            format!("--miner.etherbase={}", self.options.etherbase),
            "--http".to_string(),
            "--http.api=admin,web3,eth,net,debug,personal".to_string(),
            "--http.corsdomain=*".to_string(),
            "--http.addr=0.0.0.0".to_string(),
            "--rpc.allow-unprotected-txs".to_string(),
            "--gcmode=archive".to_string(),
            "--nodiscover".to_string(),
        ]
    }
}

fn persistent_volume_claim(spec: &ProjectSpec, index: u32) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        api_version: "v1".to_string(),
        kind: ManifestKind::PersistentVolumeClaim.as_str().to_string(),
        metadata: ObjectMeta::namespaced(claim_name(index), spec.namespace()),
        spec: PersistentVolumeClaimSpec {
            access_modes: vec![ACCESS_MODE.to_string()],
            resources: VolumeResources { requests: storage() },
            selector: LabelSelector::single("app", volume_name(spec, index)),
        },
    }
}

fn service(spec: &ProjectSpec, index: u32) -> Service {
    let node = node_name(index);
    Service {
        api_version: "v1".to_string(),
        kind: ManifestKind::Service.as_str().to_string(),
        metadata: ObjectMeta::namespaced(&node, spec.namespace()).with_label("node", &node),
        spec: ServiceSpec {
            selector: single_label("node", pod_label(index)),
            type_: "NodePort".to_string(),
            ports: vec![
                ServicePort {
                    node_port: Some(spec.node_port(index)),
                    ..ServicePort::same("http", RPC_PORT, "TCP")
                },
                ServicePort::same("websocket", WS_PORT, "TCP"),
                ServicePort::same("p2p-tcp", P2P_PORT, "TCP"),
                ServicePort::same("p2p-udp", P2P_PORT, "UDP"),
            ],
        },
    }
}

/// Name of node `index` (`node<i>`), shared by its Deployment, Service and container
pub fn node_name(index: u32) -> String {
    format!("node{}", index)
}

/// Pod label value selecting node `index` (`ethbaas-node<i>`)
pub fn pod_label(index: u32) -> String {
    format!("ethbaas-node{}", index)
}

fn volume_name(spec: &ProjectSpec, index: u32) -> String {
    format!("{}-node{}-pv", spec.name, index)
}

fn claim_name(index: u32) -> String {
    format!("node{}-pv", index)
}

fn storage() -> BTreeMap<String, String> {
    single_label("storage", VOLUME_SIZE)
}

fn single_label(key: &str, value: impl Into<String>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(key.to_string(), value.into());
    map
}

fn to_yaml<T: Serialize>(kind: ManifestKind, resource: &T) -> Result<String> {
    serde_yaml::to_string(resource)
        .map_err(|e| Error::serialization_for_kind(kind.as_str(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = r#"{"config":{"chainId":1874},"difficulty":"1","gasLimit":"8000000"}"#;

    fn generator() -> ManifestGenerator {
        ManifestGenerator::new(
            GeneratorOptions::default(),
            GenesisTemplate::Inline(GENESIS.to_string()),
        )
    }

    fn rendered(spec: &ProjectSpec, file_name: &str) -> String {
        generator()
            .render(spec)
            .unwrap()
            .into_iter()
            .find(|m| m.file.file_name == file_name)
            .map(|m| m.content)
            .unwrap()
    }

    #[test]
    fn test_renders_four_per_node_plus_two() {
        for n in 1..=4 {
            let spec = ProjectSpec::new("net1", n, 30545);
            assert_eq!(generator().render(&spec).unwrap().len(), 4 * n as usize + 2);
        }
    }

    #[test]
    fn test_render_rejects_ports_past_the_range() {
        let err = generator()
            .render(&ProjectSpec::new("net1", 3, 65535))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_render_is_deterministic() {
        let spec = ProjectSpec::new("net1", 3, 30545);
        assert_eq!(generator().render(&spec).unwrap(), generator().render(&spec).unwrap());
    }

    #[test]
    fn test_services_expose_contiguous_node_ports() {
        let spec = ProjectSpec::new("net1", 3, 30545);
        for (i, expected) in [30545u16, 30546, 30547].iter().enumerate() {
            let svc: Service =
                serde_yaml::from_str(&rendered(&spec, &format!("svc_{}.yaml", i))).unwrap();
            assert_eq!(svc.spec.type_, "NodePort");
            assert_eq!(svc.spec.ports[0].name, "http");
            assert_eq!(svc.spec.ports[0].node_port, Some(*expected));
            assert!(svc.spec.ports[1..].iter().all(|p| p.node_port.is_none()));
            assert_eq!(
                svc.spec.selector.get("node"),
                Some(&format!("ethbaas-node{}", i))
            );
        }
    }

    #[test]
    fn test_namespace_and_configmap() {
        let spec = ProjectSpec::new("net1", 1, 30545);

        let ns: Namespace = serde_yaml::from_str(&rendered(&spec, "1.ns.yaml")).unwrap();
        assert_eq!(ns.metadata.name, "ethbaas-net1");
        assert_eq!(ns.metadata.namespace, None);

        let cm: ConfigMap = serde_yaml::from_str(&rendered(&spec, "cm.yaml")).unwrap();
        assert_eq!(cm.metadata.name, "configmap");
        assert_eq!(cm.metadata.namespace.as_deref(), Some("ethbaas-net1"));
        assert_eq!(cm.data.get("genesis.json").map(String::as_str), Some(GENESIS));
    }

    #[test]
    fn test_volume_and_claim_are_paired() {
        let spec = ProjectSpec::new("net1", 2, 30545);

        let pv: PersistentVolume = serde_yaml::from_str(&rendered(&spec, "pv_1.yaml")).unwrap();
        assert_eq!(pv.metadata.name, "net1-node1-pv");
        assert_eq!(pv.metadata.namespace, None);
        assert_eq!(pv.spec.host_path.path, "/media/ethbaas/net1/node1");
        assert_eq!(pv.spec.host_path.type_.as_deref(), Some("DirectoryOrCreate"));
        assert_eq!(pv.spec.capacity.get("storage").map(String::as_str), Some("10Gi"));

        let pvc: PersistentVolumeClaim =
            serde_yaml::from_str(&rendered(&spec, "pvc_1.yaml")).unwrap();
        assert_eq!(pvc.metadata.name, "node1-pv");
        assert_eq!(pvc.spec.access_modes, vec!["ReadWriteMany"]);
        assert_eq!(pvc.spec.selector.match_labels, pv.metadata.labels);
    }

    #[test]
    fn test_deployment_runs_geth_pinned_to_its_node() {
        let spec = ProjectSpec::new("net1", 2, 30545);
        let deploy: Deployment =
            serde_yaml::from_str(&rendered(&spec, "deploy_1.yaml")).unwrap();

        assert_eq!(deploy.metadata.name, "node1");
        assert_eq!(deploy.spec.replicas, 1);
        assert_eq!(deploy.spec.min_ready_seconds, Some(10));
        assert_eq!(deploy.spec.strategy.type_, "Recreate");

        let pod = &deploy.spec.template.spec;
        let requirement = &pod
            .affinity
            .as_ref()
            .unwrap()
            .node_affinity
            .required_during_scheduling_ignored_during_execution
            .node_selector_terms[0]
            .match_expressions[0];
        assert_eq!(requirement.key, "ethbaas_node");
        assert_eq!(requirement.values, vec!["node1"]);

        assert_eq!(pod.init_containers[0].name, "gen-genesis");
        let geth = &pod.containers[0];
        assert_eq!(geth.image, DEFAULT_IMAGE);
        let ports: Vec<u16> = geth.ports.iter().map(|p| p.container_port).collect();
        assert_eq!(ports, vec![8545, 8546, 30303, 30303]);
        let args = geth.args.as_ref().unwrap();
        assert!(args.contains(&"--networkid=1874".to_string()));
        assert!(args.contains(&format!("--miner.etherbase={}", DEFAULT_ETHERBASE)));

        let claim = pod
            .volumes
            .iter()
            .find_map(|v| v.persistent_volume_claim.as_ref())
            .unwrap();
        assert_eq!(claim.claim_name, "node1-pv");
    }

    #[test]
    fn test_options_flow_into_manifests() {
        let options = GeneratorOptions {
            volume_root: "/data/chains/".to_string(),
            etherbase: "0xabc".to_string(),
            image: "registry.local/geth:dev".to_string(),
        };
        let gen = ManifestGenerator::new(options, GenesisTemplate::Inline("{}".to_string()));
        let spec = ProjectSpec::new("net1", 1, 30545);
        let out = gen.render(&spec).unwrap();

        let pv = out.iter().find(|m| m.file.file_name == "pv_0.yaml").unwrap();
        assert!(pv.content.contains("/data/chains/net1/node0"));
        let deploy = out.iter().find(|m| m.file.file_name == "deploy_0.yaml").unwrap();
        assert!(deploy.content.contains("registry.local/geth:dev"));
        assert!(deploy.content.contains("--miner.etherbase=0xabc"));
    }

    #[test]
    fn test_generate_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("net1");
        let spec = ProjectSpec::new("net1", 2, 30000);

        let set = generator().generate(&spec, &home).unwrap();
        assert_eq!(set.len(), 10);
        for file in set.apply_order() {
            let content = std::fs::read_to_string(file.path_in(&home)).unwrap();
            let doc: serde_json::Value = serde_yaml::from_str(&content).unwrap();
            assert_eq!(doc["kind"], file.kind.as_str());
        }
    }

    #[test]
    fn test_missing_genesis_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("net1");
        let gen = ManifestGenerator::new(
            GeneratorOptions::default(),
            GenesisTemplate::File(dir.path().join("missing.json")),
        );

        let err = gen
            .generate(&ProjectSpec::new("net1", 1, 30000), &home)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!home.exists());
    }

    #[test]
    fn test_genesis_file_is_carried_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, GENESIS).unwrap();
        assert_eq!(GenesisTemplate::File(path).load().unwrap(), GENESIS);
    }
}
