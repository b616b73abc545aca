use crate::checks::Checks;
use crate::error::{self, Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, Secret, Service, ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

pub const REGION_LABEL: &str = "failure-domain.beta.kubernetes.io/region";
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

const POLL_INTERVAL: Duration = Duration::from_secs(5);

fn is_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(response) if response.code == 404)
}

/// Create `object` unless an object of the same name exists. Returns `true` if it was created.
async fn create_if_missing<K>(api: &Api<K>, kind: &str, object: &K) -> Result<bool>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    let name = object.meta().name.clone().unwrap_or_default();
    let existing = api.get_opt(&name).await.context(error::GetObjectSnafu {
        kind,
        name: &name,
    })?;
    if existing.is_some() {
        debug!("{} '{}' already exists", kind, name);
        return Ok(false);
    }
    api.create(&PostParams::default(), object)
        .await
        .context(error::CreateObjectSnafu { kind, name: &name })?;
    info!("Created {} '{}'", kind, name);
    Ok(true)
}

/// Delete `object` if it exists, then create it.
async fn replace<K>(api: &Api<K>, kind: &str, object: &K) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    let name = object.meta().name.clone().unwrap_or_default();
    match api.delete(&name, &DeleteParams::default()).await {
        Ok(_) => debug!("Deleted {} '{}'", kind, name),
        Err(e) if is_not_found(&e) => {}
        Err(source) => {
            return Err(Error::DeleteObject {
                kind: kind.to_string(),
                name,
                source,
            })
        }
    }
    api.create(&PostParams::default(), object)
        .await
        .context(error::CreateObjectSnafu { kind, name: &name })?;
    info!("Created {} '{}'", kind, name);
    Ok(())
}

fn metadata(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

pub async fn ensure_namespace(client: Client, name: &str) -> Result<bool> {
    let namespace = Namespace {
        metadata: metadata(None, name),
        ..Default::default()
    };
    create_if_missing(&Api::<Namespace>::all(client), "namespace", &namespace).await
}

pub async fn ensure_service_account(
    client: Client,
    namespace: &str,
    name: &str,
    annotations: BTreeMap<String, String>,
) -> Result<bool> {
    let service_account = ServiceAccount {
        metadata: ObjectMeta {
            annotations: Some(annotations),
            ..metadata(Some(namespace), name)
        },
        ..Default::default()
    };
    create_if_missing(
        &Api::<ServiceAccount>::namespaced(client, namespace),
        "service account",
        &service_account,
    )
    .await
}

pub async fn replace_config_map(
    client: Client,
    namespace: &str,
    name: &str,
    data: BTreeMap<String, String>,
) -> Result<()> {
    let config_map = ConfigMap {
        metadata: metadata(Some(namespace), name),
        data: Some(data),
        ..Default::default()
    };
    replace(
        &Api::<ConfigMap>::namespaced(client, namespace),
        "config map",
        &config_map,
    )
    .await
}

pub async fn replace_secret(
    client: Client,
    namespace: &str,
    name: &str,
    string_data: BTreeMap<String, String>,
) -> Result<()> {
    let secret = Secret {
        metadata: metadata(Some(namespace), name),
        string_data: Some(string_data),
        ..Default::default()
    };
    replace(&Api::<Secret>::namespaced(client, namespace), "secret", &secret).await
}

/// Delete the jobs matching `selector`, leaving their pods to the garbage collector. Returns the
/// names of the deleted jobs.
pub async fn delete_jobs(client: Client, namespace: &str, selector: &str) -> Result<Vec<String>> {
    let jobs = Api::<Job>::namespaced(client, namespace);
    let existing = jobs
        .list(&ListParams::default().labels(selector))
        .await
        .context(error::ListObjectsSnafu { kind: "jobs" })?;
    let mut deleted = Vec::new();
    for job in existing {
        let name = job.name_any();
        match jobs.delete(&name, &DeleteParams::background()).await {
            Ok(_) => info!("Deleted job '{}'", name),
            // already gone
            Err(e) if is_not_found(&e) => {}
            Err(source) => {
                return Err(Error::DeleteObject {
                    kind: "job".to_string(),
                    name,
                    source,
                })
            }
        }
        deleted.push(name);
    }
    Ok(deleted)
}

fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).context(error::ReadManifestSnafu { path })
}

/// Parse every document of a multi-document YAML manifest.
pub fn parse_manifest(path: &Path, manifest: &str) -> Result<Vec<serde_yaml::Value>> {
    serde_yaml::Deserializer::from_str(manifest)
        .map(serde_yaml::Value::deserialize)
        .filter(|document| !matches!(document, Ok(serde_yaml::Value::Null)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context(error::ManifestSnafu { path })
}

fn kind_of(document: &serde_yaml::Value) -> &str {
    document
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
}

fn from_document<K: DeserializeOwned>(path: &Path, document: serde_yaml::Value) -> Result<K> {
    serde_yaml::from_value(document).context(error::ManifestSnafu { path })
}

/// Create every object of the manifest at `path` in `namespace`. Jobs, deployments and services
/// are supported. Returns the kinds and names of the created objects.
pub async fn create_from_manifest(
    client: Client,
    namespace: &str,
    path: &Path,
) -> Result<Vec<(String, String)>> {
    let mut created = Vec::new();
    for document in parse_manifest(path, &read_manifest(path)?)? {
        let kind = kind_of(&document).to_string();
        let name = match kind.as_str() {
            "Job" => {
                let job: Job = from_document(path, document)?;
                create(Api::namespaced(client.clone(), namespace), "job", &job).await?
            }
            "Deployment" => {
                let deployment: Deployment = from_document(path, document)?;
                create(
                    Api::namespaced(client.clone(), namespace),
                    "deployment",
                    &deployment,
                )
                .await?
            }
            "Service" => {
                let service: Service = from_document(path, document)?;
                create(Api::namespaced(client.clone(), namespace), "service", &service).await?
            }
            _ => return error::UnsupportedKindSnafu { path, kind: &kind }.fail(),
        };
        created.push((kind, name));
    }
    Ok(created)
}

async fn create<K>(api: Api<K>, kind: &str, object: &K) -> Result<String>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    let name = object.meta().name.clone().unwrap_or_default();
    api.create(&PostParams::default(), object)
        .await
        .context(error::CreateObjectSnafu { kind, name: &name })?;
    info!("Created {} '{}'", kind, name);
    Ok(name)
}

fn deployment_is_available(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let available = deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or_default();
    available >= desired
}

/// Wait until every replica of the deployment is available.
pub async fn wait_for_deployment(
    client: Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    let deployments = Api::<Deployment>::namespaced(client, namespace);
    tokio::time::timeout(timeout, poll_deployment(&deployments, name))
        .await
        .context(error::TimeoutSnafu {
            kind: "deployment",
            name,
            timeout,
        })?
}

async fn poll_deployment(deployments: &Api<Deployment>, name: &str) -> Result<()> {
    loop {
        let deployment = deployments
            .get_opt(name)
            .await
            .context(error::GetObjectSnafu {
                kind: "deployment",
                name,
            })?;
        if deployment.as_ref().map(deployment_is_available) == Some(true) {
            info!("Deployment '{}' is available", name);
            return Ok(());
        }
        debug!("Deployment '{}' is not available yet. Sleeping {:?}", name, POLL_INTERVAL);
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn has_ready_addresses(endpoints: &Endpoints) -> bool {
    endpoints
        .subsets
        .iter()
        .flatten()
        .any(|subset| subset.addresses.iter().flatten().next().is_some())
}

/// Wait until the service routes to at least one ready pod.
pub async fn wait_for_service(
    client: Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    let endpoints = Api::<Endpoints>::namespaced(client, namespace);
    tokio::time::timeout(timeout, poll_endpoints(&endpoints, name))
        .await
        .context(error::TimeoutSnafu {
            kind: "service",
            name,
            timeout,
        })?
}

async fn poll_endpoints(endpoints: &Api<Endpoints>, name: &str) -> Result<()> {
    loop {
        let current = endpoints
            .get_opt(name)
            .await
            .context(error::GetObjectSnafu {
                kind: "endpoints",
                name,
            })?;
        if current.as_ref().map(has_ready_addresses) == Some(true) {
            info!("Service '{}' has ready endpoints", name);
            return Ok(());
        }
        debug!("Service '{}' has no ready endpoints. Sleeping {:?}", name, POLL_INTERVAL);
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn list_nodes(client: Client) -> Result<Vec<Node>> {
    Ok(Api::<Node>::all(client)
        .list(&ListParams::default())
        .await
        .context(error::ListObjectsSnafu { kind: "nodes" })?
        .items)
}

/// The node count, and the region and instance type labels of every node with an internal IP.
pub fn check_nodes(
    nodes: &[Node],
    expected: usize,
    region: &str,
    instance_type: &str,
    checks: &mut Checks,
) {
    checks.equal("number of nodes", expected, nodes.len());
    for node in nodes {
        let has_internal_ip = node
            .status
            .as_ref()
            .and_then(|status| status.addresses.as_ref())
            .map(|addresses| addresses.iter().any(|address| address.type_ == "InternalIP"))
            .unwrap_or_default();
        if !has_internal_ip {
            continue;
        }
        let labels = node.labels();
        let name = node.name_any();
        checks.equal(
            &format!("region of node '{}'", name),
            Some(region),
            labels.get(REGION_LABEL).map(String::as_str),
        );
        checks.equal(
            &format!("instance type of node '{}'", name),
            Some(instance_type),
            labels.get(INSTANCE_TYPE_LABEL).map(String::as_str),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset, NodeAddress, NodeStatus};
    use maplit::btreemap;

    fn node(name: &str, region: &str, instance_type: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(btreemap! {
                    REGION_LABEL.to_string() => region.to_string(),
                    INSTANCE_TYPE_LABEL.to_string() => instance_type.to_string(),
                }),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: Some(vec![NodeAddress {
                    address: "10.192.0.12".to_string(),
                    type_: "InternalIP".to_string(),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn nodes_match_region_and_flavor() {
        let nodes = vec![
            node("ip-10-192-0-12", "eu-central-1", "t2.medium"),
            node("ip-10-192-32-7", "eu-central-1", "t2.medium"),
        ];
        let mut checks = Checks::new();
        check_nodes(&nodes, 2, "eu-central-1", "t2.medium", &mut checks);
        assert!(checks.failures().is_empty(), "{:?}", checks.failures());
    }

    #[test]
    fn wrong_flavor_and_count_fail() {
        let nodes = vec![node("ip-10-192-0-12", "eu-central-1", "m5.large")];
        let mut checks = Checks::new();
        check_nodes(&nodes, 2, "eu-central-1", "t2.medium", &mut checks);
        assert_eq!(checks.failures().len(), 2);
    }

    #[test]
    fn nodes_without_internal_ip_are_only_counted() {
        let mut unreachable = node("ip-10-192-0-12", "us-east-1", "m5.large");
        unreachable.status = None;
        let mut checks = Checks::new();
        check_nodes(&[unreachable], 1, "eu-central-1", "t2.medium", &mut checks);
        assert!(checks.failures().is_empty());
    }

    #[test]
    fn multi_document_manifest() {
        let manifest = "---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: whoami\n\
            ---\napiVersion: v1\nkind: Service\nmetadata:\n  name: whoami-service\n---\n";
        let documents = parse_manifest(Path::new("whoami.yml"), manifest).unwrap();
        let kinds: Vec<&str> = documents.iter().map(kind_of).collect();
        assert_eq!(kinds, vec!["Deployment", "Service"]);
    }

    #[test]
    fn fixture_manifests_parse() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        for (file, kind) in [
            ("postgres-client.yml", "Job"),
            ("opensearch-client.yml", "Job"),
            ("whoami-deployment.yml", "Deployment"),
        ] {
            let path = fixtures.join(file);
            let documents = parse_manifest(&path, &read_manifest(&path).unwrap()).unwrap();
            assert_eq!(kind_of(&documents[0]), kind);
        }
        let path = fixtures.join("postgres-client.yml");
        let mut documents = parse_manifest(&path, &read_manifest(&path).unwrap()).unwrap();
        let job: Job = from_document(&path, documents.remove(0)).unwrap();
        assert_eq!(job.name_any(), "postgres-client");
    }

    #[test]
    fn availability_of_deployments() {
        let mut deployment = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                available_replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!deployment_is_available(&deployment));
        deployment.status = Some(DeploymentStatus {
            available_replicas: Some(2),
            ..Default::default()
        });
        assert!(deployment_is_available(&deployment));
    }

    #[test]
    fn endpoints_without_addresses_are_not_ready() {
        let mut endpoints = Endpoints {
            subsets: Some(vec![EndpointSubset::default()]),
            ..Default::default()
        };
        assert!(!has_ready_addresses(&endpoints));
        endpoints.subsets = Some(vec![EndpointSubset {
            addresses: Some(vec![EndpointAddress {
                ip: "10.192.33.4".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }]);
        assert!(has_ready_addresses(&endpoints));
    }
}
