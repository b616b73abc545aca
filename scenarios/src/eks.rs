use crate::aws::AwsClients;
use crate::checks::Checks;
use crate::error::{self, Result};
use aws_sdk_ec2::model::Filter;
use aws_sdk_eks::model::{Cluster, UpdateStatus};
use aws_sdk_kms::types::SdkError;
use lifecycle::Outputs;
use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use std::time::Duration;

/// The addons every cluster of the module installs.
pub const EXPECTED_ADDONS: &[&str] = &["coredns", "kube-proxy", "vpc-cni", "aws-ebs-csi-driver"];

/// Outputs of the cluster module that must never be empty.
pub const REQUIRED_OUTPUTS: &[&str] = &[
    "cluster_endpoint",
    "cluster_security_group_id",
    "cluster_security_group_arn",
    "cluster_primary_security_group_id",
    "cluster_iam_role_arn",
    "ebs_cs_arn",
    "external_dns_arn",
    "vpc_id",
    "private_vpc_cidr_blocks",
    "private_subnet_ids",
    "default_security_group_id",
    "vpc_main_route_table_id",
    "private_route_table_ids",
    "access_entries",
];

/// The first three /19 blocks of the node CIDR `10.192.0.0/16`.
pub const PRIVATE_CIDR_BLOCKS: &[&str] =
    &["10.192.0.0/19", "10.192.32.0/19", "10.192.64.0/19"];
/// The next three /19 blocks of the node CIDR `10.192.0.0/16`.
pub const PUBLIC_CIDR_BLOCKS: &[&str] =
    &["10.192.96.0/19", "10.192.128.0/19", "10.192.160.0/19"];

/// The instance type of the module's default node group.
pub const NODE_INSTANCE_TYPE: &str = "t2.medium";

const UPDATE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// DescribeKey answers 400 for keys the caller may list but not describe.
const KMS_ACCESS_DENIED_STATUS: u16 = 400;

/// The VPC and subnets a cluster runs in; databases and domains are placed in the same network.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterNetwork {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
}

pub async fn describe_cluster(eks_client: &aws_sdk_eks::Client, name: &str) -> Result<Cluster> {
    eks_client
        .describe_cluster()
        .name(name)
        .send()
        .await
        .context(error::DescribeClusterSnafu { cluster: name })?
        .cluster
        .context(error::MissingFieldSnafu { what: "cluster" })
}

/// The issuer of the cluster's OIDC provider without its scheme, e.g.
/// `oidc.eks.eu-central-1.amazonaws.com/id/0123456789ABCDEF`.
pub fn oidc_provider_id(cluster: &Cluster) -> Result<String> {
    let issuer = cluster
        .identity
        .as_ref()
        .and_then(|identity| identity.oidc.as_ref())
        .and_then(|oidc| oidc.issuer.as_deref())
        .context(error::MissingFieldSnafu {
            what: "cluster.identity.oidc.issuer",
        })?;
    Ok(issuer.replace("https://", ""))
}

pub fn cluster_network(cluster: &Cluster) -> Result<ClusterNetwork> {
    let vpc_config = cluster
        .resources_vpc_config
        .as_ref()
        .context(error::MissingFieldSnafu {
            what: "cluster.resources_vpc_config",
        })?;
    Ok(ClusterNetwork {
        vpc_id: vpc_config
            .vpc_id
            .clone()
            .context(error::MissingFieldSnafu {
                what: "cluster.resources_vpc_config.vpc_id",
            })?,
        subnet_ids: vpc_config.subnet_ids.clone().unwrap_or_default(),
    })
}

/// `<major>.<minor>` with the minor version incremented, e.g. `1.28` to `1.29`.
pub fn increment_minor_version(version: &str) -> Result<String> {
    let (major, minor) = version
        .split_once('.')
        .context(error::InvalidVersionSnafu { version })?;
    let minor: u32 = minor
        .parse()
        .ok()
        .context(error::InvalidVersionSnafu { version })?;
    Ok(format!("{}.{}", major, minor + 1))
}

/// The roles created next to every cluster.
pub fn cluster_role_names(cluster_name: &str) -> Vec<String> {
    ["cert-manager-role", "external-dns-role", "ebs-cs-role", "eks-iam-role"]
        .iter()
        .map(|suffix| format!("{}-{}", cluster_name, suffix))
        .collect()
}

/// The outputs of the cluster module: nothing required is empty, the role name follows the
/// cluster name and the VPC is split into the expected private and public blocks.
pub fn check_cluster_outputs(outputs: &Outputs, cluster_name: &str, checks: &mut Checks) {
    for name in REQUIRED_OUTPUTS {
        if let Some(value) = checks.ok(&format!("output '{}'", name), outputs.string(name)) {
            checks.not_empty(&format!("output '{}'", name), &value);
        }
    }

    let role = outputs.string("cluster_iam_role_name");
    if let Some(role) = checks.ok("output 'cluster_iam_role_name'", role) {
        checks.equal(
            "cluster_iam_role_name",
            format!("{}-eks-iam-role", cluster_name),
            role,
        );
    }

    for (name, expected) in [
        ("private_vpc_cidr_blocks", PRIVATE_CIDR_BLOCKS),
        ("public_vpc_cidr_blocks", PUBLIC_CIDR_BLOCKS),
    ] {
        if let Some(blocks) = checks.ok(&format!("output '{}'", name), outputs.list(name)) {
            let blocks: Vec<&str> = blocks.iter().map(String::as_str).collect();
            checks.equal(name, expected.to_vec(), blocks);
        }
    }
}

/// The cloud resources around a cluster: addons, roles, the VPC and the secret encryption key.
pub async fn check_cluster_resources(
    clients: &AwsClients,
    cluster_name: &str,
    checks: &mut Checks,
) -> Result<()> {
    let installed = list_addons(&clients.eks_client, cluster_name).await?;
    for addon in EXPECTED_ADDONS {
        checks.check(
            installed.iter().any(|installed| installed.as_str() == *addon),
            format!("addon '{}' is installed on '{}'", addon, cluster_name),
        );
    }

    for role in cluster_role_names(cluster_name) {
        let found = role_exists(&clients.iam_client, &role).await;
        checks.ok(&format!("role '{}' exists", role), found);
    }

    let vpc_name = format!("{}-vpc", cluster_name);
    let vpcs = count_vpcs_named(&clients.ec2_client, &vpc_name).await?;
    checks.equal(&format!("VPCs named '{}'", vpc_name), 1, vpcs);

    let description = format!("{} -  EKS Secret Encryption Key", cluster_name);
    let key = find_key_by_description(&clients.kms_client, &description).await?;
    checks.check(key.is_some(), format!("KMS key '{}' exists", description));
    Ok(())
}

pub async fn list_addons(
    eks_client: &aws_sdk_eks::Client,
    cluster_name: &str,
) -> Result<Vec<String>> {
    Ok(eks_client
        .list_addons()
        .cluster_name(cluster_name)
        .send()
        .await
        .context(error::ListAddonsSnafu {
            cluster: cluster_name,
        })?
        .addons
        .unwrap_or_default())
}

pub async fn role_exists(iam_client: &aws_sdk_iam::Client, role: &str) -> Result<()> {
    iam_client
        .get_role()
        .role_name(role)
        .send()
        .await
        .context(error::GetRoleSnafu { role })?;
    Ok(())
}

/// Names of the managed policies attached to `role`.
pub async fn attached_policies(
    iam_client: &aws_sdk_iam::Client,
    role: &str,
) -> Result<Vec<String>> {
    Ok(iam_client
        .list_attached_role_policies()
        .role_name(role)
        .send()
        .await
        .context(error::ListAttachedPoliciesSnafu { role })?
        .attached_policies
        .unwrap_or_default()
        .into_iter()
        .filter_map(|policy| policy.policy_name)
        .collect())
}

async fn count_vpcs_named(ec2_client: &aws_sdk_ec2::Client, name: &str) -> Result<usize> {
    Ok(ec2_client
        .describe_vpcs()
        .filters(Filter::builder().name("tag:Name").values(name).build())
        .send()
        .await
        .context(error::DescribeVpcsSnafu { name })?
        .vpcs
        .map(|vpcs| vpcs.len())
        .unwrap_or_default())
}

/// Pages through the account's keys looking for one with `description`. Keys the caller is not
/// allowed to describe are skipped.
pub async fn find_key_by_description(
    kms_client: &aws_sdk_kms::Client,
    description: &str,
) -> Result<Option<String>> {
    let mut marker: Option<String> = None;
    loop {
        let page = kms_client
            .list_keys()
            .limit(50)
            .set_marker(marker.take())
            .send()
            .await
            .context(error::ListKeysSnafu)?;

        let key_ids = page.keys.unwrap_or_default().into_iter().filter_map(|key| key.key_id);
        for key_id in key_ids {
            let described = kms_client.describe_key().key_id(&key_id).send().await;
            if let Err(SdkError::ServiceError(service_error)) = &described {
                if service_error.raw().http().status().as_u16() == KMS_ACCESS_DENIED_STATUS {
                    info!("Skipping key '{}', it cannot be described", key_id);
                    continue;
                }
            }
            let metadata = described
                .context(error::DescribeKeySnafu { key: &key_id })?
                .key_metadata;
            let found = metadata
                .and_then(|metadata| metadata.description)
                .map(|found| found == description)
                .unwrap_or_default();
            if found {
                info!("Found key '{}' for '{}'", key_id, description);
                return Ok(Some(key_id));
            }
        }

        match page.next_marker {
            Some(next) => marker = Some(next),
            None => return Ok(None),
        }
    }
}

pub async fn account_id(sts_client: &aws_sdk_sts::Client) -> Result<String> {
    sts_client
        .get_caller_identity()
        .send()
        .await
        .context(error::CallerIdentitySnafu)?
        .account
        .context(error::MissingFieldSnafu { what: "account" })
}

/// Starts a control plane upgrade to `version` and waits for it to finish.
pub async fn upgrade_cluster(
    eks_client: &aws_sdk_eks::Client,
    cluster_name: &str,
    version: &str,
) -> Result<()> {
    info!("Upgrading '{}' to '{}'", cluster_name, version);
    let update_id = eks_client
        .update_cluster_version()
        .name(cluster_name)
        .version(version)
        .send()
        .await
        .context(error::UpdateClusterVersionSnafu {
            cluster: cluster_name,
            version,
        })?
        .update
        .and_then(|update| update.id)
        .context(error::MissingFieldSnafu { what: "update.id" })?;
    info!("Update '{}' of '{}' started", update_id, cluster_name);
    wait_for_update(eks_client, cluster_name, &update_id).await
}

/// Loop until the update is `Successful`. `Failed`, `Cancelled` and statuses this client does not
/// know end the wait with an error.
pub async fn wait_for_update(
    eks_client: &aws_sdk_eks::Client,
    cluster_name: &str,
    update_id: &str,
) -> Result<()> {
    loop {
        let status = eks_client
            .describe_update()
            .name(cluster_name)
            .update_id(update_id)
            .send()
            .await
            .context(error::DescribeUpdateSnafu {
                cluster: cluster_name,
                update: update_id,
            })?
            .update
            .and_then(|update| update.status)
            .context(error::MissingFieldSnafu {
                what: "update.status",
            })?;
        match status {
            UpdateStatus::Successful => {
                info!("Update '{}' of '{}' succeeded", update_id, cluster_name);
                return Ok(());
            }
            UpdateStatus::InProgress => {
                debug!(
                    "Update '{}' of '{}' is in progress. Sleeping {:?}",
                    update_id, cluster_name, UPDATE_POLL_INTERVAL
                );
                tokio::time::sleep(UPDATE_POLL_INTERVAL).await;
            }
            other => {
                return error::UpdateFailedSnafu {
                    cluster: cluster_name,
                    update: update_id,
                    status: other.as_str(),
                }
                .fail()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_eks::model::{Identity, Oidc, VpcConfigResponse};
    use serde_json::json;

    fn cluster() -> Cluster {
        Cluster::builder()
            .name("cluster-test-abc123")
            .identity(
                Identity::builder()
                    .oidc(
                        Oidc::builder()
                            .issuer("https://oidc.eks.eu-central-1.amazonaws.com/id/0123ABCD")
                            .build(),
                    )
                    .build(),
            )
            .resources_vpc_config(
                VpcConfigResponse::builder()
                    .vpc_id("vpc-0a1b")
                    .subnet_ids("subnet-1")
                    .subnet_ids("subnet-2")
                    .build(),
            )
            .build()
    }

    #[test]
    fn oidc_provider_id_has_no_scheme() {
        assert_eq!(
            oidc_provider_id(&cluster()).unwrap(),
            "oidc.eks.eu-central-1.amazonaws.com/id/0123ABCD"
        );
        assert!(oidc_provider_id(&Cluster::builder().build()).is_err());
    }

    #[test]
    fn network_of_the_cluster() {
        assert_eq!(
            cluster_network(&cluster()).unwrap(),
            ClusterNetwork {
                vpc_id: "vpc-0a1b".to_string(),
                subnet_ids: vec!["subnet-1".to_string(), "subnet-2".to_string()],
            }
        );
    }

    #[test]
    fn minor_version_increments() {
        assert_eq!(increment_minor_version("1.28").unwrap(), "1.29");
        assert_eq!(increment_minor_version("1.9").unwrap(), "1.10");
        assert!(increment_minor_version("1").is_err());
        assert!(increment_minor_version("1.x").is_err());
    }

    #[test]
    fn role_names_follow_the_cluster() {
        assert_eq!(
            cluster_role_names("c"),
            vec!["c-cert-manager-role", "c-external-dns-role", "c-ebs-cs-role", "c-eks-iam-role"]
        );
    }

    fn module_outputs() -> Outputs {
        let mut outputs: Outputs = REQUIRED_OUTPUTS
            .iter()
            .map(|name| (name.to_string(), json!(format!("{}-value", name))))
            .collect();
        outputs.insert("cluster_iam_role_name", "c-eks-iam-role");
        outputs.insert("private_vpc_cidr_blocks", json!(PRIVATE_CIDR_BLOCKS));
        outputs.insert(
            "public_vpc_cidr_blocks",
            "[10.192.96.0/19 10.192.128.0/19 10.192.160.0/19]",
        );
        outputs
    }

    #[test]
    fn outputs_of_a_healthy_cluster() {
        let mut checks = Checks::new();
        check_cluster_outputs(&module_outputs(), "c", &mut checks);
        assert!(checks.failures().is_empty(), "{:?}", checks.failures());
    }

    #[test]
    fn outputs_with_missing_and_wrong_values() {
        let mut outputs = module_outputs();
        outputs.insert("vpc_id", "");
        outputs.insert("cluster_iam_role_name", "other-eks-iam-role");
        outputs.insert("private_vpc_cidr_blocks", json!(["10.0.0.0/19"]));
        let mut checks = Checks::new();
        check_cluster_outputs(&outputs, "c", &mut checks);
        assert_eq!(checks.failures().len(), 3);
    }
}
