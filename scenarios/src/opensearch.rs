//! The OpenSearch domain placed in the network of an EKS cluster and queried from a job running
//! under an IRSA service account.

use crate::checks::Checks;
use crate::eks::ClusterNetwork;
use crate::error::{self, Result};
use crate::iam;
use aws_sdk_opensearch::model::DomainStatus;
use lifecycle::ProvisioningUnit;
use maplit::btreemap;
use serde_json::json;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

pub const MODULE: &str = "opensearch";
pub const VAR_FILE: &str = "fixtures.default.opensearch.tfvars";
pub const NAMESPACE: &str = "opensearch";
pub const SERVICE_ACCOUNT: &str = "opensearch-access-sa";
pub const CONFIG_MAP: &str = "opensearch-config";
pub const CLIENT_JOB: &str = "opensearch-client";
pub const CLIENT_SELECTOR: &str = "app=opensearch-client";

pub const INSTANCE_COUNT: i32 = 3;
pub const INSTANCE_TYPE: &str = "t3.small.search";

const HTTP_ACTIONS: &[&str] = &["es:ESHttpGet", "es:ESHttpPut", "es:ESHttpPost"];

#[derive(Clone, Debug)]
pub struct OpenSearch {
    cluster_name: String,
    region: String,
}

impl OpenSearch {
    pub fn new(cluster_name: &str, region: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            region: region.to_string(),
        }
    }

    /// `os-<cluster>`
    pub fn domain_name(&self) -> String {
        format!("os-{}", self.cluster_name)
    }

    pub fn role_name(&self) -> String {
        format!("OpenSearchRole-{}", self.cluster_name)
    }

    /// Every index of the domain.
    pub fn domain_resource(&self, account_id: &str) -> String {
        format!(
            "arn:aws:es:{}:{}:domain/{}/*",
            self.region,
            account_id,
            self.domain_name()
        )
    }

    pub fn service_account_annotations(&self, account_id: &str) -> BTreeMap<String, String> {
        btreemap! {
            iam::ROLE_ARN_ANNOTATION.to_string() => iam::role_arn(account_id, &self.role_name()),
        }
    }

    /// Adds the variables of the search module to `unit`.
    pub fn configure(
        &self,
        unit: ProvisioningUnit,
        network: &ClusterNetwork,
        cidr_blocks: &[String],
        account_id: &str,
        oidc_provider_id: &str,
    ) -> ProvisioningUnit {
        let trust_policy =
            iam::irsa_trust_policy(account_id, oidc_provider_id, NAMESPACE, SERVICE_ACCOUNT);
        let access_policy = iam::access_policy(HTTP_ACTIONS, &self.domain_resource(account_id));
        unit.var("domain_name", self.domain_name())
            .var("subnet_ids", json!(network.subnet_ids))
            .var("cidr_blocks", json!(cidr_blocks))
            .var("vpc_id", network.vpc_id.as_str())
            .var(
                "iam_roles_with_policies",
                iam::role_with_policies(&self.role_name(), &trust_policy, &access_policy),
            )
    }

    pub fn config_map_data(&self, endpoint: &str) -> BTreeMap<String, String> {
        btreemap! {
            "opensearch_endpoint".to_string() => endpoint.to_string(),
            "aws_region".to_string() => self.region.clone(),
        }
    }

    /// The domain runs three small search instances inside the cluster's VPC.
    pub fn check_domain(
        &self,
        domain: &DomainStatus,
        network: &ClusterNetwork,
        checks: &mut Checks,
    ) {
        checks.equal(
            "domain name",
            Some(self.domain_name()),
            domain.domain_name.clone(),
        );
        let cluster_config = domain.cluster_config.as_ref();
        checks.equal(
            "instance count",
            Some(INSTANCE_COUNT),
            cluster_config.and_then(|config| config.instance_count),
        );
        checks.equal(
            "instance type",
            Some(INSTANCE_TYPE),
            cluster_config
                .and_then(|config| config.instance_type.as_ref())
                .map(|instance_type| instance_type.as_str()),
        );
        let vpc_options = domain.vpc_options.as_ref();
        checks.equal(
            "VPC of the domain",
            Some(network.vpc_id.as_str()),
            vpc_options.and_then(|options| options.vpc_id.as_deref()),
        );
        let security_groups = vpc_options
            .and_then(|options| options.security_group_ids.as_ref())
            .map(Vec::len)
            .unwrap_or_default();
        checks.check(
            security_groups > 0,
            format!("domain '{}' has security groups", self.domain_name()),
        );
    }
}

pub async fn describe_domain(
    opensearch_client: &aws_sdk_opensearch::Client,
    domain_name: &str,
) -> Result<DomainStatus> {
    opensearch_client
        .describe_domain()
        .domain_name(domain_name)
        .send()
        .await
        .context(error::DescribeDomainSnafu {
            domain: domain_name,
        })?
        .domain_status
        .context(error::MissingFieldSnafu {
            what: "domain_status",
        })
}
