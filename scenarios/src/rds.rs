//! The Aurora PostgreSQL cluster placed in the network of an EKS cluster, reached from the
//! cluster through a service account bound to an IAM role that may connect as a database user.

use crate::checks::Checks;
use crate::eks::ClusterNetwork;
use crate::error::{self, Result};
use crate::iam;
use aws_sdk_rds::model::{DbCluster, DbInstance};
use lifecycle::ProvisioningUnit;
use maplit::btreemap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

pub const MODULE: &str = "aurora";
pub const VAR_FILE: &str = "fixtures.default.aurora.tfvars";
pub const NAMESPACE: &str = "aurora";
pub const SERVICE_ACCOUNT: &str = "aurora-access-sa";
pub const USERNAME: &str = "adminuser";
pub const IRSA_USERNAME: &str = "myirsauser";
pub const DATABASE: &str = "camunda";
pub const PORT: i32 = 5432;
pub const CONFIG_MAP: &str = "aurora-config";
pub const SECRET: &str = "aurora-secret";
pub const CLIENT_JOB: &str = "postgres-client";
pub const CLIENT_SELECTOR: &str = "app=postgres-client";

pub const INSTANCE_CLASS: &str = "db.t3.medium";
pub const ENGINE: &str = "aurora-postgresql";
pub const CA_CERTIFICATE: &str = "rds-ca-rsa2048-g1";

const PASSWORD_LENGTH: usize = 18;
const PASSWORD_DIGITS: usize = 4;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// The database created for one cluster.
#[derive(Clone)]
pub struct Aurora {
    cluster_name: String,
    region: String,
    password: String,
}

impl Debug for Aurora {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aurora")
            .field("cluster_name", &self.cluster_name)
            .field("region", &self.region)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Aurora {
    /// A database for the EKS cluster `cluster_name` with a freshly generated master password.
    pub fn new(cluster_name: &str, region: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            region: region.to_string(),
            password: generate_password(),
        }
    }

    /// `postgres-<cluster>`, the identifier of the DB cluster.
    pub fn cluster_id(&self) -> String {
        format!("postgres-{}", self.cluster_name)
    }

    pub fn role_name(&self) -> String {
        format!("AuroraRole-{}", self.cluster_name)
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn availability_zones(&self) -> Vec<String> {
        ["a", "b", "c"]
            .iter()
            .map(|zone| format!("{}{}", self.region, zone))
            .collect()
    }

    /// The database user the service account connects as, through IAM authentication.
    pub fn db_user_arn(&self, account_id: &str) -> String {
        format!(
            "arn:aws:rds-db:{}:{}:dbuser:{}/{}",
            self.region,
            account_id,
            self.cluster_id(),
            IRSA_USERNAME
        )
    }

    /// The annotations binding the service account to the database role.
    pub fn service_account_annotations(&self, account_id: &str) -> BTreeMap<String, String> {
        btreemap! {
            iam::ROLE_ARN_ANNOTATION.to_string() => iam::role_arn(account_id, &self.role_name()),
        }
    }

    /// Adds the variables of the database module to `unit`.
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
        let access_policy =
            iam::access_policy(&["rds-db:connect"], &self.db_user_arn(account_id));
        unit.var("username", USERNAME)
            .var("password", self.password.as_str())
            .var("default_database_name", DATABASE)
            .var("cluster_name", self.cluster_id())
            .var("subnet_ids", json!(network.subnet_ids))
            .var("vpc_id", network.vpc_id.as_str())
            .var("availability_zones", json!(self.availability_zones()))
            .var("cidr_blocks", json!(cidr_blocks))
            .var(
                "iam_roles_with_policies",
                iam::role_with_policies(&self.role_name(), &trust_policy, &access_policy),
            )
    }

    /// The connection settings read by the client job.
    pub fn config_map_data(&self, endpoint: &str) -> BTreeMap<String, String> {
        btreemap! {
            "aurora_endpoint".to_string() => endpoint.to_string(),
            "aurora_username".to_string() => USERNAME.to_string(),
            "aurora_password".to_string() => self.password.clone(),
            "aurora_username_irsa".to_string() => IRSA_USERNAME.to_string(),
            "aurora_port".to_string() => PORT.to_string(),
            "aws_region".to_string() => self.region.clone(),
            "aurora_db_name".to_string() => DATABASE.to_string(),
        }
    }

    pub fn secret_data(&self) -> BTreeMap<String, String> {
        btreemap! { "aurora_password".to_string() => self.password.clone() }
    }

    pub fn check_db_cluster(&self, cluster: &DbCluster, checks: &mut Checks) {
        checks.equal(
            "IAM database authentication",
            Some(true),
            cluster.iam_database_authentication_enabled,
        );
        checks.equal(
            "master username",
            Some(USERNAME),
            cluster.master_username.as_deref(),
        );
        checks.equal("database name", Some(DATABASE), cluster.database_name.as_deref());
        checks.equal("port", Some(PORT), cluster.port);
        checks.same_elements(
            "availability zones",
            &self.availability_zones(),
            cluster.availability_zones.as_deref().unwrap_or_default(),
        );
        checks.equal(
            "DB cluster identifier",
            Some(self.cluster_id()),
            cluster.db_cluster_identifier.clone(),
        );
    }

    /// Checks an instance of the cluster against the module's defaults and the EKS network.
    pub fn check_instance(
        &self,
        instance: &DbInstance,
        network: &ClusterNetwork,
        checks: &mut Checks,
    ) {
        checks.equal(
            "instance class",
            Some(INSTANCE_CLASS),
            instance.db_instance_class.as_deref(),
        );
        checks.equal(
            "auto minor version upgrade",
            true,
            instance.auto_minor_version_upgrade,
        );
        checks.equal("engine", Some(ENGINE), instance.engine.as_deref());
        checks.equal(
            "CA certificate",
            Some(CA_CERTIFICATE),
            instance.ca_certificate_identifier.as_deref(),
        );
        let subnet_group = instance.db_subnet_group.as_ref();
        checks.equal(
            "VPC of the subnet group",
            Some(network.vpc_id.as_str()),
            subnet_group.and_then(|group| group.vpc_id.as_deref()),
        );
        checks.contains(
            "availability zone",
            instance.availability_zone.as_deref().unwrap_or_default(),
            &self.region,
        );
        let subnet_ids: Vec<String> = subnet_group
            .and_then(|group| group.subnets.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|subnet| subnet.subnet_identifier.clone())
            .collect();
        checks.same_elements("subnets of the subnet group", &network.subnet_ids, &subnet_ids);
    }
}

/// 14 letters and 4 digits in random positions.
fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    let mut password: Vec<char> = (0..PASSWORD_LENGTH)
        .map(|i| {
            let alphabet = if i < PASSWORD_DIGITS { DIGITS } else { LETTERS };
            alphabet[rng.gen_range(0..alphabet.len())] as char
        })
        .collect();
    password.shuffle(&mut rng);
    password.into_iter().collect()
}

pub async fn describe_db_cluster(
    rds_client: &aws_sdk_rds::Client,
    cluster_id: &str,
) -> Result<DbCluster> {
    rds_client
        .describe_db_clusters()
        .db_cluster_identifier(cluster_id)
        .send()
        .await
        .context(error::DescribeDbClustersSnafu {
            cluster: cluster_id,
        })?
        .db_clusters
        .and_then(|clusters| clusters.into_iter().next())
        .context(error::MissingFieldSnafu {
            what: "db_clusters[0]",
        })
}

pub async fn describe_db_instance(
    rds_client: &aws_sdk_rds::Client,
    instance_id: &str,
) -> Result<DbInstance> {
    rds_client
        .describe_db_instances()
        .db_instance_identifier(instance_id)
        .send()
        .await
        .context(error::DescribeDbInstancesSnafu {
            instance: instance_id,
        })?
        .db_instances
        .and_then(|instances| instances.into_iter().next())
        .context(error::MissingFieldSnafu {
            what: "db_instances[0]",
        })
}

/// The identifier of the first instance of the cluster.
pub fn first_member(cluster: &DbCluster) -> Result<String> {
    cluster
        .db_cluster_members
        .as_ref()
        .and_then(|members| members.first())
        .and_then(|member| member.db_instance_identifier.clone())
        .context(error::MissingFieldSnafu {
            what: "db_cluster_members[0].db_instance_identifier",
        })
}
