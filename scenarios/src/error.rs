use aws_sdk_ec2::error::DescribeVpcsError;
use aws_sdk_eks::error::{
    DescribeClusterError, DescribeUpdateError, ListAddonsError, UpdateClusterVersionError,
};
use aws_sdk_eks::types::SdkError;
use aws_sdk_iam::error::{GetRoleError, ListAttachedRolePoliciesError};
use aws_sdk_kms::error::{DescribeKeyError, ListKeysError};
use aws_sdk_opensearch::error::DescribeDomainError;
use aws_sdk_rds::error::{DescribeDBClustersError, DescribeDBInstancesError};
use aws_sdk_sts::error::GetCallerIdentityError;
use snafu::Snafu;
use std::path::PathBuf;
use tokio::time::error::Elapsed;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to get the caller identity: {}", source))]
    CallerIdentity {
        source: SdkError<GetCallerIdentityError>,
    },

    #[snafu(display(
        "{} of {} checks failed:\n{}",
        failures.len(),
        failures.len() + passed,
        failures.join("\n")
    ))]
    ChecksFailed {
        passed: usize,
        failures: Vec<String>,
    },

    #[snafu(display("Unable to create {} '{}': {}", kind, name, source))]
    CreateObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to delete {} '{}': {}", kind, name, source))]
    DeleteObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to describe cluster '{}': {}", cluster, source))]
    DescribeCluster {
        cluster: String,
        source: SdkError<DescribeClusterError>,
    },

    #[snafu(display("Unable to describe DB cluster '{}': {}", cluster, source))]
    DescribeDbClusters {
        cluster: String,
        source: SdkError<DescribeDBClustersError>,
    },

    #[snafu(display("Unable to describe DB instance '{}': {}", instance, source))]
    DescribeDbInstances {
        instance: String,
        source: SdkError<DescribeDBInstancesError>,
    },

    #[snafu(display("Unable to describe OpenSearch domain '{}': {}", domain, source))]
    DescribeDomain {
        domain: String,
        source: SdkError<DescribeDomainError>,
    },

    #[snafu(display("Unable to describe KMS key '{}': {}", key, source))]
    DescribeKey {
        key: String,
        source: SdkError<DescribeKeyError>,
    },

    #[snafu(display("Unable to get status of update '{}' of '{}': {}", update, cluster, source))]
    DescribeUpdate {
        cluster: String,
        update: String,
        source: SdkError<DescribeUpdateError>,
    },

    #[snafu(display("Unable to describe VPCs named '{}': {}", name, source))]
    DescribeVpcs {
        name: String,
        source: SdkError<DescribeVpcsError>,
    },

    #[snafu(display("Unable to get {} '{}': {}", kind, name, source))]
    GetObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to get role '{}': {}", role, source))]
    GetRole {
        role: String,
        source: SdkError<GetRoleError>,
    },

    #[snafu(display("Invalid version '{}', expected '<major>.<minor>'", version))]
    InvalidVersion { version: String },

    #[snafu(display("Unable to list addons of '{}': {}", cluster, source))]
    ListAddons {
        cluster: String,
        source: SdkError<ListAddonsError>,
    },

    #[snafu(display("Unable to list policies attached to '{}': {}", role, source))]
    ListAttachedPolicies {
        role: String,
        source: SdkError<ListAttachedRolePoliciesError>,
    },

    #[snafu(display("Unable to list KMS keys: {}", source))]
    ListKeys { source: SdkError<ListKeysError> },

    #[snafu(display("Unable to list {}: {}", kind, source))]
    ListObjects { kind: String, source: kube::Error },

    #[snafu(display("Unable to parse manifest '{}': {}", path.display(), source))]
    Manifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("Response is missing '{}'", what))]
    MissingField { what: String },

    #[snafu(display("Unable to read manifest '{}': {}", path.display(), source))]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Timed out after {:?} waiting for {} '{}': {}", timeout, kind, name, source))]
    Timeout {
        kind: String,
        name: String,
        timeout: std::time::Duration,
        source: Elapsed,
    },

    #[snafu(display("Unable to upgrade '{}' to '{}': {}", cluster, version, source))]
    UpdateClusterVersion {
        cluster: String,
        version: String,
        source: SdkError<UpdateClusterVersionError>,
    },

    #[snafu(display("Update '{}' of '{}' ended as '{}'", update, cluster, status))]
    UpdateFailed {
        cluster: String,
        update: String,
        status: String,
    },

    #[snafu(display("Manifest '{}' contains an unsupported kind '{}'", path.display(), kind))]
    UnsupportedKind { path: PathBuf, kind: String },
}

pub type Result<T> = std::result::Result<T, Error>;
