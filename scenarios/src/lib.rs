/*!

Verification helpers for the EKS integration scenarios: describe the cloud resources a module
created, compare them with what the module promises and drive the workloads that prove a cluster
can reach its database or search domain.

Mismatches are collected in [`Checks`] so that a run reports all of them at once. The scenarios
themselves live in `tests/` and are compiled with the `integ` feature.

!*/

pub mod aws;
mod checks;
pub mod eks;
pub mod error;
pub mod iam;
pub mod k8s;
pub mod opensearch;
pub mod rds;

pub use aws::AwsClients;
pub use checks::Checks;
pub use error::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;

/// The cluster module and its variable file.
pub const EKS_MODULE: &str = "eks-cluster";
pub const EKS_VAR_FILE: &str = "fixtures.default.eks.tfvars";

/// How long nodes, jobs and deployments are given to become ready.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const POSTGRES_CLIENT: &str = "postgres-client.yml";
pub const OPENSEARCH_CLIENT: &str = "opensearch-client.yml";
pub const WHOAMI_DEPLOYMENT: &str = "whoami-deployment.yml";

/// A manifest shipped in this crate's `fixtures` directory.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}
