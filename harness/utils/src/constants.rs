use log::LevelFilter;

pub const DEFAULT_REGION: &str = "eu-central-1";
pub const DEFAULT_PROFILE: &str = "infex";
pub const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// State buckets are named `tests-eks-tf-state-<region>` unless one is configured.
pub const STATE_BUCKET_PREFIX: &str = "tests-eks-tf-state-";

/// The `Description` tag of state buckets created by the harness.
pub const TF_BUCKET_DESCRIPTION: &str = "This bucket is used to store tests of the \
camunda/camunda-tf-eks-module repository. Anything contained in this bucket can be deleted \
without notice.";

/// S3 rejects `us-east-1` as an explicit location constraint.
pub(crate) const S3_DEFAULT_LOCATION: &str = "us-east-1";
