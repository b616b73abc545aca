use harness_utils::constants::{DEFAULT_PROFILE, DEFAULT_REGION, STATE_BUCKET_PREFIX};
use lifecycle::CleanupPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Test settings provide a way to send arguments into the scenario tests using environment
/// variables. Every setting is optional.
///
/// # Example
///
/// ```text
/// TESTS_CLUSTER_ID=abc123 TESTS_TF_BINARY_NAME=tofu CLEAN_CLUSTER_AT_THE_END=false \
///     cargo test -p eks-scenarios --features integ
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct TestSettings {
    /// The suffix of the cluster name. A random one is generated per suite when unset.
    tests_cluster_id: Option<String>,

    #[serde(default = "default_region")]
    tests_cluster_region: String,

    /// `terraform` or `tofu`.
    #[serde(default = "default_binary")]
    tests_tf_binary_name: String,

    /// Defaults to `tests-eks-tf-state-<bucket region>`.
    tf_state_bucket: Option<String>,

    /// Defaults to the cluster region.
    tf_state_bucket_region: Option<String>,

    /// Anything but `true` keeps the infrastructure after the test.
    #[serde(default = "default_clean")]
    clean_cluster_at_the_end: String,

    aws_profile: Option<String>,
    aws_default_profile: Option<String>,

    /// The directory holding one sub-directory per Terraform module.
    #[serde(default = "default_modules_dir")]
    tests_modules_dir: PathBuf,

    /// The directory holding the `fixtures.default.*.tfvars` files.
    #[serde(default = "default_tfvars_dir")]
    tests_tfvars_dir: PathBuf,

    /// Per-cluster working directories are created here.
    #[serde(default = "default_state_dir")]
    tests_state_dir: PathBuf,
}

impl TestSettings {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<Self>()
    }

    /// Settings from explicit `(NAME, value)` pairs instead of the process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    pub fn cluster_id(&self) -> Option<&str> {
        self.tests_cluster_id.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.tests_cluster_region
    }

    pub fn tf_binary_name(&self) -> &str {
        &self.tests_tf_binary_name
    }

    pub fn bucket_region(&self) -> &str {
        self.tf_state_bucket_region
            .as_deref()
            .unwrap_or(&self.tests_cluster_region)
    }

    pub fn state_bucket(&self) -> String {
        self.tf_state_bucket
            .clone()
            .unwrap_or_else(|| format!("{}{}", STATE_BUCKET_PREFIX, self.bucket_region()))
    }

    /// `AWS_PROFILE`, then `AWS_DEFAULT_PROFILE`, then `infex`.
    pub fn aws_profile(&self) -> &str {
        self.aws_profile
            .as_deref()
            .or(self.aws_default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
    }

    pub fn clean_at_the_end(&self) -> bool {
        self.clean_cluster_at_the_end == "true"
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy::from_flag(self.clean_at_the_end())
    }

    pub fn modules_dir(&self) -> &Path {
        &self.tests_modules_dir
    }

    pub fn tfvars_dir(&self) -> &Path {
        &self.tests_tfvars_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.tests_state_dir
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_binary() -> String {
    lifecycle::provider::DEFAULT_BINARY.to_string()
}

fn default_clean() -> String {
    "true".to_string()
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("../modules")
}

fn default_tfvars_dir() -> PathBuf {
    PathBuf::from("../test/src/fixtures")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("../test/states")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(vars: &[(&str, &str)]) -> TestSettings {
        TestSettings::from_vars(
            vars.iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let settings = from(&[]);
        assert_eq!(settings.cluster_id(), None);
        assert_eq!(settings.region(), "eu-central-1");
        assert_eq!(settings.tf_binary_name(), "terraform");
        assert_eq!(settings.bucket_region(), "eu-central-1");
        assert_eq!(settings.state_bucket(), "tests-eks-tf-state-eu-central-1");
        assert_eq!(settings.aws_profile(), "infex");
        assert_eq!(settings.cleanup_policy(), CleanupPolicy::Destroy);
        assert_eq!(settings.modules_dir(), Path::new("../modules"));
    }

    #[test]
    fn bucket_follows_its_own_region() {
        let settings = from(&[
            ("TESTS_CLUSTER_REGION", "eu-west-1"),
            ("TF_STATE_BUCKET_REGION", "us-east-1"),
        ]);
        assert_eq!(settings.region(), "eu-west-1");
        assert_eq!(settings.state_bucket(), "tests-eks-tf-state-us-east-1");

        let settings = from(&[("TF_STATE_BUCKET", "my-states")]);
        assert_eq!(settings.state_bucket(), "my-states");
    }

    #[test]
    fn profile_fallback() {
        assert_eq!(from(&[("AWS_DEFAULT_PROFILE", "ci")]).aws_profile(), "ci");
        assert_eq!(
            from(&[("AWS_PROFILE", "dev"), ("AWS_DEFAULT_PROFILE", "ci")]).aws_profile(),
            "dev"
        );
    }

    #[test]
    fn only_true_cleans() {
        assert!(from(&[("CLEAN_CLUSTER_AT_THE_END", "true")]).clean_at_the_end());
        assert_eq!(
            from(&[("CLEAN_CLUSTER_AT_THE_END", "false")]).cleanup_policy(),
            CleanupPolicy::Keep
        );
        assert!(!from(&[("CLEAN_CLUSTER_AT_THE_END", "yes")]).clean_at_the_end());
    }
}
