use crate::error::{self, Result};
use crate::settings::TestSettings;
use aws_types::SdkConfig;
use harness_utils::aws::aws_config;
use harness_utils::constants::TF_BUCKET_DESCRIPTION;
use harness_utils::k8s::{k8s_client, write_kubeconfig};
use harness_utils::S3StateStore;
use kube::Client;
use lifecycle::{Backend, Coordinator, ProvisioningUnit, TerraformCli};
use log::{info, warn};
use snafu::ResultExt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// The directory of shared fixtures inside the modules directory.
const MODULE_FIXTURES: &str = "fixtures";
const BACKEND_FILE: &str = "backend.tf";

/// One scenario run against one cluster. Owns the cluster's working directory under the state
/// directory; the kubeconfig written for the cluster is deleted when the `Suite` is dropped.
#[derive(Debug)]
pub struct Suite {
    name: String,
    settings: TestSettings,
    cluster_name: String,
    data_dir: PathBuf,
    kubeconfig: PathBuf,
}

impl Suite {
    /// Creates `<state dir>/tf-data-<cluster name>`. `name` is used in state keys, e.g.
    /// `DefaultEKSTestSuite`, and `kubeconfig_tag` names the kubeconfig file, e.g. `default-eks`.
    pub fn new(name: &str, kubeconfig_tag: &str, settings: TestSettings) -> Result<Self> {
        let cluster_id = settings
            .cluster_id()
            .map(str::to_lowercase)
            .unwrap_or_else(random_id);
        let cluster_name = format!("cluster-test-{}", cluster_id);
        let data_dir = absolute(settings.state_dir())?.join(format!("tf-data-{}", cluster_name));
        fs::create_dir_all(&data_dir).context(error::CreateDirSnafu { path: &data_dir })?;
        let kubeconfig = data_dir.join(format!("kubeconfig-{}", kubeconfig_tag));
        info!(
            "Suite '{}' uses cluster '{}' with binary '{}'",
            name,
            cluster_name,
            settings.tf_binary_name()
        );
        Ok(Self {
            name: name.to_string(),
            settings,
            cluster_name,
            data_dir,
            kubeconfig,
        })
    }

    pub fn from_env(name: &str, kubeconfig_tag: &str) -> Result<Self> {
        Self::new(
            name,
            kubeconfig_tag,
            TestSettings::from_env().context(error::SettingsSnafu)?,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TestSettings {
        &self.settings
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn region(&self) -> &str {
        self.settings.region()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// `terraform/<cluster>/Test<suite>/<module>/terraform.tfstate` in the state bucket.
    pub fn backend(&self, module: &str) -> Backend {
        Backend {
            bucket: self.settings.state_bucket(),
            key: format!(
                "terraform/{}/Test{}/{}/terraform.tfstate",
                self.cluster_name, self.name, module
            ),
            region: self.settings.bucket_region().to_string(),
        }
    }

    /// A unit for `module`, staged into this suite's working directory and configured with the
    /// backend, binary and AWS environment of the suite. `var_file` is looked up in the tfvars
    /// directory.
    pub fn unit(&self, module: &str, var_file: &str) -> Result<ProvisioningUnit> {
        let module_dir = self.stage_module(module)?;
        let var_file = absolute(self.settings.tfvars_dir())?.join(var_file);
        Ok(ProvisioningUnit::new(module, module_dir)
            .binary(self.settings.tf_binary_name())
            .var_file(var_file)
            .backend(self.backend(module))
            .data_dir(self.data_dir.join(format!(".terraform-{}", module)))
            .env("AWS_PROFILE", self.settings.aws_profile())
            .env("AWS_REGION", self.region()))
    }

    /// Copies `<modules dir>/<module>` to `<data dir>/<module>` together with the shared backend
    /// definition, so that parallel suites never share a module directory.
    fn stage_module(&self, module: &str) -> Result<PathBuf> {
        let modules_dir = absolute(self.settings.modules_dir())?;
        let target = self.data_dir.join(module);
        let context = error::StageModuleSnafu {
            module,
            path: &target,
        };
        copy_module(&modules_dir.join(module), &target).context(context)?;
        fs::copy(
            modules_dir.join(MODULE_FIXTURES).join(BACKEND_FILE),
            target.join(BACKEND_FILE),
        )
        .context(context)?;
        Ok(target)
    }

    /// The shared AWS config for the cluster region.
    pub async fn aws_config(&self) -> SdkConfig {
        aws_config(Some(self.settings.aws_profile()), self.region()).await
    }

    /// A coordinator storing state in the suite's bucket, honoring `CLEAN_CLUSTER_AT_THE_END`.
    pub async fn coordinator(&self) -> Coordinator {
        let bucket_region = self.settings.bucket_region();
        let config = aws_config(Some(self.settings.aws_profile()), bucket_region).await;
        Coordinator::new(
            Arc::new(TerraformCli::new()),
            Arc::new(S3StateStore::for_region(&config, bucket_region)),
        )
        .bucket_description(TF_BUCKET_DESCRIPTION)
        .cleanup(self.settings.cleanup_policy())
    }

    /// Writes the kubeconfig of the suite's cluster and creates a client from it.
    pub async fn kube_client(&self) -> Result<Client> {
        let context = error::KubeClientSnafu {
            cluster: &self.cluster_name,
        };
        write_kubeconfig(
            &self.cluster_name,
            self.region(),
            Some(self.settings.aws_profile()),
            &self.kubeconfig,
        )
        .await
        .context(context)?;
        k8s_client(&self.kubeconfig).await.context(context)
    }
}

impl Drop for Suite {
    fn drop(&mut self) {
        match fs::remove_file(&self.kubeconfig) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Unable to remove kubeconfig '{}': {}",
                self.kubeconfig.display(),
                e
            ),
        }
    }
}

/// Six lowercase characters, like the ids used for cluster names.
fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context(error::WorkingDirSnafu)?
        .join(path))
}

/// Recursively copies a module, leaving out local provider caches.
fn copy_module(from: &Path, to: &Path) -> io::Result<()> {
    let entries = WalkDir::new(from)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".terraform");
    for entry in entries {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn suite(root: &TempDir) -> Suite {
        let modules = root.path().join("modules");
        fs::create_dir_all(modules.join("eks-cluster/.terraform/providers")).unwrap();
        fs::create_dir_all(modules.join("fixtures")).unwrap();
        fs::create_dir_all(modules.join("eks-cluster/templates")).unwrap();
        fs::write(modules.join("eks-cluster/main.tf"), "# eks").unwrap();
        fs::write(modules.join("eks-cluster/.terraform/providers/aws"), "").unwrap();
        fs::write(modules.join("eks-cluster/templates/user-data.sh"), "#!/bin/sh").unwrap();
        fs::write(modules.join("fixtures/backend.tf"), "terraform {}").unwrap();
        let settings = TestSettings::from_vars(vec![
            ("TESTS_CLUSTER_ID".to_string(), "AbC123".to_string()),
            (
                "TESTS_MODULES_DIR".to_string(),
                modules.display().to_string(),
            ),
            (
                "TESTS_STATE_DIR".to_string(),
                root.path().join("states").display().to_string(),
            ),
            ("TESTS_TFVARS_DIR".to_string(), "/fixtures".to_string()),
        ])
        .unwrap();
        Suite::new("DefaultEKSTestSuite", "default-eks", settings).unwrap()
    }

    #[test]
    fn cluster_name_and_directories() {
        let root = TempDir::new().unwrap();
        let suite = suite(&root);
        assert_eq!(suite.cluster_name(), "cluster-test-abc123");
        assert!(suite.data_dir().ends_with("states/tf-data-cluster-test-abc123"));
        assert!(suite.data_dir().is_dir());
        assert_eq!(
            suite.kubeconfig(),
            suite.data_dir().join("kubeconfig-default-eks")
        );
    }

    #[test]
    fn state_key_per_suite_and_module() {
        let root = TempDir::new().unwrap();
        let backend = suite(&root).backend("eks-cluster");
        assert_eq!(backend.bucket, "tests-eks-tf-state-eu-central-1");
        assert_eq!(
            backend.key,
            "terraform/cluster-test-abc123/TestDefaultEKSTestSuite/eks-cluster/terraform.tfstate"
        );
        assert_eq!(backend.region, "eu-central-1");
    }

    #[test]
    fn unit_is_staged_with_the_backend_file() {
        let root = TempDir::new().unwrap();
        let suite = suite(&root);
        let unit = suite
            .unit("eks-cluster", "fixtures.default.eks.tfvars")
            .unwrap();
        assert_eq!(unit.module_dir, suite.data_dir().join("eks-cluster"));
        assert!(unit.module_dir.join("main.tf").is_file());
        assert!(unit.module_dir.join("backend.tf").is_file());
        assert!(!unit.module_dir.join(".terraform").exists());
        assert_eq!(
            fs::read_to_string(unit.module_dir.join("templates/user-data.sh")).unwrap(),
            "#!/bin/sh"
        );
        assert_eq!(
            unit.var_files,
            vec![PathBuf::from("/fixtures/fixtures.default.eks.tfvars")]
        );
        assert_eq!(unit.env.get("AWS_PROFILE").unwrap(), "infex");
        assert_eq!(unit.backend, Some(suite.backend("eks-cluster")));
    }

    #[test]
    fn missing_module_fails() {
        let root = TempDir::new().unwrap();
        let suite = suite(&root);
        assert!(matches!(
            suite.unit("aurora", "fixtures.default.aurora.tfvars"),
            Err(crate::Error::StageModule { .. })
        ));
    }

    #[test]
    fn drop_removes_the_kubeconfig() {
        let root = TempDir::new().unwrap();
        let suite = suite(&root);
        let kubeconfig = suite.kubeconfig().to_path_buf();
        fs::write(&kubeconfig, "apiVersion: v1").unwrap();
        drop(suite);
        assert!(!kubeconfig.exists());
    }
}
