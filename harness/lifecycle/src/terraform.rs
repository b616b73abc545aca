use crate::outputs::Outputs;
use crate::provider::{
    ApplySummary, IntoProviderError, ProviderError, ProviderResult, Provision, ProvisioningUnit,
    Resources,
};
use log::{debug, info, trace};
use serde_json::Value;
use std::process::Output;
use tokio::process::Command;

/// Drives the `terraform` (or compatible `tofu`) binary named by each [`ProvisioningUnit`].
#[derive(Clone, Debug, Default)]
pub struct TerraformCli;

impl TerraformCli {
    pub fn new() -> Self {
        Self
    }

    fn command(unit: &ProvisioningUnit) -> Command {
        let mut command = Command::new(&unit.binary);
        command
            .current_dir(&unit.module_dir)
            .env("TF_IN_AUTOMATION", "1")
            .envs(&unit.env)
            .kill_on_drop(true);
        if let Some(data_dir) = &unit.data_dir {
            command.env("TF_DATA_DIR", data_dir);
        }
        command
    }

    async fn run(
        unit: &ProvisioningUnit,
        args: Vec<String>,
        resources_if_spawn_fails: Resources,
        resources_if_cmd_fails: Resources,
    ) -> ProviderResult<String> {
        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        let hint = format!("{} {}", unit.binary, subcommand);
        trace!(
            "Running '{} {}' in '{}'",
            unit.binary,
            args.join(" "),
            unit.module_dir.display()
        );
        let output = Self::command(unit)
            .args(&args)
            .output()
            .await
            .context(resources_if_spawn_fails, format!("Unable to run '{}'", hint))?;
        let stdout = provider_error_for_cmd_output(output, &hint, resources_if_cmd_fails)?;
        debug!("'{}' for '{}' finished:\n{}", hint, unit.name, stdout);
        Ok(stdout)
    }
}

#[async_trait::async_trait]
impl Provision for TerraformCli {
    async fn init(&self, unit: &ProvisioningUnit) -> ProviderResult<()> {
        info!("Initializing '{}'", unit.name);
        Self::run(unit, init_args(unit), Resources::Clear, Resources::Clear).await?;
        Ok(())
    }

    async fn apply(&self, unit: &ProvisioningUnit) -> ProviderResult<ApplySummary> {
        info!("Applying '{}'", unit.name);
        let stdout =
            Self::run(unit, apply_args(unit), Resources::Clear, Resources::Unknown).await?;
        parse_apply_summary(&stdout).context(
            Resources::Unknown,
            format!("Unable to find the change summary of '{}'", unit.name),
        )
    }

    async fn outputs(&self, unit: &ProvisioningUnit) -> ProviderResult<Outputs> {
        let args = vec![
            "output".to_string(),
            "-json".to_string(),
            "-no-color".to_string(),
        ];
        let stdout = Self::run(unit, args, Resources::Remaining, Resources::Remaining).await?;
        Outputs::from_output_json(&stdout).context(
            Resources::Remaining,
            format!("Unable to parse the outputs of '{}'", unit.name),
        )
    }

    async fn destroy(&self, unit: &ProvisioningUnit) -> ProviderResult<()> {
        info!("Destroying '{}'", unit.name);
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
        ];
        args.extend(variable_args(unit));
        Self::run(unit, args, Resources::Remaining, Resources::Remaining).await?;
        Ok(())
    }
}

fn provider_error_for_cmd_output(
    output: Output,
    hint: &str,
    resources: Resources,
) -> ProviderResult<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() {
        Ok(stdout.to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        Err(ProviderError::new_with_context(
            resources,
            format!(
                "Error running '{}', exit code {}\nstderr:\n{}\nstdout:\n{}",
                hint, code, stderr, stdout
            ),
        ))
    }
}

fn init_args(unit: &ProvisioningUnit) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        "-input=false".to_string(),
        "-no-color".to_string(),
        "-reconfigure".to_string(),
    ];
    if let Some(backend) = &unit.backend {
        args.push(format!("-backend-config=bucket={}", backend.bucket));
        args.push(format!("-backend-config=key={}", backend.key));
        args.push(format!("-backend-config=region={}", backend.region));
    }
    args
}

fn apply_args(unit: &ProvisioningUnit) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
        "-no-color".to_string(),
    ];
    args.extend(variable_args(unit));
    args
}

fn variable_args(unit: &ProvisioningUnit) -> Vec<String> {
    let mut args = Vec::new();
    for var_file in &unit.var_files {
        args.push(format!("-var-file={}", var_file.display()));
    }
    for (name, value) in &unit.vars {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        args.push("-var".to_string());
        args.push(format!("{}={}", name, value));
    }
    args
}

/// Finds `Resources: 1 added, 0 changed, 0 destroyed.` in the output of an apply.
fn parse_apply_summary(stdout: &str) -> Option<ApplySummary> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.contains("Resources:") && line.contains("destroyed"))?;
    let (_, counts) = line.split_once("Resources:")?;
    let mut summary = ApplySummary::default();
    for part in counts.split(',') {
        let mut words = part.split_whitespace();
        let count: u32 = words.next()?.parse().ok()?;
        match words.next()?.trim_end_matches('.') {
            "added" => summary.added = count,
            "changed" => summary.changed = count,
            "destroyed" => summary.destroyed = count,
            // `imported` and anything newer do not change the infrastructure
            _ => {}
        }
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Backend;

    #[test]
    fn summary_of_a_noop_apply() {
        let stdout = "No changes. Your infrastructure matches the configuration.\n\n\
            Apply complete! Resources: 0 added, 0 changed, 0 destroyed.\n\n\
            Outputs:\n\nvpc_id = \"vpc-1\"\n";
        let summary = parse_apply_summary(stdout).unwrap();
        assert!(summary.is_noop());
    }

    #[test]
    fn summary_with_imports() {
        let stdout = "Apply complete! Resources: 2 imported, 41 added, 1 changed, 0 destroyed.\n";
        assert_eq!(
            parse_apply_summary(stdout).unwrap(),
            ApplySummary {
                added: 41,
                changed: 1,
                destroyed: 0
            }
        );
    }

    #[test]
    fn summary_missing() {
        assert!(parse_apply_summary("Error: Invalid provider configuration").is_none());
    }

    #[test]
    fn arguments_carry_backend_and_variables() {
        let unit = ProvisioningUnit::new("eks-cluster", "/modules/eks-cluster")
            .var("name", "cluster-test-abc")
            .var("np_desired_node_count", 4)
            .var("cluster_tags", serde_json::json!({"team": "infra"}))
            .var_file("test.tfvars")
            .backend(Backend {
                bucket: "tests-eks-tf-state-eu-central-1".to_string(),
                key: "terraform/cluster-test-abc/default/eks-cluster/terraform.tfstate".to_string(),
                region: "eu-central-1".to_string(),
            });

        let init = init_args(&unit);
        let bucket = "-backend-config=bucket=tests-eks-tf-state-eu-central-1".to_string();
        assert!(init.contains(&bucket));
        assert!(init.contains(&"-backend-config=region=eu-central-1".to_string()));

        let apply = apply_args(&unit);
        assert_eq!(&apply[..2], &["apply", "-auto-approve"]);
        assert!(apply.contains(&"-var-file=test.tfvars".to_string()));
        assert!(apply.contains(&"name=cluster-test-abc".to_string()));
        assert!(apply.contains(&"np_desired_node_count=4".to_string()));
        assert!(apply.contains(&r#"cluster_tags={"team":"infra"}"#.to_string()));
    }
}
