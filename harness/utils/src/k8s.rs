use crate::error::{self, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use log::info;
use snafu::{ensure, ResultExt};
use std::path::Path;
use tokio::process::Command;

/// Write a kubeconfig for an EKS cluster to `path` with `aws eks update-kubeconfig`.
pub async fn write_kubeconfig(
    cluster_name: &str,
    region: &str,
    profile: Option<&str>,
    path: &Path,
) -> Result<()> {
    info!("Writing kubeconfig for '{}' to '{}'", cluster_name, path.display());
    let mut command = Command::new("aws");
    command
        .args(["eks", "update-kubeconfig", "--region", region, "--name", cluster_name])
        .arg("--kubeconfig")
        .arg(path);
    if let Some(profile) = profile {
        command.args(["--profile", profile]);
    }
    let output = command.output().await.context(error::CommandStartSnafu {
        command: "aws eks update-kubeconfig",
    })?;
    ensure!(
        output.status.success(),
        error::CommandFailedSnafu {
            command: "aws eks update-kubeconfig",
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr),
        }
    );
    Ok(())
}

/// Create a k8s client from the kubeconfig at `path`.
pub async fn k8s_client(path: &Path) -> Result<Client> {
    let kubeconfig =
        Kubeconfig::read_from(path).context(error::KubeconfigReadSnafu { path })?;
    let client: Client = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context(error::KubeconfigConvertSnafu { path })?
        .try_into()
        .context(error::KubeClientSnafu { path })?;
    Ok(client)
}
