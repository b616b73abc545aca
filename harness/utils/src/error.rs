use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to run '{}': {}", command, source))]
    CommandStart {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("'{}' failed with {}\nstderr:\n{}", command, status, stderr))]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[snafu(display("Unable to convert kubeconfig '{}': {}", path.display(), source))]
    KubeconfigConvert {
        path: PathBuf,
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to read kubeconfig '{}': {}", path.display(), source))]
    KubeconfigRead {
        path: PathBuf,
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create k8s client from '{}': {}", path.display(), source))]
    KubeClient { path: PathBuf, source: kube::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
