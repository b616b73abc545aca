use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to create '{}': {}", path.display(), source))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to get the kubernetes client of '{}': {}", cluster, source))]
    KubeClient {
        cluster: String,
        source: harness_utils::Error,
    },

    #[snafu(display("Unable to read the test settings from the environment: {}", source))]
    Settings { source: envy::Error },

    #[snafu(display("Unable to copy module '{}' to '{}': {}", module, path.display(), source))]
    StageModule {
        module: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to determine the working directory: {}", source))]
    WorkingDir { source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
