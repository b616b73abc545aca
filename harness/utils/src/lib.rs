/*!

`harness-utils` is a collection of functions shared by the scenario tests: logging setup, AWS
config loading, the S3 implementation of the state store, and kubeconfig handling for EKS
clusters.

!*/

use constants::DEFAULT_LEVEL_FILTER;
use env_logger::Builder;
pub use error::Error;
use log::LevelFilter;
pub use s3::S3StateStore;
use std::env;

pub mod aws;
pub mod constants;
mod error;
pub mod k8s;
mod s3;

/// Extract the value of `RUST_LOG` if it exists, otherwise log `test_crate` and the harness
/// crates at `DEFAULT_LEVEL_FILTER`. Safe to call from every test.
pub fn init_logger(test_crate: &str, log_level: Option<LevelFilter>) {
    let mut builder = match env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        // RUST_LOG exists; env_logger will use it.
        Some(_) => Builder::from_default_env(),
        None => {
            let log_level = log_level.unwrap_or(DEFAULT_LEVEL_FILTER);
            let mut builder = Builder::new();
            builder
                // Set log level to Error for crates other than our own.
                .filter_level(LevelFilter::Error)
                // Set all of our crates to the desired level.
                .filter(Some(test_crate), log_level)
                .filter(Some("eks_scenarios"), log_level)
                .filter(Some("harness_utils"), log_level)
                .filter(Some("lifecycle"), log_level)
                .filter(Some("readiness"), log_level)
                .filter(Some("selftest"), log_level);
            builder
        }
    };
    // a logger may already be installed by an earlier test in the same binary
    let _ = builder.is_test(true).try_init();
}
