//! Remote state bucket hygiene: the bucket is created once and shared between runs, each unit
//! removes its own state object when it is torn down.

use crate::provider::Backend;
use log::{debug, info};
use snafu::Snafu;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StateError {
    #[snafu(display("Unable to create bucket '{}': {}", bucket, source))]
    Create { bucket: String, source: BoxedError },

    #[snafu(display("Unable to delete '{}' from bucket '{}': {}", key, bucket, source))]
    DeleteObject {
        bucket: String,
        key: String,
        source: BoxedError,
    },

    #[snafu(display("Unable to determine whether bucket '{}' exists: {}", bucket, source))]
    Probe { bucket: String, source: BoxedError },

    #[snafu(display("Unable to tag bucket '{}': {}", bucket, source))]
    Tag { bucket: String, source: BoxedError },
}

/// The object store holding provisioning state.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(false)` only when the store positively reports that the bucket does not exist. Any
    /// other failure (permissions, throttling, network) is an error.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StateError>;

    /// Create `bucket` in `region` and attach `description` to it.
    async fn create_bucket(
        &self,
        bucket: &str,
        region: &str,
        description: &str,
    ) -> Result<(), StateError>;

    /// Delete one object. Deleting an object that does not exist succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StateError>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BucketStatus {
    Created,
    Existing,
}

/// Make sure `bucket` exists, creating it in `region` if the store says it is missing.
pub async fn ensure_bucket<S>(
    store: &S,
    bucket: &str,
    description: &str,
    region: &str,
) -> Result<BucketStatus, StateError>
where
    S: StateStore + ?Sized,
{
    if store.bucket_exists(bucket).await? {
        debug!("State bucket '{}' already exists", bucket);
        return Ok(BucketStatus::Existing);
    }
    info!("Creating state bucket '{}' in '{}'", bucket, region);
    store.create_bucket(bucket, region, description).await?;
    Ok(BucketStatus::Created)
}

/// Remove the state object of one unit. The bucket itself is left alone.
pub async fn delete_state_object<S>(store: &S, backend: &Backend) -> Result<(), StateError>
where
    S: StateStore + ?Sized,
{
    info!(
        "Deleting state object '{}' from bucket '{}'",
        backend.key, backend.bucket
    );
    store.delete_object(&backend.bucket, &backend.key).await
}
