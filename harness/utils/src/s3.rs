use crate::constants::S3_DEFAULT_LOCATION;
use aws_sdk_s3::error::HeadBucketErrorKind;
use aws_sdk_s3::model::{BucketLocationConstraint, CreateBucketConfiguration, Tag, Tagging};
use aws_sdk_s3::types::SdkError;
use aws_types::region::Region;
use aws_types::SdkConfig;
use lifecycle::state::StateError;
use lifecycle::StateStore;
use log::{debug, info};

/// Terraform state kept in S3.
#[derive(Clone, Debug)]
pub struct S3StateStore {
    client: aws_sdk_s3::Client,
}

impl S3StateStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// A store whose client talks to `region`, which is where the state bucket lives.
    pub fn for_region(config: &SdkConfig, region: &str) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(config)
            .region(Region::new(region.to_string()))
            .build();
        Self::new(aws_sdk_s3::Client::from_conf(s3_config))
    }
}

#[async_trait::async_trait]
impl StateStore for S3StateStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StateError> {
        let result = self.client.head_bucket().bucket(bucket).send().await;
        if let Err(SdkError::ServiceError(service_error)) = &result {
            // HEAD responses have no body, so a bare 404 is also a not-found
            if matches!(&service_error.err().kind, HeadBucketErrorKind::NotFound(_))
                || service_error.raw().http().status().as_u16() == 404
            {
                debug!("Bucket '{}' does not exist", bucket);
                return Ok(false);
            }
        }
        result.map(|_| true).map_err(|e| StateError::Probe {
            bucket: bucket.to_string(),
            source: Box::new(e),
        })
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        region: &str,
        description: &str,
    ) -> Result<(), StateError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if region != S3_DEFAULT_LOCATION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request.send().await.map_err(|e| StateError::Create {
            bucket: bucket.to_string(),
            source: Box::new(e),
        })?;
        info!("Created bucket '{}' in '{}'", bucket, region);

        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(
                Tagging::builder()
                    .tag_set(Tag::builder().key("Description").value(description).build())
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StateError::Tag {
                bucket: bucket.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StateError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StateError::DeleteObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }
}
