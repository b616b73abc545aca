use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::retry::RetryConfig;
use aws_smithy_types::retry::RetryMode;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use aws_types::SdkConfig;
use log::info;

/// Load the shared config for `region`, taking credentials from the named `profile` when one is
/// given and from the default provider chain otherwise.
pub async fn aws_config(profile: Option<&str>, region: &str) -> SdkConfig {
    info!(
        "Creating aws config for region '{}' and profile '{}'",
        region,
        profile.unwrap_or("<default>")
    );

    let mut config_loader = aws_config::from_env()
        .retry_config(
            RetryConfig::standard()
                .with_retry_mode(RetryMode::Adaptive)
                .with_max_attempts(15),
        )
        .region(Region::new(region.to_string()));

    if let Some(profile) = profile {
        config_loader = config_loader.credentials_provider(SharedCredentialsProvider::new(
            ProfileFileCredentialsProvider::builder()
                .profile_name(profile)
                .build(),
        ));
    }

    config_loader.load().await
}
