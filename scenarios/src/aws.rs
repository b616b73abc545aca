use aws_types::SdkConfig;

/// The service clients the scenarios describe resources with. All of them talk to the cluster
/// region.
#[derive(Clone, Debug)]
pub struct AwsClients {
    pub eks_client: aws_sdk_eks::Client,
    pub ec2_client: aws_sdk_ec2::Client,
    pub iam_client: aws_sdk_iam::Client,
    pub kms_client: aws_sdk_kms::Client,
    pub rds_client: aws_sdk_rds::Client,
    pub opensearch_client: aws_sdk_opensearch::Client,
    pub sts_client: aws_sdk_sts::Client,
}

impl AwsClients {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            eks_client: aws_sdk_eks::Client::new(config),
            ec2_client: aws_sdk_ec2::Client::new(config),
            iam_client: aws_sdk_iam::Client::new(config),
            kms_client: aws_sdk_kms::Client::new(config),
            rds_client: aws_sdk_rds::Client::new(config),
            opensearch_client: aws_sdk_opensearch::Client::new(config),
            sts_client: aws_sdk_sts::Client::new(config),
        }
    }
}
