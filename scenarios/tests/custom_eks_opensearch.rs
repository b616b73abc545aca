#![cfg(feature = "integ")]

use eks_scenarios::eks::{self, ClusterNetwork};
use eks_scenarios::opensearch::{self, OpenSearch};
use eks_scenarios::{k8s, AwsClients, Checks, EKS_MODULE, EKS_VAR_FILE, READY_TIMEOUT};
use harness_utils::init_logger;
use kube::Client;
use lifecycle::{Idempotency, IdempotencyExemption, Outputs};
use readiness::JobWatch;
use selftest::Suite;

const EXPECTED_NODES: usize = 1;

async fn verify(
    clients: &AwsClients,
    client: Client,
    search: &OpenSearch,
    network: &ClusterNetwork,
    outputs: &Outputs,
) -> Checks {
    let mut checks = Checks::new();
    let endpoint = outputs.string("opensearch_domain_endpoint").unwrap();
    checks.not_empty("output 'opensearch_domain_endpoint'", &endpoint);

    let domain = opensearch::describe_domain(&clients.opensearch_client, &search.domain_name())
        .await
        .unwrap();
    search.check_domain(&domain, network, &mut checks);

    let role = search.role_name();
    let found = eks::role_exists(&clients.iam_client, &role).await;
    checks.ok(&format!("role '{}' exists", role), found);
    let policies = eks::attached_policies(&clients.iam_client, &role).await;
    checks.ok(&format!("policies attached to '{}' are listed", role), policies);

    k8s::replace_config_map(
        client.clone(),
        opensearch::NAMESPACE,
        opensearch::CONFIG_MAP,
        search.config_map_data(&endpoint),
    )
    .await
    .unwrap();
    k8s::delete_jobs(client.clone(), opensearch::NAMESPACE, opensearch::CLIENT_SELECTOR)
        .await
        .unwrap();
    let manifest = eks_scenarios::fixture(eks_scenarios::OPENSEARCH_CLIENT);
    k8s::create_from_manifest(client.clone(), opensearch::NAMESPACE, &manifest)
        .await
        .unwrap();
    JobWatch::new(opensearch::NAMESPACE, opensearch::CLIENT_JOB, READY_TIMEOUT)
        .selector(opensearch::CLIENT_SELECTOR)
        .wait(client)
        .await
        .unwrap();
    checks
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_eks_opensearch() {
    init_logger("custom_eks_opensearch", None);
    let suite = Suite::from_env("CustomEKSOpenSearchTestSuite", "opensearch-eks").unwrap();
    let coordinator = suite.coordinator().await;
    let clients = AwsClients::new(&suite.aws_config().await);

    let eks_unit = suite
        .unit(EKS_MODULE, EKS_VAR_FILE)
        .unwrap()
        .var("name", suite.cluster_name())
        .var("region", suite.region())
        .var("np_desired_node_count", EXPECTED_NODES)
        .idempotency(Idempotency::Exempt(IdempotencyExemption::TagNormalization));
    let (eks_outputs, eks_release) = coordinator.provision(eks_unit).await.unwrap();

    let cluster = eks::describe_cluster(&clients.eks_client, suite.cluster_name())
        .await
        .unwrap();
    let client = suite.kube_client().await.unwrap();
    readiness::wait_until_cluster_is_ready(client.clone(), EXPECTED_NODES, READY_TIMEOUT)
        .await
        .unwrap();

    // the cluster module exposes what the IRSA role is built from
    let oidc_provider_id = eks::oidc_provider_id(&cluster).unwrap();
    let account_id = eks::account_id(&clients.sts_client).await.unwrap();
    assert_eq!(eks_outputs.string("oidc_provider_id").unwrap(), oidc_provider_id);
    assert_eq!(
        eks_outputs.string("aws_caller_identity_account_id").unwrap(),
        account_id
    );

    let network = eks::cluster_network(&cluster).unwrap();
    let mut cidr_blocks = eks_outputs.list("public_vpc_cidr_blocks").unwrap();
    cidr_blocks.extend(eks_outputs.list("private_vpc_cidr_blocks").unwrap());

    let search = OpenSearch::new(suite.cluster_name(), suite.region());
    k8s::ensure_namespace(client.clone(), opensearch::NAMESPACE)
        .await
        .unwrap();
    k8s::ensure_service_account(
        client.clone(),
        opensearch::NAMESPACE,
        opensearch::SERVICE_ACCOUNT,
        search.service_account_annotations(&account_id),
    )
    .await
    .unwrap();

    let search_unit = search.configure(
        suite.unit(opensearch::MODULE, opensearch::VAR_FILE).unwrap(),
        &network,
        &cidr_blocks,
        &account_id,
        &oidc_provider_id,
    );
    let (search_outputs, search_release) = coordinator.provision(search_unit).await.unwrap();

    let checks = verify(&clients, client, &search, &network, &search_outputs).await;

    let search_report = search_release.release().await;
    let eks_report = eks_release.release().await;
    search_report.into_result().unwrap();
    eks_report.into_result().unwrap();
    checks.into_result().unwrap();
}
