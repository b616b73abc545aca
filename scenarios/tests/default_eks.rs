#![cfg(feature = "integ")]

use eks_scenarios::{eks, AwsClients, Checks, EKS_MODULE, EKS_VAR_FILE, READY_TIMEOUT};
use harness_utils::init_logger;
use lifecycle::{Idempotency, IdempotencyExemption, Outputs};
use selftest::Suite;

const EXPECTED_NODES: usize = 4;

async fn verify(suite: &Suite, clients: &AwsClients, outputs: Outputs) -> Checks {
    let mut checks = Checks::new();
    eks::check_cluster_outputs(&outputs, suite.cluster_name(), &mut checks);

    let client = suite.kube_client().await.unwrap();
    readiness::wait_until_cluster_is_ready(client, EXPECTED_NODES, READY_TIMEOUT)
        .await
        .unwrap();

    eks::check_cluster_resources(clients, suite.cluster_name(), &mut checks)
        .await
        .unwrap();
    checks
}

#[tokio::test(flavor = "multi_thread")]
async fn default_eks() {
    init_logger("default_eks", None);
    let suite = Suite::from_env("DefaultEKSTestSuite", "default-eks").unwrap();
    let unit = suite
        .unit(EKS_MODULE, EKS_VAR_FILE)
        .unwrap()
        .var("name", suite.cluster_name())
        .var("region", suite.region())
        .var("np_desired_node_count", EXPECTED_NODES)
        .idempotency(Idempotency::Exempt(IdempotencyExemption::TagNormalization));
    let clients = AwsClients::new(&suite.aws_config().await);

    let (checks, report) = suite
        .coordinator()
        .await
        .scoped(unit, |outputs| verify(&suite, &clients, outputs))
        .await
        .unwrap();

    report.into_result().unwrap();
    checks.into_result().unwrap();
}
