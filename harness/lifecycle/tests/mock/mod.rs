/*!

Mock implementations of [`Provision`] and [`StateStore`] that record every call, so the
coordinator can be tested without a provisioning binary or a cloud account.

!*/

pub(crate) mod provisioner;
pub(crate) mod state_store;

pub(crate) use provisioner::MockProvisioner;
pub(crate) use state_store::MockStateStore;

use lifecycle::{Backend, ProvisioningUnit};

pub(crate) const BUCKET: &str = "tests-eks-tf-state-eu-central-1";

pub(crate) fn unit(name: &str) -> ProvisioningUnit {
    ProvisioningUnit::new(name, format!("/modules/{}", name)).backend(Backend {
        bucket: BUCKET.to_string(),
        key: format!("terraform/cluster-test-abc/MockSuite/{}terraform.tfstate", name),
        region: "eu-central-1".to_string(),
    })
}
