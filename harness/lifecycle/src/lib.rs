/*!

The `lifecycle` library drives one provisioning unit (an EKS cluster, an Aurora database, an
OpenSearch domain...) through its whole life: make sure the remote state bucket exists, apply the
infrastructure, optionally prove that a second apply is a no-op, hand the outputs to the caller
and, whatever happens next, destroy the infrastructure and remove its state object.

You provide a [`Provision`] implementation (the [`TerraformCli`] in practice) and a
[`StateStore`] implementation, then hand these to a [`Coordinator`].

!*/

mod coordinator;
pub mod error;
mod idempotency;
mod outputs;
pub mod provider;
pub mod state;
mod terraform;

pub use coordinator::{CleanupPolicy, CleanupReport, Coordinator, Release};
pub use error::{Error, Result};
pub use idempotency::{apply_and_verify_idempotent, Idempotency, IdempotencyExemption};
pub use outputs::{parse_bracketed_list, Outputs};
pub use provider::{ApplySummary, Backend, Provision, ProvisioningUnit};
pub use state::{delete_state_object, ensure_bucket, BucketStatus, StateStore};
pub use terraform::TerraformCli;
