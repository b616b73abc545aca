use lifecycle::provider::{ProviderError, ProviderResult, Resources};
use lifecycle::{ApplySummary, Outputs, Provision, ProvisioningUnit};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records calls and plays back scripted apply results. Once the script runs out, every apply is
/// a no-op.
#[derive(Default)]
pub(crate) struct MockProvisioner {
    applies: Mutex<VecDeque<ProviderResult<ApplySummary>>>,
    destroy_fails: bool,
    pub(crate) init_calls: AtomicUsize,
    pub(crate) apply_calls: AtomicUsize,
    pub(crate) destroy_calls: AtomicUsize,
}

impl MockProvisioner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn then_apply(self, result: ProviderResult<ApplySummary>) -> Self {
        self.applies
            .lock()
            .unwrap()
            .push_back(result);
        self
    }

    pub(crate) fn then_create(self, added: u32) -> Self {
        self.then_apply(Ok(ApplySummary {
            added,
            ..ApplySummary::default()
        }))
    }

    pub(crate) fn failing_destroy(mut self) -> Self {
        self.destroy_fails = true;
        self
    }

    pub(crate) fn destroys(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn applies(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provision for MockProvisioner {
    async fn init(&self, _unit: &ProvisioningUnit) -> ProviderResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply(&self, _unit: &ProvisioningUnit) -> ProviderResult<ApplySummary> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.applies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApplySummary::default()))
    }

    async fn outputs(&self, unit: &ProvisioningUnit) -> ProviderResult<Outputs> {
        let mut outputs = Outputs::default();
        outputs.insert("cluster_name", unit.name.as_str());
        Ok(outputs)
    }

    async fn destroy(&self, _unit: &ProvisioningUnit) -> ProviderResult<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.destroy_fails {
            return Err(ProviderError::new_with_context(
                Resources::Remaining,
                "Error running 'terraform destroy', exit code 1",
            ));
        }
        Ok(())
    }
}
