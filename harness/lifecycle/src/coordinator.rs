use crate::error::{self, Error, Result};
use crate::idempotency::apply_unit;
use crate::outputs::Outputs;
use crate::provider::{ProviderResult, Provision, ProvisioningUnit};
use crate::state::{delete_state_object, ensure_bucket, StateError, StateStore};
use futures::FutureExt;
use log::{error, info, warn};
use snafu::ResultExt;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Whether provisioned infrastructure is torn down at the end of a test.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CleanupPolicy {
    #[default]
    Destroy,
    /// Leave everything in place, e.g. to debug a failing scenario.
    Keep,
}

impl CleanupPolicy {
    pub fn from_flag(clean: bool) -> Self {
        if clean {
            CleanupPolicy::Destroy
        } else {
            CleanupPolicy::Keep
        }
    }
}

/// Runs provisioning units through ensure-bucket, init, apply, the idempotency check and outputs,
/// and hands back a [`Release`] that owns their teardown.
#[derive(Clone)]
pub struct Coordinator {
    provisioner: Arc<dyn Provision>,
    store: Arc<dyn StateStore>,
    bucket_description: String,
    cleanup: CleanupPolicy,
}

impl Coordinator {
    pub fn new(provisioner: Arc<dyn Provision>, store: Arc<dyn StateStore>) -> Self {
        Self {
            provisioner,
            store,
            bucket_description: String::new(),
            cleanup: CleanupPolicy::default(),
        }
    }

    /// The `Description` tag given to state buckets this coordinator creates.
    pub fn bucket_description<S: Into<String>>(mut self, description: S) -> Self {
        self.bucket_description = description.into();
        self
    }

    pub fn cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Provision `unit` and return its outputs. The returned [`Release`] must be kept alive for as
    /// long as the infrastructure is needed; it tears the unit down when released or dropped.
    pub async fn provision(&self, unit: ProvisioningUnit) -> Result<(Outputs, Release)> {
        if let Some(backend) = &unit.backend {
            info!("Ensuring state bucket '{}'", backend.bucket);
            ensure_bucket(
                self.store.as_ref(),
                &backend.bucket,
                &self.bucket_description,
                &backend.region,
            )
            .await
            .context(error::StateBucketSnafu {
                bucket: &backend.bucket,
            })?;
        }

        self.provisioner
            .init(&unit)
            .await
            .context(error::InitSnafu { unit: &unit.name })?;

        let mut release = match self.cleanup {
            CleanupPolicy::Destroy => Release::armed(Teardown {
                provisioner: Arc::clone(&self.provisioner),
                store: Arc::clone(&self.store),
                unit: unit.clone(),
            }),
            CleanupPolicy::Keep => {
                warn!("Cleanup is disabled, '{}' will be left in place", unit.name);
                Release::disarmed(&unit.name)
            }
        };

        if let Err(e) = apply_unit(self.provisioner.as_ref(), &unit).await {
            match &e {
                Error::Apply { source, .. } if !source.resources().needs_destroy() => {
                    warn!("Not destroying '{}': {}", unit.name, source.resources());
                    release.disarm();
                }
                _ => {
                    let report = release.release().await;
                    if !report.is_clean() {
                        error!("{}", report);
                    }
                }
            }
            return Err(e);
        }

        let outputs = match self.provisioner.outputs(&unit).await {
            Ok(outputs) => outputs,
            Err(source) => {
                let report = release.release().await;
                if !report.is_clean() {
                    error!("{}", report);
                }
                return Err(Error::Outputs {
                    unit: unit.name.clone(),
                    source,
                });
            }
        };
        info!("Provisioned '{}'", unit.name);
        Ok((outputs, release))
    }

    /// Provision `unit`, run `verify` against its outputs and release the unit whether `verify`
    /// returns or panics. A panic is resumed after teardown.
    pub async fn scoped<F, Fut, T>(
        &self,
        unit: ProvisioningUnit,
        verify: F,
    ) -> Result<(T, CleanupReport)>
    where
        F: FnOnce(Outputs) -> Fut,
        Fut: Future<Output = T>,
    {
        let (outputs, release) = self.provision(unit).await?;
        let verified = AssertUnwindSafe(verify(outputs)).catch_unwind().await;
        let report = release.release().await;
        match verified {
            Ok(value) => Ok((value, report)),
            Err(panic) => {
                if !report.is_clean() {
                    error!("{}", report);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

struct Teardown {
    provisioner: Arc<dyn Provision>,
    store: Arc<dyn StateStore>,
    unit: ProvisioningUnit,
}

impl Teardown {
    async fn run(self) -> CleanupReport {
        info!("Destroying '{}'", self.unit.name);
        let destroy = self.provisioner.destroy(&self.unit).await;
        if let Err(e) = &destroy {
            error!("Unable to destroy '{}': {}", self.unit.name, e);
        }

        // attempted even when destroy failed
        let state_object = match &self.unit.backend {
            Some(backend) => {
                let deleted = delete_state_object(self.store.as_ref(), backend).await;
                if let Err(e) = &deleted {
                    error!("{}", e);
                }
                Some(deleted)
            }
            None => None,
        };

        CleanupReport {
            unit: self.unit.name,
            destroy: Some(destroy),
            state_object,
        }
    }
}

/// Owns the teardown of one provisioned unit. Teardown runs at most once: either through
/// [`Release::release`] or, if the handle is dropped first (a panic or an early return), from
/// `Drop`.
///
/// `Drop` blocks the current thread until teardown finishes on a separate thread with its own
/// runtime. Tests that rely on it should run on a multi-threaded runtime.
#[must_use = "dropping a Release tears the unit down immediately"]
pub struct Release {
    unit: String,
    teardown: Option<Teardown>,
}

impl Release {
    fn armed(teardown: Teardown) -> Self {
        Self {
            unit: teardown.unit.name.clone(),
            teardown: Some(teardown),
        }
    }

    fn disarmed(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            teardown: None,
        }
    }

    fn disarm(&mut self) {
        self.teardown = None;
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Destroy the unit and delete its state object.
    pub async fn release(mut self) -> CleanupReport {
        match self.teardown.take() {
            Some(teardown) => teardown.run().await,
            None => {
                info!("Nothing to tear down for '{}'", self.unit);
                CleanupReport::skipped(&self.unit)
            }
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        let teardown = match self.teardown.take() {
            Some(teardown) => teardown,
            None => return,
        };
        warn!("'{}' was not released, tearing it down", self.unit);
        let thread = std::thread::spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => {
                    let report = runtime.block_on(teardown.run());
                    if !report.is_clean() {
                        error!("{}", report);
                    }
                }
                Err(e) => error!(
                    "Unable to start a runtime to tear down '{}': {}",
                    teardown.unit.name, e
                ),
            }
        });
        if thread.join().is_err() {
            error!("Teardown of '{}' panicked", self.unit);
        }
    }
}

/// The outcome of a teardown. `None` means the step did not apply (cleanup disabled, or the unit
/// has no remote backend).
#[derive(Debug)]
pub struct CleanupReport {
    pub unit: String,
    pub destroy: Option<ProviderResult<()>>,
    pub state_object: Option<std::result::Result<(), StateError>>,
}

impl CleanupReport {
    fn skipped(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            destroy: None,
            state_object: None,
        }
    }

    /// `true` unless a step was attempted and failed.
    pub fn is_clean(&self) -> bool {
        !matches!(self.destroy, Some(Err(_))) && !matches!(self.state_object, Some(Err(_)))
    }

    pub fn destroyed(&self) -> bool {
        matches!(self.destroy, Some(Ok(())))
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_clean() {
            return Ok(());
        }
        error::CleanupSnafu {
            message: self.to_string(),
            unit: self.unit,
        }
        .fail()
    }
}

impl Display for CleanupReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Teardown of '{}': ", self.unit)?;
        match &self.destroy {
            None => write!(f, "destroy skipped")?,
            Some(Ok(())) => write!(f, "destroyed")?,
            Some(Err(e)) => write!(f, "destroy failed ({})", e)?,
        }
        match &self.state_object {
            None => Ok(()),
            Some(Ok(())) => write!(f, ", state object deleted"),
            Some(Err(e)) => write!(f, ", {}", e),
        }
    }
}
