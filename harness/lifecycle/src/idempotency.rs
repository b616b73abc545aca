use crate::error::{self, Result};
use crate::provider::{ApplySummary, Provision, ProvisioningUnit};
use log::{info, warn};
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::fmt::{Display, Formatter};

/// A reason for skipping the idempotency re-apply. Every exemption is named so that it shows up
/// in logs instead of silently taking the single-apply path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum IdempotencyExemption {
    /// Tags flip between `null` and `{}` across applies, so the second apply always reports an
    /// in-place update.
    TagNormalization,
}

impl Display for IdempotencyExemption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IdempotencyExemption::TagNormalization => {
                f.write_str("tags change from null to {} between applies")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub enum Idempotency {
    /// Apply twice and require the second apply to change nothing.
    #[default]
    Verify,
    /// Apply once.
    Exempt(IdempotencyExemption),
}

/// Apply `unit` twice and fail if the second apply reports any change. Returns the summary of the
/// first apply.
pub async fn apply_and_verify_idempotent<P>(
    provisioner: &P,
    unit: &ProvisioningUnit,
) -> Result<ApplySummary>
where
    P: Provision + ?Sized,
{
    let first = provisioner
        .apply(unit)
        .await
        .context(error::ApplySnafu { unit: &unit.name })?;
    info!("Applied '{}' ({}), applying again", unit.name, first);
    let second = provisioner
        .apply(unit)
        .await
        .context(error::ReapplySnafu { unit: &unit.name })?;
    ensure!(
        second.is_noop(),
        error::NotIdempotentSnafu {
            unit: &unit.name,
            summary: second,
        }
    );
    info!("Second apply of '{}' changed nothing", unit.name);
    Ok(first)
}

/// Apply `unit` according to its [`Idempotency`] policy.
pub(crate) async fn apply_unit<P>(provisioner: &P, unit: &ProvisioningUnit) -> Result<ApplySummary>
where
    P: Provision + ?Sized,
{
    match unit.idempotency {
        Idempotency::Verify => apply_and_verify_idempotent(provisioner, unit).await,
        Idempotency::Exempt(reason) => {
            warn!(
                "Skipping the idempotency check for '{}': {}",
                unit.name, reason
            );
            provisioner
                .apply(unit)
                .await
                .context(error::ApplySnafu { unit: &unit.name })
        }
    }
}
