use crate::provider::{ApplySummary, ProviderError};
use crate::state::StateError;
use snafu::Snafu;

/// The error type returned by the [`Coordinator`] and the idempotency check.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to apply '{}': {}", unit, source))]
    Apply { unit: String, source: ProviderError },

    #[snafu(display("Teardown of '{}' did not complete: {}", unit, message))]
    Cleanup { unit: String, message: String },

    #[snafu(display("Unable to initialize '{}': {}", unit, source))]
    Init { unit: String, source: ProviderError },

    #[snafu(display("Output '{}' is missing", name))]
    MissingOutput { name: String },

    #[snafu(display(
        "The second apply of '{}' was not a no-op ({}); the module is not idempotent",
        unit,
        summary
    ))]
    NotIdempotent { unit: String, summary: ApplySummary },

    #[snafu(display("Output '{}' is not {}: {}", name, expected, value))]
    OutputType {
        name: String,
        expected: String,
        value: String,
    },

    #[snafu(display("Unable to read the outputs of '{}': {}", unit, source))]
    Outputs { unit: String, source: ProviderError },

    /// The second apply of an idempotency check failed. The first apply succeeded, so the unit
    /// is torn down whatever the provider reports.
    #[snafu(display("Unable to apply '{}' a second time: {}", unit, source))]
    Reapply { unit: String, source: ProviderError },

    #[snafu(display("Unable to prepare state bucket '{}': {}", bucket, source))]
    StateBucket { bucket: String, source: StateError },
}

pub type Result<T> = std::result::Result<T, Error>;
