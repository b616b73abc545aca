use snafu::Snafu;
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Job '{}' failed: {}", job, reason))]
    JobFailed { job: String, reason: String },

    #[snafu(display("Job '{}' did not finish within {:?}", job, timeout))]
    JobTimeout {
        job: String,
        timeout: Duration,
        source: tokio::time::error::Elapsed,
    },

    #[snafu(display(
        "Expired resource: only {} of {} members were observed within {:?}",
        observed,
        expected,
        timeout
    ))]
    NotReady {
        expected: usize,
        observed: usize,
        timeout: Duration,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
