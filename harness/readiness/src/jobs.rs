use crate::error::{self, Result};
use futures::{Stream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, ResourceExt};
use log::{debug, info, warn};
use snafu::ResultExt;
use std::fmt::Display;
use std::time::Duration;

/// Where a job is in its life, as far as a test cares.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed(String),
}

impl JobState {
    pub fn of(job: &Job) -> Self {
        let status = match &job.status {
            Some(status) => status,
            None => return JobState::Running,
        };

        // kubernetes does not set a completion time on jobs that hit their backoff limit
        let failed_condition = status.conditions.iter().flatten().find(|condition| {
            condition.type_ == "Failed" && condition.status == "True"
        });
        if let Some(condition) = failed_condition {
            return JobState::Failed(
                condition
                    .message
                    .clone()
                    .or_else(|| condition.reason.clone())
                    .unwrap_or_else(|| "Job failed".to_string()),
            );
        }

        if status.completion_time.is_some() {
            return if status.succeeded == Some(1) {
                JobState::Succeeded
            } else {
                JobState::Failed("Job completed with errors".to_string())
            };
        }

        JobState::Running
    }
}

/// Wait for the job named `job_name` to finish. Objects for other jobs are ignored. Fails with
/// [`Error::JobFailed`] when the job fails and [`Error::JobTimeout`] when it has not finished
/// within `timeout`, counted from the start of the call.
///
/// [`Error::JobFailed`]: crate::Error::JobFailed
/// [`Error::JobTimeout`]: crate::Error::JobTimeout
pub async fn wait_for_job_completion<S, E>(jobs: S, job_name: &str, timeout: Duration) -> Result<()>
where
    S: Stream<Item = std::result::Result<Job, E>>,
    E: Display,
{
    info!("Waiting up to {:?} for job '{}'", timeout, job_name);
    let watch = async {
        let mut jobs = Box::pin(jobs);
        while let Some(job) = jobs.next().await {
            let job = match job {
                Ok(job) => job,
                Err(e) => {
                    warn!("Error while watching job '{}': {}", job_name, e);
                    continue;
                }
            };
            if job.name_any() != job_name {
                continue;
            }
            match JobState::of(&job) {
                JobState::Running => debug!("Job '{}' is still running", job_name),
                JobState::Succeeded => {
                    info!("Job '{}' succeeded", job_name);
                    return Ok(());
                }
                JobState::Failed(reason) => {
                    return error::JobFailedSnafu {
                        job: job_name,
                        reason,
                    }
                    .fail()
                }
            }
        }
        warn!("The watch on job '{}' ended, waiting out the timeout", job_name);
        futures::future::pending::<Result<()>>().await
    };
    tokio::time::timeout(timeout, watch)
        .await
        .context(error::JobTimeoutSnafu {
            job: job_name,
            timeout,
        })?
}

/// Jobs in `namespace`, optionally restricted by a label selector such as `app=postgres-client`.
/// Failed list and watch calls are retried with an exponential backoff.
pub fn job_events(
    client: Client,
    namespace: &str,
    selector: Option<&str>,
) -> impl Stream<Item = std::result::Result<Job, watcher::Error>> + Send + 'static {
    let jobs: Api<Job> = Api::namespaced(client, namespace);
    let params = match selector {
        Some(selector) => watcher::Config::default().labels(selector),
        None => watcher::Config::default(),
    };
    watcher(jobs, params)
        .backoff(watcher::default_backoff())
        .applied_objects()
}

/// Wait for `job_name` in `namespace` to finish.
pub async fn wait_for_job(
    client: Client,
    namespace: &str,
    job_name: &str,
    timeout: Duration,
    selector: Option<&str>,
) -> Result<()> {
    wait_for_job_completion(job_events(client, namespace, selector), job_name, timeout).await
}

/// One wait for a job to finish: the job, where to find it and how long to wait.
#[derive(Clone, Debug)]
pub struct JobWatch {
    pub namespace: String,
    pub job_name: String,
    pub selector: Option<String>,
    pub timeout: Duration,
}

impl JobWatch {
    pub fn new<S1, S2>(namespace: S1, job_name: S2, timeout: Duration) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            job_name: job_name.into(),
            selector: None,
            timeout,
        }
    }

    /// Only watch jobs matching `selector`, e.g. `app=postgres-client`.
    pub fn selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub async fn wait(&self, client: Client) -> Result<()> {
        wait_for_job(
            client,
            &self.namespace,
            &self.job_name,
            self.timeout,
            self.selector.as_deref(),
        )
        .await
    }
}
