/*!

`readiness` waits for things to happen inside a freshly provisioned cluster.

[`wait_until_count_reached`] counts the distinct members announced by a change stream (nodes
joining a cluster, in practice) and completes once the expected number has been seen.
[`wait_for_job_completion`] follows a single job until it succeeds or fails. Both are bounded by a
total time budget and both work on plain [`Stream`]s so they can be driven without Kubernetes;
[`node_events`] and [`job_events`] produce those streams from a `kube` client.

[`Stream`]: futures::Stream

!*/

mod error;
mod jobs;
mod nodes;
mod session;

pub use error::{Error, Result};
pub use jobs::{job_events, wait_for_job, wait_for_job_completion, JobState, JobWatch};
pub use nodes::{node_events, wait_until_cluster_is_ready};
pub use session::{wait_until_count_reached, MemberEvent, WatchSession};
