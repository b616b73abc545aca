use crate::error::Result;
use crate::session::{wait_until_count_reached, MemberEvent};
use futures::{Stream, TryStreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher::{self, watcher, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, ResourceExt};
use std::time::Duration;

/// Node membership changes of the cluster `client` points at. Failed list and watch calls are
/// retried with an exponential backoff.
pub fn node_events(
    client: Client,
) -> impl Stream<Item = std::result::Result<MemberEvent, watcher::Error>> + Send + 'static {
    let nodes: Api<Node> = Api::all(client);
    watcher(nodes, watcher::Config::default())
        .backoff(watcher::default_backoff())
        .map_ok(|event| match event {
            Event::Applied(node) => MemberEvent::Joined(node.name_any()),
            Event::Deleted(node) => MemberEvent::Departed(node.name_any()),
            Event::Restarted(nodes) => {
                MemberEvent::Resynced(nodes.iter().map(|node| node.name_any()).collect())
            }
        })
}

/// Wait until `expected` nodes have joined the cluster.
pub async fn wait_until_cluster_is_ready(
    client: Client,
    expected: usize,
    timeout: Duration,
) -> Result<usize> {
    wait_until_count_reached(node_events(client), expected, timeout).await
}
