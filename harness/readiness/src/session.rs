use crate::error::{self, Result};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// A change to the membership of a watched collection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemberEvent {
    /// A member was added or updated.
    Joined(String),
    /// A member was removed.
    Departed(String),
    /// The watch was re-established and these are all current members.
    Resynced(Vec<String>),
}

/// Tracks the distinct members seen so far and fires a single completion signal when `expected`
/// of them have been seen.
#[derive(Debug)]
pub struct WatchSession {
    expected: usize,
    seen: Mutex<HashSet<String>>,
    done: Mutex<Option<oneshot::Sender<usize>>>,
}

impl WatchSession {
    /// Returns the session and the receiving end of its completion signal. The signal carries
    /// the number of distinct members observed when it fired.
    pub fn new(expected: usize) -> (Arc<Self>, oneshot::Receiver<usize>) {
        let (tx, rx) = oneshot::channel();
        let session = Arc::new(Self {
            expected,
            seen: Mutex::new(HashSet::new()),
            done: Mutex::new(Some(tx)),
        });
        if expected == 0 {
            session.fire(0);
        }
        (session, rx)
    }

    /// Record `id`. Returns `true` only for the call that completed the session.
    pub fn observe(&self, id: &str) -> bool {
        let count = {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if !seen.insert(id.to_string()) {
                return false;
            }
            seen.len()
        };
        debug!("Observed '{}' ({}/{})", id, count, self.expected);
        count >= self.expected && self.fire(count)
    }

    pub fn observed(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    fn fire(&self, count: usize) -> bool {
        let sender = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            // the receiver may already be gone after a timeout
            Some(sender) => {
                let _ = sender.send(count);
                true
            }
            None => false,
        }
    }
}

/// Wait until `expected` distinct members have been announced by `events`, or fail with
/// [`Error::NotReady`] after `timeout`.
///
/// The stream is consumed on a background task that is stopped before this function returns. A
/// stream that ends early does not end the wait; the timeout still applies.
///
/// [`Error::NotReady`]: crate::Error::NotReady
pub async fn wait_until_count_reached<S, E>(
    events: S,
    expected: usize,
    timeout: Duration,
) -> Result<usize>
where
    S: Stream<Item = std::result::Result<MemberEvent, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (session, done) = WatchSession::new(expected);
    info!("Waiting up to {:?} for {} members", timeout, expected);
    let consumer = tokio::spawn(consume(events, Arc::clone(&session)));

    let outcome = tokio::time::timeout(timeout, done).await;

    consumer.abort();
    if let Err(e) = consumer.await {
        if !e.is_cancelled() {
            warn!("The watch task did not exit cleanly: {}", e);
        }
    }

    match outcome {
        Ok(Ok(observed)) => {
            info!("{} of {} members are present", observed, expected);
            Ok(observed)
        }
        _ => error::NotReadySnafu {
            expected,
            observed: session.observed(),
            timeout,
        }
        .fail(),
    }
}

async fn consume<S, E>(events: S, session: Arc<WatchSession>)
where
    S: Stream<Item = std::result::Result<MemberEvent, E>>,
    E: Display,
{
    let mut events = Box::pin(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(MemberEvent::Joined(id)) => {
                session.observe(&id);
            }
            Ok(MemberEvent::Resynced(ids)) => {
                for id in ids {
                    session.observe(&id);
                }
            }
            Ok(MemberEvent::Departed(id)) => {
                debug!("'{}' departed, it still counts as having joined", id)
            }
            Err(e) => warn!("Error from the watch stream, waiting for it to recover: {}", e),
        }
    }
    warn!(
        "The watch stream ended after {} of {} members",
        session.observed(),
        session.expected()
    );
}
