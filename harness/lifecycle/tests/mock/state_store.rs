use lifecycle::state::StateError;
use lifecycle::StateStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// An in-memory bucket list. With `unreachable` set every probe fails the way a permission error
/// would.
#[derive(Default)]
pub(crate) struct MockStateStore {
    buckets: Mutex<HashSet<String>>,
    unreachable: bool,
    pub(crate) created: AtomicUsize,
    pub(crate) deleted: Mutex<Vec<(String, String)>>,
}

impl MockStateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub(crate) fn creations(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn deleted_keys(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl StateStore for MockStateStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StateError> {
        if self.unreachable {
            return Err(StateError::Probe {
                bucket: bucket.to_string(),
                source: "403 Forbidden".into(),
            });
        }
        Ok(self.buckets.lock().unwrap().contains(bucket))
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        _region: &str,
        _description: &str,
    ) -> Result<(), StateError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.buckets.lock().unwrap().insert(bucket.to_string());
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StateError> {
        self.deleted
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}
