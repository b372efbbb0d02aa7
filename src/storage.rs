/// Persisted key-value storage (chrome.storage.local and an in-memory stand-in)

use crate::error::StoreError;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const SITE_START_PREFIX: &str = "siteStartTime_";
const REMINDER_SENT_PREFIX: &str = "reminderSent_";

/// Key holding the first-visit timestamp of a domain
pub fn site_start_key(domain: &str) -> String {
    format!("{SITE_START_PREFIX}{domain}")
}

/// Key holding the one-shot reminder flag of a domain
pub fn reminder_sent_key(domain: &str) -> String {
    format!("{REMINDER_SENT_PREFIX}{domain}")
}

/// Asynchronous get/set/remove by key set
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Values for the requested keys; absent keys are missing from the map
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

impl<S: KeyValueStore> KeyValueStore for Rc<S> {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        self.as_ref().get(keys).await
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        self.as_ref().set(items).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.as_ref().remove(keys).await
    }
}

/// Write `items`, retrying once after a logged failure
pub async fn set_with_retry<S: KeyValueStore>(
    store: &S,
    items: Map<String, Value>,
) -> Result<(), StoreError> {
    match store.set(items.clone()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::warn!("Storage write failed, retrying once: {}", e);
            store.set(items).await.inspect_err(|e| {
                log::error!("Storage write failed after retry: {}", e);
            })
        }
    }
}

/// Remove `keys`, retrying once after a logged failure
pub async fn remove_with_retry<S: KeyValueStore>(
    store: &S,
    keys: &[&str],
) -> Result<(), StoreError> {
    match store.remove(keys).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::warn!("Storage remove failed, retrying once: {}", e);
            store.remove(keys).await.inspect_err(|e| {
                log::error!("Storage remove failed after retry: {}", e);
            })
        }
    }
}

/// Read `keys`, treating a failed read as "nothing stored"
pub async fn get_or_empty<S: KeyValueStore>(store: &S, keys: &[&str]) -> Map<String, Value> {
    store.get(keys).await.unwrap_or_else(|e| {
        log::warn!("Storage read of {:?} failed, using defaults: {}", keys, e);
        Map::new()
    })
}

/// In-process store, used outside the extension and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<Map<String, Value>>,
    failing_reads: Cell<u32>,
    failing_writes: Cell<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.set(count);
    }

    /// Make the next `count` writes or removes fail
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.set(count);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.data.borrow_mut().insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.borrow().contains_key(key)
    }

    fn take_failure(counter: &Cell<u32>, op: &'static str) -> Result<(), StoreError> {
        let remaining = counter.get();
        if remaining > 0 {
            counter.set(remaining - 1);
            return Err(StoreError::Backend {
                op,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        Self::take_failure(&self.failing_reads, "get")?;
        let data = self.data.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        Self::take_failure(&self.failing_writes, "set")?;
        self.data.borrow_mut().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        Self::take_failure(&self.failing_writes, "remove")?;
        let mut data = self.data.borrow_mut();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn items(key: &str, value: Value) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn test_key_patterns() {
        assert_eq!(site_start_key("youtube.com"), "siteStartTime_youtube.com");
        assert_eq!(reminder_sent_key("youtube.com"), "reminderSent_youtube.com");
    }

    #[test]
    fn test_get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store.insert("a", json!(1));

        let result = block_on(store.get(&["a", "b"])).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_injected_read_failure() {
        let store = MemoryStore::new();
        store.insert("a", json!(1));
        store.fail_next_reads(1);

        assert!(block_on(store.get(&["a"])).is_err());
        assert!(block_on(get_or_empty(&store, &["a"])).contains_key("a"));
    }

    #[test]
    fn test_set_and_remove() {
        let store = MemoryStore::new();
        block_on(store.set(items("a", json!(true)))).unwrap();
        assert!(store.contains("a"));

        block_on(store.remove(&["a", "missing"])).unwrap();
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_set_with_retry_recovers_from_one_failure() {
        let store = MemoryStore::new();
        store.fail_next_writes(1);

        block_on(set_with_retry(&store, items("a", json!(5)))).unwrap();

        assert_eq!(store.value("a"), Some(json!(5)));
    }

    #[test]
    fn test_set_with_retry_gives_up_after_two_failures() {
        let store = MemoryStore::new();
        store.fail_next_writes(2);

        let result = block_on(set_with_retry(&store, items("a", json!(5))));

        assert!(result.is_err());
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_remove_with_retry() {
        let store = MemoryStore::new();
        store.insert("a", json!(1));
        store.fail_next_writes(1);

        block_on(remove_with_retry(&store, &["a"])).unwrap();

        assert!(!store.contains("a"));
    }

    #[test]
    fn test_shared_store_through_rc() {
        let store = Rc::new(MemoryStore::new());
        let handle = Rc::clone(&store);

        block_on(handle.set(items("k", json!("v")))).unwrap();

        assert_eq!(store.value("k"), Some(json!("v")));
    }
}
