//! Application-wide named parameters.
//!
//! Handlers that declare a name the route did not capture fall back to this
//! store. Keys are set once: a second `set` for the same key is an error, so
//! independently configured modules cannot silently shadow each other.
//!
//! Values are either concrete or lazy. A lazy value is a zero-argument
//! provider that runs on the first [`fetch`](ParameterStore::fetch) and is
//! then replaced by its result for the lifetime of the store.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use tracing::trace;

use crate::error::Error;
use crate::value::Value;

type Provider = Box<dyn FnOnce() -> Value + Send>;

enum Entry {
    Concrete(Value),
    Lazy(LazyLock<Value, Provider>),
}

impl Entry {
    fn get(&self) -> Value {
        match self {
            Self::Concrete(v) => v.clone(),
            Self::Lazy(cell) => LazyLock::force(cell).clone(),
        }
    }
}

/// Set-once, insertion-ordered parameter map with memoized providers.
///
/// `fetch` takes `&self`: provider evaluation goes through a
/// [`LazyLock`], so a store shared across threads after setup still runs
/// each provider exactly once.
#[derive(Default)]
pub struct ParameterStore {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a concrete value under `key`.
    ///
    /// Fails with [`Error::DuplicateParameter`] if `key` already exists; the
    /// existing value is left untouched.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), Error> {
        self.insert(key.into(), Entry::Concrete(value.into()))
    }

    /// Store a provider under `key`. It runs on first fetch, at most once.
    pub fn set_lazy<F>(&mut self, key: impl Into<String>, provider: F) -> Result<(), Error>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let key = key.into();
        let name = key.clone();
        let provider: Provider = Box::new(move || {
            trace!(key = %name, "evaluating lazy parameter");
            provider()
        });
        self.insert(key, Entry::Lazy(LazyLock::new(provider)))
    }

    fn insert(&mut self, key: String, entry: Entry) -> Result<(), Error> {
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateParameter(key));
        }
        self.order.push(key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// The value under `key`, evaluating and caching a provider on first use.
    ///
    /// Unknown keys return `None`; this never fails.
    pub fn fetch(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(Entry::get)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Keys in the order they were set.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStore").field("keys", &self.order).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn duplicate_set_keeps_first_value() {
        let mut store = ParameterStore::new();
        store.set("foo", "first").unwrap();

        let err = store.set("foo", "second").unwrap_err();
        assert!(matches!(err, Error::DuplicateParameter(ref k) if k == "foo"));
        assert_eq!(store.fetch("foo").unwrap().as_str(), Some("first"));
    }

    #[test]
    fn duplicate_rejected_across_kinds() {
        let mut store = ParameterStore::new();
        store.set_lazy("db", || Value::from("pool")).unwrap();
        assert!(store.set("db", "other").is_err());
        assert!(store.set_lazy("db", || Value::from("again")).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_key_is_absent() {
        let store = ParameterStore::new();
        assert!(store.fetch("foo").is_none());
        assert!(!store.contains("foo"));
        assert!(store.is_empty());
    }

    #[test]
    fn provider_runs_once_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut store = ParameterStore::new();
        store
            .set_lazy("foo", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::new(vec![1u8, 2, 3])
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = store.fetch("foo").unwrap();
        let second = store.fetch("foo").unwrap();
        let third = store.fetch("foo").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(first.ptr_eq(&second));
        assert!(second.ptr_eq(&third));
        assert_eq!(first.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn provider_runs_once_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut store = ParameterStore::new();
        store
            .set_lazy("expensive", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::new(42u64)
            })
            .unwrap();

        let store = Arc::new(store);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || *store.fetch("expensive").unwrap().downcast_ref::<u64>().unwrap())
            })
            .collect();

        for t in threads {
            assert_eq!(t.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keys_keep_insertion_order() {
        let mut store = ParameterStore::new();
        store.set("zeta", "z").unwrap();
        store.set("alpha", "a").unwrap();
        store.set_lazy("mid", || Value::from("m")).unwrap();
        assert_eq!(store.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    }
}
