//! Dynamically typed parameter values.
//!
//! Handlers receive their arguments by *name*, and the values behind those
//! names come from two very different places: path segments (always
//! strings) and the application's parameter store (anything at all: a
//! database pool, a response buffer, a config struct). [`Value`] is the
//! common currency: a shared, type-erased pointer that the handler
//! downcasts back to whatever it expects.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

// ── Value ─────────────────────────────────────────────────────────────────────

/// A shared, type-erased value.
///
/// Cloning is one atomic increment. Two clones of the same `Value` point at
/// the same object, so a handler that mutates through interior mutability
/// (a `Mutex`, an atomic) is seen by everyone holding the value.
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an existing `Arc` without copying, so the caller keeps a handle
    /// to the same object.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).downcast_ref::<T>()
    }

    /// Shared handle to the concrete value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// The value as a string slice, if it holds a `String` or `&'static str`.
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.downcast_ref::<&'static str>().copied())
    }

    /// `true` if both values point at the same object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.debug_tuple("Value").field(&s).finish(),
            None    => f.write_str("Value(..)"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::new(s) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::new(s.to_owned()) }
}

// ── Values ────────────────────────────────────────────────────────────────────

/// An ordered name → [`Value`] mapping.
///
/// Route matches produce one of these; it is also how route-level defaults
/// are declared. Route parameter lists are short, so lookups are a linear
/// scan that keeps insertion order for free.
#[derive(Clone, Debug, Default)]
pub struct Values {
    entries: Vec<(String, Value)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Values::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Args ──────────────────────────────────────────────────────────────────────

/// The resolved argument list handed to a handler.
///
/// Position `i` holds the value bound to the handler's `i`-th declared
/// parameter name, or `None` when neither the route nor the parameter
/// store had anything under that name.
#[derive(Clone, Debug)]
pub struct Args {
    names: Arc<[String]>,
    values: Vec<Option<Value>>,
}

impl Args {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<Option<Value>>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// The value at position `i`, or `None` if unbound or out of range.
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)?.as_ref()
    }

    /// The value at position `i` downcast to `T`.
    pub fn value<T: Any>(&self, i: usize) -> Option<&T> {
        self.get(i)?.downcast_ref::<T>()
    }

    /// The value at position `i` as a string slice.
    pub fn str(&self, i: usize) -> Option<&str> {
        self.get(i)?.as_str()
    }

    /// The declared name of position `i`.
    pub fn name(&self, i: usize) -> Option<&str> {
        self.names.get(i).map(String::as_str)
    }

    /// Look an argument up by its declared name instead of its position.
    pub fn named(&self, name: &str) -> Option<&Value> {
        let i = self.names.iter().position(|n| n == name)?;
        self.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().map(Option::as_ref))
    }
}
