//! The flattened key/value store every parser writes into.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::listener::{Listener, StoreOp};

/// Ordered dotted-key to string-value pairs.
///
/// Insertion order is preserved and a later write to an existing key
/// overwrites it in place. Every write is reported to the attached
/// [`Listener`], if any.
#[derive(Clone, Default)]
pub struct PropertyStore {
    entries: IndexMap<String, String>,
    listener: Option<Arc<dyn Listener>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: Option<Arc<dyn Listener>>) -> Self {
        Self {
            entries: IndexMap::new(),
            listener,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(listener) = &self.listener {
            listener.property(StoreOp::Set, &key, Some(&value));
        }
        self.entries.insert(key, value);
    }

    /// Merge a batch of pairs, reporting the batch once by its size.
    pub fn insert_all<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let before = self.entries.len();
        let mut count = 0usize;
        for (key, value) in pairs {
            self.entries.insert(key.into(), value.into());
            count += 1;
        }
        if let Some(listener) = &self.listener {
            listener.property(StoreOp::InsertAll, &count.to_string(), None);
        }
        tracing::trace!(count, added = self.entries.len() - before, "merged properties");
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All pairs whose key starts with `prefix.`, with that prefix removed.
    pub fn scoped(&self, prefix: &str) -> impl Iterator<Item = (&str, &str)> {
        let lead = format!("{prefix}.");
        self.entries.iter().filter_map(move |(k, v)| {
            k.strip_prefix(lead.as_str())
                .map(|rest| (rest, v.as_str()))
        })
    }

    pub(crate) fn listener(&self) -> Option<&Arc<dyn Listener>> {
        self.listener.as_ref()
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl PartialEq for PropertyStore {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            listener: None,
        }
    }
}

impl<'a> IntoIterator for &'a PropertyStore {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::recording::Recorder;

    #[test]
    fn preserves_insertion_order() {
        let mut store = PropertyStore::new();
        store.set("z", "1");
        store.set("a", "2");
        store.set("m", "3");
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn later_write_overwrites_in_place() {
        let mut store = PropertyStore::new();
        store.set("a", "1");
        store.set("b", "2");
        store.set("a", "3");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a"), Some("3"));
        assert_eq!(store.keys().next(), Some("a"));
    }

    #[test]
    fn every_write_is_observed() {
        let recorder = Arc::new(Recorder::default());
        let mut store = PropertyStore::with_listener(Some(recorder.clone()));
        store.set("app.port", "8080");
        store.insert_all([("a", "1"), ("b", "2")]);
        assert_eq!(
            recorder.events(),
            vec!["set app.port=8080".to_string(), "insert_all 2=".to_string()]
        );
    }

    #[test]
    fn scoped_strips_prefix() {
        let store: PropertyStore = [
            ("app.sample.local", "en"),
            ("app.sample.zone", "UTC"),
            ("app.samples", "x"),
            ("other", "y"),
        ]
        .into_iter()
        .collect();
        let scoped: Vec<_> = store.scoped("app.sample").collect();
        assert_eq!(scoped, vec![("local", "en"), ("zone", "UTC")]);
    }

    #[test]
    fn equality_ignores_listener() {
        let mut a = PropertyStore::with_listener(Some(Arc::new(Recorder::default())));
        a.set("k", "v");
        let b: PropertyStore = [("k", "v")].into_iter().collect();
        assert_eq!(a, b);
    }
}
