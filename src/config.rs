//! The configuration facade: typed reads over a parsed property store.
//!
//! A [`Configuration`] wraps a [`PropertyStore`] and resolves `${...}`
//! references when a value is read, never at parse time. Reads go through
//! the converter, so any [`Deserialize`](serde::Deserialize) type can be
//! requested:
//!
//! ```
//! use polyconf::{Configuration, Format, parse_str};
//!
//! let text = "server {\n  host = localhost\n  port = 8080\n  url = \"http://${server.host}:${server.port}\"\n}\n";
//! let config = Configuration::new(parse_str(text, Format::Hocon)?);
//! assert_eq!(config.get::<u16>("server.port")?, 8080);
//! assert_eq!(config.get_string("server.url")?, "http://localhost:8080");
//! # Ok::<(), polyconf::ConfigError>(())
//! ```
//!
//! # Sub-views
//!
//! [`configuration`](Configuration::configuration) returns the keys under a
//! prefix with the prefix stripped. Views are memoized per key: asking twice
//! returns the same [`Arc`]. A view captures its keys when first built;
//! references inside it still resolve against the whole document.
//!
//! # Unread keys
//!
//! Every key starts out in the "remains" set and leaves it the first time a
//! typed accessor reads it, through the root or through any view.
//! [`remains`](Configuration::remains) lists what was never read.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::de::DeserializeOwned;

use crate::convert::{convert, short_type_name};
use crate::error::ConfigError;
use crate::listener::Listener;
use crate::mapper;
use crate::resolve::{Resolver, Unresolved};
use crate::store::PropertyStore;
use crate::tree;
use crate::value::Value;

pub struct Configuration {
    /// Keys of this view, prefix stripped.
    properties: Arc<PropertyStore>,
    /// The whole document, full keys. References resolve against it.
    root: Arc<PropertyStore>,
    prefix: String,
    views: DashMap<String, Arc<Configuration>>,
    remains: Arc<DashSet<String>>,
    listener: Option<Arc<dyn Listener>>,
}

impl Configuration {
    pub fn new(store: PropertyStore) -> Self {
        let listener = store.listener().cloned();
        let remains: DashSet<String> = store.keys().map(str::to_string).collect();
        let properties = Arc::new(store);
        Self {
            root: Arc::clone(&properties),
            properties,
            prefix: String::new(),
            views: DashMap::new(),
            remains: Arc::new(remains),
            listener,
        }
    }

    /// The dotted key this view is scoped to; empty for the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The raw, unresolved properties of this view.
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn size(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains(key)
    }

    /// The value as written, references unresolved. Does not mark the key read.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// All keys of this view in document order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys()
    }

    pub fn property_names_matching<P>(&self, predicate: P) -> Vec<&str>
    where
        P: Fn(&str) -> bool,
    {
        self.properties.keys().filter(|k| predicate(k)).collect()
    }

    /// Read `key` with references resolved.
    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.resolved(key)?
            .ok_or_else(|| ConfigError::KeyNotFound(self.full_key(key)))
    }

    /// Read `key` with references resolved and convert it to `T`.
    ///
    /// A missing key is [`KeyNotFound`](ConfigError::KeyNotFound); a value
    /// that does not convert is a [`Conversion`](ConfigError::Conversion)
    /// error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let raw = self.get_string(key)?;
        convert(&raw)
    }

    /// Like [`get`](Self::get), with `default` for a missing key.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.resolved(key)? {
            Some(raw) => convert(&raw),
            None => Ok(default),
        }
    }

    pub fn get_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.resolved(key)?.map(|raw| convert(&raw)).transpose()
    }

    /// Read a comma-separated or bracketed list.
    pub fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ConfigError> {
        self.get(key)
    }

    /// The sub-view of every key under `key`, prefix stripped.
    ///
    /// The first call builds the view; later calls return the same instance
    /// until the next [`append`](Self::append).
    pub fn configuration(&self, key: &str) -> Arc<Configuration> {
        let view = match self.views.entry(key.to_string()) {
            Entry::Occupied(view) => return Arc::clone(view.get()),
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(self.scope(key))).value()),
        };
        // Entry guard dropped: the listener may call back into this configuration.
        tracing::debug!(prefix = %view.prefix, size = view.size(), "caching sub-configuration");
        if let Some(listener) = &self.listener {
            listener.cached(&view.prefix, &view.to_string(), true);
        }
        view
    }

    /// Build a `T` from every key under `key`, or from the value of `key`
    /// itself when nothing is nested under it. An empty `key` binds the
    /// whole view.
    ///
    /// Dotted keys become nested maps and references are resolved before
    /// binding. Fields that fail to convert keep their defaults.
    pub fn bind<T: DeserializeOwned + 'static>(&self, key: &str) -> Result<T, ConfigError> {
        let names: Vec<String> = if key.is_empty() {
            self.properties.keys().map(str::to_string).collect()
        } else {
            self.properties.scoped(key).map(|(k, _)| k.to_string()).collect()
        };

        let source = if names.is_empty() {
            Value::Str(self.get_string(key)?)
        } else {
            let mut pairs = Vec::with_capacity(names.len());
            for name in &names {
                if let Some(value) = self.resolved(&join(key, name))? {
                    pairs.push((name.as_str(), value));
                }
            }
            tree::unflatten(pairs)
        };

        let bound: T = mapper::bind(source)?;
        let full = self.full_key(key);
        let type_name = short_type_name::<T>();
        tracing::debug!(key = %full, ty = %type_name, "bound configuration");
        if let Some(listener) = &self.listener {
            listener.created(&full, &type_name, &bound);
        }
        Ok(bound)
    }

    /// Overlay `pairs` onto this configuration. Existing keys are overwritten
    /// and keep their read state; new keys are added and count as unread.
    /// Cached sub-views are dropped.
    pub fn append<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if pairs.is_empty() {
            return;
        }

        let added: HashSet<String> = pairs
            .iter()
            .filter(|(key, _)| !self.properties.contains(key))
            .map(|(key, _)| self.full_key(key))
            .collect();
        let properties = Arc::make_mut(&mut self.properties);
        for (key, value) in &pairs {
            properties.set(key.as_str(), value.as_str());
        }

        let full: Vec<(String, &str)> = pairs
            .iter()
            .map(|(k, v)| (self.full_key(k), v.as_str()))
            .collect();
        if self.prefix.is_empty() {
            self.root = Arc::clone(&self.properties);
        } else {
            let root = Arc::make_mut(&mut self.root);
            for (key, value) in &full {
                root.set(key.as_str(), *value);
            }
        }

        for (key, value) in &full {
            if added.contains(key) {
                self.remains.insert(key.clone());
            }
            if let Some(listener) = &self.listener {
                listener.cached(key, value, false);
            }
        }
        self.views.clear();
        tracing::debug!(count = full.len(), prefix = %self.prefix, "appended properties");
    }

    /// Keys of this view never read through a typed accessor, in document order.
    pub fn remains(&self) -> Vec<String> {
        self.properties
            .keys()
            .filter(|k| self.remains.contains(&self.full_key(k)))
            .map(str::to_string)
            .collect()
    }

    fn full_key(&self, key: &str) -> String {
        join(&self.prefix, key)
    }

    fn resolved(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if !self.properties.contains(key) {
            return Ok(None);
        }
        let full = self.full_key(key);
        let value = Resolver::new(self.root.as_ref(), Unresolved::Fail).resolve_key(&full)?;
        self.remains.remove(&full);
        Ok(value)
    }

    fn scope(&self, key: &str) -> Configuration {
        Configuration {
            properties: Arc::new(self.properties.scoped(key).collect()),
            root: Arc::clone(&self.root),
            prefix: self.full_key(key),
            views: DashMap::new(),
            remains: Arc::clone(&self.remains),
            listener: self.listener.clone(),
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{key}"),
    }
}

impl From<PropertyStore> for Configuration {
    fn from(store: PropertyStore) -> Self {
        Configuration::new(store)
    }
}

/// One `key = value` line per property, values as written.
impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.properties.iter() {
            writeln!(f, "{key} = {value}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("prefix", &self.prefix)
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Mutex, OnceLock, Weak};

    use indexmap::IndexMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::test::{AppSample, Level, resources};
    use crate::listener::recording::Recorder;
    use crate::parser::{ParseContext, parse, parse_str};
    use crate::temporal::{Date, DateTime, Time};
    use crate::types::Format;

    fn load(name: &str) -> Configuration {
        let path = resources().join(name);
        let text = fs::read_to_string(&path).unwrap();
        let format = Format::from_resource(name).unwrap();
        Configuration::new(parse_str(&text, format).unwrap())
    }

    fn hocon(text: &str) -> Configuration {
        Configuration::new(parse_str(text, Format::Hocon).unwrap())
    }

    #[test]
    fn reference_documents_agree() {
        for name in ["reference.conf", "reference.json", "reference.properties"] {
            let config = load(name);
            assert_eq!(config.get_string("APP.sample.url").unwrap(), "http://www.abc.com/", "{name}");
            assert_eq!(config.get_string("APP.sample.cost").unwrap(), "1080", "{name}");
            assert_eq!(config.get::<i32>("APP.sample.cost").unwrap(), 1080, "{name}");
            assert_eq!(config.get::<i64>("APP.sample.cost").unwrap(), 1080, "{name}");
            assert_eq!(config.property_names().count(), 8, "{name}");
            assert_eq!(config.property_names_matching(|n| n.contains("nested")).len(), 2, "{name}");
            assert_eq!(config.size(), 8, "{name}");
        }
    }

    #[test]
    fn sub_views_are_memoized() {
        let config = load("reference.conf");
        let sub = config.configuration("APP.sample.nested");
        assert_eq!(sub.get_string("name").unwrap(), "child");
        assert_eq!(sub.get::<f64>("threshold").unwrap(), 1.4);
        assert_eq!(sub.size(), 2);
        assert_eq!(sub.prefix(), "APP.sample.nested");
        assert_eq!(config.size(), 8);

        let other = config.configuration("APP.sample.nested");
        assert!(Arc::ptr_eq(&sub, &other));
        assert_eq!(config.size(), 8);
    }

    #[test]
    fn views_of_views() {
        let config = load("reference.conf");
        let sample = config.configuration("APP.sample");
        let nested = sample.configuration("nested");
        assert_eq!(nested.prefix(), "APP.sample.nested");
        assert_eq!(nested.get_string("name").unwrap(), "child");
        assert!(Arc::ptr_eq(&nested, &sample.configuration("nested")));
    }

    #[test]
    fn temporal_values() {
        let config = load("reference.conf");
        assert_eq!(config.get::<Date>("APP.sample.date").unwrap().to_string(), "2016/09/16");
        assert_eq!(config.get::<Time>("APP.sample.time").unwrap().to_string(), "09:15:00");
        assert_eq!(
            config.get::<DateTime>("APP.sample.datetime").unwrap().to_string(),
            "2016/09/16 09:15:00"
        );
    }

    #[test]
    fn references_resolve_on_read() {
        let config = hocon(
            "setting {\n  local = en-US\n}\napp {\n  sample {\n    local = ${setting.local}\n    langs = [${app.sample.local}, ja-JP]\n  }\n}\n",
        );
        assert_eq!(config.raw("app.sample.local"), Some("${setting.local}"));
        assert_eq!(config.get_string("app.sample.local").unwrap(), "en-US");
        let langs: Vec<String> = config.get_list("app.sample.langs").unwrap();
        assert_eq!(langs, vec!["en-US", "ja-JP"]);

        let sample = config.configuration("app.sample");
        assert_eq!(sample.get_string("local").unwrap(), "en-US");
    }

    #[test]
    fn json_bracket_list_resolves_to_literal_text() {
        let text = "# Json Comment\nsetting : {\n  local : en-US\n}\n,\napp : {\n  sample : {\n    local : ${setting.local},\n    lang : ${app.sample.local},\n    langs : [${app.sample.local}, \"ja-JP\",\"zh-CN\"],\n    cost : \"1080\"\n  }\n}\n// Json Comment\n";
        let config = Configuration::new(parse_str(text, Format::Json).unwrap());
        assert_eq!(config.get_string("app.sample.local").unwrap(), "en-US");
        assert_eq!(config.get_string("app.sample.lang").unwrap(), "en-US");
        assert_eq!(config.get_string("app.sample.langs").unwrap(), "[en-US,ja-JP,zh-CN]");
        let langs: Vec<String> = config.get_list("app.sample.langs").unwrap();
        assert_eq!(langs[0], "en-US");
        assert_eq!(langs.len(), 3);
    }

    #[test]
    fn nested_reference_through_yaml_alias() {
        let text = "# Comment\nvcap:\n  services:\n    ups-admin:\n      credentials:\n        admin.api.server.auth.enable: true\npaas:\n  vcap:\n    alias: vcap.services.ups-admin.credentials\n\nadmin:\n  auth:\n    api:\n      enable: ${${paas.vcap.alias}.admin.api.server.auth.enable}\n\n";
        let config = Configuration::new(parse_str(text, Format::Yaml).unwrap());
        assert_eq!(config.size(), 3);
        assert_eq!(
            config.raw("admin.auth.api.enable"),
            Some("${${paas.vcap.alias}.admin.api.server.auth.enable}")
        );
        assert_eq!(config.get_string("admin.auth.api.enable").unwrap(), "true");
        assert!(config.get::<bool>("admin.auth.api.enable").unwrap());
    }

    #[test]
    fn yaml_resource() {
        let config = load("app-dev.yml");
        assert_eq!(config.get_string("admin.server-auth.admin-api.enable").unwrap(), "true");
    }

    #[test]
    fn missing_and_optional_keys() {
        let config = load("reference.conf");
        let err = config.get::<u32>("APP.sample.missing").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound(ref k) if k == "APP.sample.missing"));
        assert_eq!(config.get_or("APP.sample.missing", 7u32).unwrap(), 7);
        assert_eq!(config.get_or("APP.sample.cost", 7u32).unwrap(), 1080);
        assert_eq!(config.get_optional::<u32>("APP.sample.missing").unwrap(), None);
        assert_eq!(config.get_optional::<u32>("APP.sample.cost").unwrap(), Some(1080));
    }

    #[test]
    fn conversion_failure_propagates_from_typed_get() {
        let config = load("reference.conf");
        let err = config.get::<u32>("APP.sample.url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(err.to_string().contains("http://www.abc.com/"));
    }

    #[test]
    fn unresolved_reference_fails_read() {
        let config = hocon("a = ${nowhere}\nb = ${nowhere, fallback}\nc = ${c}\n");
        let err = config.get_string("a").unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedReference { ref reference } if reference == "nowhere"));
        assert_eq!(config.get_string("b").unwrap(), "fallback");
        let err = config.get_string("c").unwrap_err();
        assert!(matches!(err, ConfigError::ReferenceCycle { .. }));
    }

    #[test]
    fn remains_tracks_unread_keys() {
        let config = load("reference.conf");
        assert_eq!(config.remains().len(), 8);
        config.get_string("APP.sample.url").unwrap();
        let _ = config.raw("APP.sample.cost");
        let nested = config.configuration("APP.sample.nested");
        nested.get_string("name").unwrap();

        let remains = config.remains();
        assert_eq!(remains.len(), 6);
        assert!(!remains.contains(&"APP.sample.url".to_string()));
        assert!(!remains.contains(&"APP.sample.nested.name".to_string()));
        assert!(remains.contains(&"APP.sample.cost".to_string()));
        assert_eq!(nested.remains(), vec!["threshold".to_string()]);
    }

    #[test]
    fn bind_sub_tree() {
        let recorder = Arc::new(Recorder::default());
        let text = fs::read_to_string(resources().join("reference.conf")).unwrap();
        let ctx = ParseContext::new().listener(Some(recorder.clone()));
        let config = Configuration::new(parse(&text, Format::Hocon, &ctx).unwrap());

        let sample: AppSample = config.bind("APP.sample").unwrap();
        assert_eq!(sample.local, "en-US");
        assert_eq!(sample.url, "http://www.abc.com/");
        assert_eq!(sample.cost, 1080);
        assert_eq!(sample.date.map(|d| d.to_string()).as_deref(), Some("2016/09/16"));
        assert_eq!(sample.time.map(|t| t.to_string()).as_deref(), Some("09:15:00"));
        assert!(sample.datetime.is_some());
        assert_eq!(sample.nested.name, "child");
        assert_eq!(sample.nested.threshold, 1.4);
        assert!(config.remains().is_empty());
        assert!(recorder.events().contains(&"created APP.sample AppSample".to_string()));
    }

    #[test]
    fn bind_map_of_enums_from_sub_view() {
        let config = hocon("logging {\n  level {\n    root = Info\n    net = Debug\n    db = Warn\n  }\n}\n");
        let levels = config.configuration("logging.level");
        assert_eq!(levels.size(), 3);
        assert_eq!(levels.property_names().collect::<Vec<_>>(), vec!["root", "net", "db"]);

        let map: IndexMap<String, Level> = config.bind("logging.level").unwrap();
        assert_eq!(map["net"], Level::Debug);
        let same: IndexMap<String, Level> = levels.bind("").unwrap();
        assert_eq!(map, same);
    }

    #[test]
    fn bind_leaf_and_missing() {
        let config = hocon("tags = a, b, c\n");
        let tags: Vec<String> = config.bind("tags").unwrap();
        assert_eq!(tags, vec!["a", "b", "c"]);
        let err = config.bind::<Vec<String>>("nothing").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound(_)));
    }

    #[test]
    fn append_overlays_and_resets_views() {
        let recorder = Arc::new(Recorder::default());
        let ctx = ParseContext::new().listener(Some(recorder.clone()));
        let store = parse("db {\n  user = ${vcap.user, nobody}\n  host = local\n}\n", Format::Hocon, &ctx).unwrap();
        let mut config = Configuration::new(store);
        assert_eq!(config.get_string("db.user").unwrap(), "nobody");
        let before = config.configuration("db");

        config.append([("vcap.user", "hoge"), ("db.host", "remote")]);
        assert_eq!(config.size(), 3);
        assert_eq!(config.get_string("db.user").unwrap(), "hoge");
        assert_eq!(config.get_string("db.host").unwrap(), "remote");
        assert!(config.remains().contains(&"vcap.user".to_string()));

        let after = config.configuration("db");
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.get_string("host").unwrap(), "remote");
        assert_eq!(before.raw("host"), Some("local"));
        assert!(recorder.events().contains(&"cached vcap.user=hoge false".to_string()));
    }

    #[test]
    fn append_keeps_read_state_of_existing_keys() {
        let mut config = hocon("db {\n  host = local\n  port = 5432\n}\n");
        config.get_string("db.host").unwrap();
        config.append([("db.host", "remote"), ("db.user", "admin")]);

        let remains = config.remains();
        assert!(!remains.contains(&"db.host".to_string()));
        assert!(remains.contains(&"db.user".to_string()));
        assert!(remains.contains(&"db.port".to_string()));
    }

    /// Reads the configuration it observes from inside the callback.
    #[derive(Default)]
    struct Reentrant {
        config: OnceLock<Weak<Configuration>>,
        sizes: Mutex<Vec<usize>>,
    }

    impl Listener for Reentrant {
        fn cached(&self, key: &str, _value: &str, configuration: bool) {
            if !configuration {
                return;
            }
            if let Some(config) = self.config.get().and_then(Weak::upgrade) {
                let view = config.configuration(key);
                self.sizes.lock().unwrap().push(view.size());
            }
        }
    }

    #[test]
    fn listener_may_read_the_configuration_it_observes() {
        let listener = Arc::new(Reentrant::default());
        let ctx = ParseContext::new().listener(Some(listener.clone()));
        let store = parse("db {\n  user = admin\n  host = local\n}\n", Format::Hocon, &ctx).unwrap();
        let config = Arc::new(Configuration::new(store));
        listener.config.set(Arc::downgrade(&config)).unwrap();

        let view = config.configuration("db");
        assert_eq!(view.size(), 2);
        assert_eq!(*listener.sizes.lock().unwrap(), vec![2]);
        assert!(Arc::ptr_eq(&view, &config.configuration("db")));
    }

    #[test]
    fn append_on_a_view_reaches_references() {
        let config = hocon("db {\n  user = admin\n}\nlabel = ${db.user}\n");
        let view = config.configuration("db");
        config.views.clear();
        let mut view = Arc::try_unwrap(view).unwrap();
        view.append([("user", "root")]);
        assert_eq!(view.get_string("user").unwrap(), "root");
        assert_eq!(config.get_string("label").unwrap(), "admin");
    }

    #[test]
    fn display_lists_raw_values() {
        let config = hocon("a = 1\nb {\n  c = ${a}\n}\n");
        assert_eq!(config.to_string(), "a = 1\nb.c = ${a}\n");
    }

    #[test]
    fn shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Configuration>();

        let config = Arc::new(load("reference.conf"));
        let views: Vec<Arc<Configuration>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let config = Arc::clone(&config);
                    s.spawn(move || {
                        config.get::<u32>("APP.sample.cost").unwrap();
                        config.configuration("APP.sample.nested")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(views.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(!config.remains().contains(&"APP.sample.cost".to_string()));
    }
}
