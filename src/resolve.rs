//! `${...}` reference expansion.
//!
//! A reference is `${key}` or `${key,default}`. References nest: the text
//! inside the braces is expanded first, then split on its first comma into a
//! key and a trimmed default, and the key is looked up in a
//! [`PropertySource`]. A found value is expanded again, so references may
//! chain. A key that reappears while its own value is being expanded is a
//! [`ReferenceCycle`](ConfigError::ReferenceCycle).
//!
//! What happens to a missing key without a default depends on
//! [`Unresolved`]: the configuration facade fails, while the standalone
//! helpers keep the reference text as written. An unterminated `${` is plain
//! text.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::BuildHasher;

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::store::PropertyStore;

/// Anything references can be looked up in.
pub trait PropertySource {
    fn property(&self, key: &str) -> Option<Cow<'_, str>>;
}

impl PropertySource for PropertyStore {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(Cow::Borrowed)
    }
}

impl<S: BuildHasher> PropertySource for IndexMap<String, String, S> {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl<S: BuildHasher> PropertySource for HashMap<String, String, S> {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl<T: PropertySource + ?Sized> PropertySource for &T {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        (**self).property(key)
    }
}

/// Look keys up in the first source, then the second.
impl<A: PropertySource, B: PropertySource> PropertySource for (A, B) {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        self.0.property(key).or_else(|| self.1.property(key))
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl PropertySource for Environment {
    fn property(&self, key: &str) -> Option<Cow<'_, str>> {
        std::env::var(key).ok().map(Cow::Owned)
    }
}

/// What to do with a reference whose key is missing and has no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// Leave `${...}` in the output.
    Keep,
    /// Fail with [`ConfigError::UnresolvedReference`].
    Fail,
}

pub struct Resolver<'s, S: PropertySource + ?Sized> {
    source: &'s S,
    policy: Unresolved,
}

impl<'s, S: PropertySource + ?Sized> Resolver<'s, S> {
    pub fn new(source: &'s S, policy: Unresolved) -> Self {
        Self { source, policy }
    }

    /// Expand every reference in `text`.
    pub fn resolve(&self, text: &str) -> Result<String, ConfigError> {
        self.expand(text, &mut Expansion::default())
    }

    /// Look up `key` and expand its value. `None` when the key is absent.
    pub fn resolve_key(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let Some(raw) = self.source.property(key) else {
            return Ok(None);
        };
        let mut state = Expansion::default();
        state.chain.push(key.to_string());
        self.expand(&raw, &mut state).map(Some)
    }

    fn expand(&self, text: &str, state: &mut Expansion) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let Some(end) = closing_brace(body) else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            out.push_str(&self.reference(&body[..end], state)?);
            rest = &body[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn reference(&self, body: &str, state: &mut Expansion) -> Result<String, ConfigError> {
        let inner = self.expand(body, state)?;
        let (key, default) = match inner.split_once(',') {
            Some((key, default)) => (key.trim(), Some(default.trim())),
            None => (inner.trim(), None),
        };

        if state.chain.iter().any(|k| k == key) {
            return Err(ConfigError::ReferenceCycle {
                key: key.to_string(),
            });
        }
        if let Some(done) = state.done.get(key) {
            return Ok(done.clone());
        }

        if let Some(raw) = self.source.property(key) {
            state.chain.push(key.to_string());
            let expanded = self.expand(&raw, state);
            state.chain.pop();
            let expanded = expanded?;
            state.done.insert(key.to_string(), expanded.clone());
            return Ok(expanded);
        }

        match (default, self.policy) {
            (Some(default), _) => Ok(default.to_string()),
            (None, Unresolved::Keep) => {
                tracing::debug!(reference = key, "leaving unresolved reference");
                Ok(format!("${{{inner}}}"))
            }
            (None, Unresolved::Fail) => Err(ConfigError::UnresolvedReference {
                reference: key.to_string(),
            }),
        }
    }
}

/// State of one top-level expansion: the keys being expanded, innermost
/// last, and the keys already fully expanded. A key that expanded once
/// cannot reach any key still on the chain, so its result is reused.
#[derive(Default)]
struct Expansion {
    chain: Vec<String>,
    done: HashMap<String, String>,
}

/// Byte offset of the `}` closing a reference body, skipping nested `${...}`.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '$' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                depth += 1;
            }
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Expand references against `source`, leaving unresolvable ones in place.
pub fn resolve_with<S: PropertySource + ?Sized>(
    text: &str,
    source: &S,
) -> Result<String, ConfigError> {
    Resolver::new(source, Unresolved::Keep).resolve(text)
}

/// Expand references against the process environment, leaving unresolvable
/// ones in place.
pub fn resolve_env(text: &str) -> Result<String, ConfigError> {
    resolve_with(text, &Environment)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn store() -> PropertyStore {
        [("a.b", "d"), ("x.y", "c"), ("d.c", "Hello")]
            .into_iter()
            .collect()
    }

    #[test]
    fn nested_reference_resolves_innermost_first() {
        let store = store();
        let resolver = Resolver::new(&store, Unresolved::Fail);
        assert_eq!(resolver.resolve("${${a.b}.${x.y}}").unwrap(), "Hello");
    }

    #[test]
    fn default_used_when_key_missing() {
        let store = store();
        let resolver = Resolver::new(&store, Unresolved::Fail);
        assert_eq!(resolver.resolve("${unknown,ABC}").unwrap(), "ABC");
        assert_eq!(resolver.resolve("${unknown,  spaced out  }").unwrap(), "spaced out");
        assert_eq!(resolver.resolve("${a.b,ignored}").unwrap(), "d");
    }

    #[test]
    fn references_inside_text() {
        let store = store();
        let resolver = Resolver::new(&store, Unresolved::Fail);
        assert_eq!(resolver.resolve("${a.b} is not ${x.y}").unwrap(), "d is not c");
    }

    #[test]
    fn values_resolve_transitively() {
        let store: PropertyStore = [("a", "${b}!"), ("b", "${c}"), ("c", "end")]
            .into_iter()
            .collect();
        let resolver = Resolver::new(&store, Unresolved::Fail);
        assert_eq!(resolver.resolve_key("a").unwrap().as_deref(), Some("end!"));
        assert_eq!(resolver.resolve_key("missing").unwrap(), None);
    }

    #[test]
    fn cycle_is_an_error() {
        let store: PropertyStore = [("a", "${b}"), ("b", "x ${a}")].into_iter().collect();
        let resolver = Resolver::new(&store, Unresolved::Keep);
        let err = resolver.resolve("${a}").unwrap_err();
        assert!(matches!(err, ConfigError::ReferenceCycle { ref key } if key == "a"));
        let err = resolver.resolve_key("b").unwrap_err();
        assert!(matches!(err, ConfigError::ReferenceCycle { ref key } if key == "b"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let store: PropertyStore = [("a", "${a}")].into_iter().collect();
        assert!(resolve_with("${a}", &store).is_err());
    }

    #[test]
    fn missing_reference_policy() {
        let store = store();
        assert_eq!(
            resolve_with("x=${nope} y=${a.b}", &store).unwrap(),
            "x=${nope} y=d"
        );
        let err = Resolver::new(&store, Unresolved::Fail)
            .resolve("${nope}")
            .unwrap_err();
        assert_eq!(err.to_string(), "Unresolved reference '${nope}'");
    }

    #[test]
    fn unterminated_reference_is_literal() {
        let store = store();
        assert_eq!(resolve_with("${a.b} and ${x.y", &store).unwrap(), "d and ${x.y");
    }

    #[test]
    fn repeated_reference_is_not_a_cycle() {
        let store = store();
        assert_eq!(resolve_with("${a.b}${a.b}", &store).unwrap(), "dd");
    }

    /// Counts lookups so repeated expansion of a key shows up.
    struct Counting<'a> {
        store: &'a PropertyStore,
        lookups: Cell<usize>,
    }

    impl PropertySource for Counting<'_> {
        fn property(&self, key: &str) -> Option<Cow<'_, str>> {
            self.lookups.set(self.lookups.get() + 1);
            self.store.property(key)
        }
    }

    #[test]
    fn doubling_chain_expands_each_key_once() {
        let levels = 40;
        let mut store = PropertyStore::new();
        store.set("a0", "x");
        for n in 1..=levels {
            store.set(format!("a{n}"), format!("${{a{m}}}-${{a{m}}}", m = n - 1));
        }
        store.set("small", "${a3}");
        let source = Counting {
            store: &store,
            lookups: Cell::new(0),
        };
        let resolver = Resolver::new(&source, Unresolved::Fail);

        assert_eq!(resolver.resolve_key("small").unwrap().as_deref(), Some("x-x-x-x-x-x-x-x"));
        source.lookups.set(0);
        let out = resolver.resolve("${a20}").unwrap();
        assert_eq!(out.len(), 2 * (1 << 20) - 1);
        assert!(source.lookups.get() <= 21, "{} lookups", source.lookups.get());
    }

    #[test]
    fn cycle_behind_a_resolved_key_is_still_found() {
        let store: PropertyStore = [("ok", "fine"), ("a", "${ok} ${b}"), ("b", "${ok} ${a}")]
            .into_iter()
            .collect();
        let err = Resolver::new(&store, Unresolved::Fail).resolve("${ok}${a}").unwrap_err();
        assert!(matches!(err, ConfigError::ReferenceCycle { ref key } if key == "a"));
    }

    #[test]
    fn chained_sources() {
        let mut overrides = HashMap::new();
        overrides.insert("a.b".to_string(), "override".to_string());
        let store = store();
        let chain = (&overrides, &store);
        assert_eq!(resolve_with("${a.b}/${x.y}", &chain).unwrap(), "override/c");
    }

    #[test]
    fn environment_source() {
        let path = std::env::var("PATH").unwrap();
        assert_eq!(resolve_env("${PATH}").unwrap(), path);
        assert_eq!(
            resolve_env("${POLYCONF_SURELY_UNSET_VAR,fallback}").unwrap(),
            "fallback"
        );
    }
}
