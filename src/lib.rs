//! Configuration documents in four dialects, flattened into one store, read
//! back as typed values.
//!
//! Polyconf parses HOCON-style, JSON-style, YAML-style and Java-properties
//! documents into a single ordered store of dotted keys, resolves `${...}`
//! references between entries when they are read, and converts string values
//! into any type that implements serde's `Deserialize`.
//!
//! ```ignore
//! let config = Polyconf::builder()
//!     .app_name("myapp")
//!     .load()?;
//! let port: u16 = config.get("server.port")?;
//! let db: DatabaseConfig = config.bind("database")?;
//! ```
//!
//! That call looks for `myapp.conf` in the working directory and then in the
//! platform config directory, parses it, and hands back a [`Configuration`].
//!
//! # One store, four dialects
//!
//! Every dialect flattens straight into dotted keys. These three documents
//! produce the same store:
//!
//! ```text
//! # HOCON                 # YAML                  # properties
//! app {                   app:                    app.sample.local = en-US
//!   sample {                sample:               app.sample.cost = 1080
//!     local = en-US           local: en-US
//!     cost = 1080             cost: 1080
//!   }
//! }
//! ```
//!
//! The dialect comes from the resource extension ([`Format::from_resource`]):
//! `.conf` or no extension is HOCON, `.json`, `.yml`/`.yaml` and
//! `.properties` pick the others. Values are kept exactly as written. A
//! reference stays `${setting.local}` in the store and a list stays its
//! joined text (`a, b, c`) until someone asks for a `Vec`.
//!
//! HOCON documents can pull in others with `include classpath(name)`,
//! `include file(path)` or `include url(...)`. An include at top level merges
//! the included keys as they are; an include inside `foo { ... }` prefixes
//! them with `foo.`. The "classpath" is the builder's list of
//! [`SearchPath`]s, tried in order.
//!
//! # References
//!
//! `${key}` is replaced by the value of `key`, `${key,default}` falls back to
//! the trimmed default, and references nest: `${${env}.url}` resolves `env`
//! first. Resolution happens on read, against the whole document, so a value
//! may refer to keys defined after it or to credentials appended later. A
//! reference to a missing key fails the read and a reference cycle is an
//! error rather than a hang.
//!
//! # Typed reads
//!
//! [`Configuration::get`] resolves and converts a single value. The converter
//! is lenient in the way configuration files need:
//!
//! - Booleans accept `true`/`yes`/`1` and `false`/`no`/`0`, any case.
//! - Lists, sets and arrays split the text on top-level commas, after
//!   stripping one pair of enclosing brackets; elements are trimmed and
//!   unquoted.
//! - Numbers convert between integer and float types.
//! - Enums match their variant names exactly.
//! - [`temporal`] types accept epoch milliseconds and ISO-8601 or
//!   `yyyy/MM/dd HH:mm` text.
//!
//! [`Configuration::bind`] builds a whole struct from the keys under a
//! prefix. Unknown keys are logged and ignored, and a field whose value does
//! not convert is logged and left at its `#[serde(default)]`, so one bad
//! entry does not take the whole section down.
//!
//! # Sub-views and auditing
//!
//! [`Configuration::configuration`] returns the keys under a prefix with the
//! prefix stripped. Views are cached: the same prefix returns the same
//! [`Arc`](std::sync::Arc). Every typed read marks its key as used, and
//! [`Configuration::remains`] lists the keys nobody read, which is a cheap way
//! to spot typos in a deployed file.
//!
//! # Service credentials
//!
//! [`VcapServices`] reads a Cloud Foundry style `VCAP_SERVICES` catalog and
//! appends each credential as `vcap.services.<name>.credentials.<key>`.
//! Documents then reference credentials like any other key:
//!
//! ```text
//! datasource.password = ${vcap.services.ups-db.credentials.password}
//! ```
//!
//! # JSON
//!
//! The [`json`] module is a separate, full tree codec: it parses JSON text
//! into [`Value`], writes any `Serialize` value as compact or pretty JSON,
//! and unmarshals text into typed values through the same binder.
//!
//! # Observing
//!
//! A [`Listener`] passed to the builder sees every property write, every
//! parsed document, every cached view and every bound object. [`Monitor`]
//! logs them through `tracing`. The library itself logs its decisions
//! (skipped fields, includes, unresolved references) at `debug` and `warn`
//! and never installs a subscriber.
//!
//! # Error handling
//!
//! All fallible operations return [`ConfigError`]. Parse errors carry the
//! line number, conversion errors carry the offending value and target type,
//! and [`ConfigError::kind`] sorts every error into lexical, structural,
//! resolution, conversion or binding failures.

pub mod error;
pub mod json;
pub mod temporal;
pub mod tokenizer;
pub mod tree;
pub mod types;

mod builder;
mod config;
mod convert;
mod listener;
mod mapper;
mod parser;
mod resolve;
mod resource;
mod store;
mod value;
mod vcap;

#[cfg(test)]
mod fixtures;

pub use builder::{Polyconf, PolyconfBuilder};
pub use config::Configuration;
pub use convert::{DeError, ValueDeserializer, convert, split_list};
pub use error::{ConfigError, ErrorKind};
pub use listener::{Listener, Monitor, StoreOp};
pub use mapper::bind;
pub use parser::{MAX_INCLUDE_DEPTH, ParseContext, parse, parse_str, render};
pub use resolve::{Environment, PropertySource, Resolver, Unresolved, resolve_env, resolve_with};
pub use resource::{IncludeDirective, Resource, ResourceLoader};
pub use store::PropertyStore;
pub use temporal::{Date, DateTime, Time, Timestamp};
pub use types::{Format, SearchPath};
pub use value::Value;
pub use vcap::{ENV_VCAP_SERVICES, NegatablePattern, VcapService, VcapServices};
