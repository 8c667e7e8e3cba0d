//! Cloud Foundry style service catalogs (`VCAP_SERVICES`).
//!
//! The catalog is a JSON object mapping a service type to a list of bound
//! service instances:
//!
//! ```json
//! {"user-provided": [{"name": "ups-tiny", "label": "user-provided",
//!                     "credentials": {"cf_username": "hoge"}}]}
//! ```
//!
//! Instances are indexed by their unique name and by type. Their
//! credentials flatten to `vcap.services.<name>.credentials.<key>`
//! properties, which [`VcapServices::apply`] overlays onto a
//! [`Configuration`] so documents can reference them:
//!
//! ```text
//! datasource.username = ${vcap.services.ups-tiny.credentials.cf_username}
//! ```

use std::env::VarError;
use std::str::FromStr;

use indexmap::IndexMap;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::ConfigError;
use crate::json;
use crate::mapper;
use crate::resolve::resolve_env;
use crate::tree;
use crate::value::Value;

/// Environment variable holding the catalog.
pub const ENV_VCAP_SERVICES: &str = "VCAP_SERVICES";

/// One bound service instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcapService {
    /// The catalog key this instance was listed under.
    #[serde(skip)]
    pub service_type: String,
    pub name: String,
    pub label: String,
    pub plan: Option<String>,
    pub provider: Option<String>,
    pub tags: Vec<String>,
    pub credentials: IndexMap<String, Value>,
}

impl VcapService {
    /// A credential as property text; numbers and booleans are written as
    /// JSON, nested objects as compact JSON.
    pub fn credential(&self, key: &str) -> Option<String> {
        self.credentials.get(key).map(Value::to_property)
    }

    /// Credentials as dotted keys, nested objects flattened.
    pub fn flat_credentials(&self) -> Vec<(String, String)> {
        tree::flatten(&Value::Map(self.credentials.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct VcapServices {
    services: Vec<VcapService>,
    by_name: IndexMap<String, usize>,
    by_type: IndexMap<String, Vec<usize>>,
}

impl VcapServices {
    /// Parse a catalog document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::InvalidCatalog("empty document".into()));
        }
        let tree = json::parse(text).map_err(|e| ConfigError::InvalidCatalog(e.to_string()))?;
        let Value::Map(types) = tree else {
            return Err(ConfigError::InvalidCatalog(format!(
                "expected an object of service types, found {}",
                tree.type_name()
            )));
        };
        if types.is_empty() {
            return Err(ConfigError::InvalidCatalog("no service types".into()));
        }

        let mut catalog = VcapServices::default();
        for (service_type, entries) in types {
            let Value::List(entries) = entries else {
                return Err(ConfigError::InvalidCatalog(format!(
                    "'{service_type}' must list its services, found {}",
                    entries.type_name()
                )));
            };
            for (i, entry) in entries.into_iter().enumerate() {
                let mut service: VcapService = mapper::bind(entry).map_err(|e| {
                    ConfigError::InvalidCatalog(format!("{service_type}[{i}]: {e}"))
                })?;
                service.service_type = service_type.clone();
                catalog.insert(service);
            }
        }
        tracing::debug!(
            services = catalog.len(),
            types = catalog.by_type.len(),
            "parsed service catalog"
        );
        Ok(catalog)
    }

    /// Read the catalog from `VCAP_SERVICES`. `None` when the variable is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(ENV_VCAP_SERVICES) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(VarError::NotPresent) => {
                tracing::debug!(var = ENV_VCAP_SERVICES, "no service catalog in environment");
                Ok(None)
            }
            Err(err @ VarError::NotUnicode(_)) => Err(catalog_var_error(err)),
        }
    }

    fn insert(&mut self, service: VcapService) {
        let index = self.services.len();
        if let Some(previous) = self.by_name.insert(service.name.clone(), index) {
            tracing::warn!(name = %service.name, previous, "duplicate service name, later entry wins");
        }
        self.by_type
            .entry(service.service_type.clone())
            .or_default()
            .push(index);
        self.services.push(service);
    }

    /// Number of distinct service names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn service(&self, name: &str) -> Option<&VcapService> {
        self.by_name.get(name).map(|&i| &self.services[i])
    }

    /// Every instance listed under `service_type`, in catalog order.
    pub fn by_type(&self, service_type: &str) -> Vec<&VcapService> {
        self.by_type
            .get(service_type)
            .map(|indexes| indexes.iter().map(|&i| &self.services[i]).collect())
            .unwrap_or_default()
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }

    pub fn credentials(&self, name: &str) -> Option<&IndexMap<String, Value>> {
        self.service(name).map(|s| &s.credentials)
    }

    /// Instances whose service type matches `pattern`.
    pub fn matching(&self, pattern: &NegatablePattern) -> Vec<&VcapService> {
        self.by_type
            .iter()
            .filter(|(service_type, _)| pattern.matches(service_type))
            .flat_map(|(_, indexes)| indexes.iter().map(|&i| &self.services[i]))
            .collect()
    }

    /// Every credential as `vcap.services.<name>.credentials.<key>`.
    pub fn all_credentials(&self) -> Vec<(String, String)> {
        self.by_name
            .values()
            .map(|&i| &self.services[i])
            .flat_map(|service| {
                service
                    .flat_credentials()
                    .into_iter()
                    .map(move |(key, value)| {
                        (format!("vcap.services.{}.credentials.{key}", service.name), value)
                    })
            })
            .collect()
    }

    /// Overlay every credential onto `config`.
    pub fn apply(&self, config: &mut Configuration) {
        let credentials = self.all_credentials();
        tracing::debug!(count = credentials.len(), "applying service credentials");
        config.append(credentials);
    }
}

fn catalog_var_error(err: VarError) -> ConfigError {
    ConfigError::InvalidCatalog(format!("{ENV_VCAP_SERVICES}: {err}"))
}

impl FromStr for VcapServices {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// A literal or `/regex/` match, negated by a leading `!`.
///
/// The pattern text first goes through environment substitution, so
/// `${SERVICE_TYPE,/^postgres.*/}` is allowed. Regexes must match the whole
/// input.
#[derive(Debug, Clone)]
pub struct NegatablePattern {
    matcher: Matcher,
    negated: bool,
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

impl NegatablePattern {
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        let resolved = resolve_env(raw)?;
        let (negated, body) = match resolved.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, resolved.as_str()),
        };
        let matcher = match body.strip_prefix('/').and_then(|b| b.strip_suffix('/')) {
            Some(expr) => {
                let regex = Regex::new(&format!("^(?:{expr})$")).map_err(|e| {
                    ConfigError::Conversion {
                        value: body.to_string(),
                        target: "NegatablePattern".into(),
                        reason: e.to_string(),
                    }
                })?;
                Matcher::Regex(regex)
            }
            None => Matcher::Literal(body.to_string()),
        };
        Ok(Self { matcher, negated })
    }

    pub fn matches(&self, input: &str) -> bool {
        let hit = match &self.matcher {
            Matcher::Literal(text) => text == input,
            Matcher::Regex(regex) => regex.is_match(input),
        };
        hit != self.negated
    }
}

impl FromStr for NegatablePattern {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw)
    }
}
