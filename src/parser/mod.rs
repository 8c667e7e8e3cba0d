//! The four dialect parsers and their renderers.
//!
//! Every parser flattens its input straight into a [`PropertyStore`] of
//! dotted keys. Values are stored as written: `${...}` references are kept
//! verbatim and list-like values stay joined text, to be recovered by the
//! converter on demand.
//!
//! Lexical and structural errors abort the whole parse; no partial store is
//! returned.

mod hocon;
mod json;
mod properties;
mod render;
mod yaml;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::listener::Listener;
use crate::resource::{IncludeDirective, ResourceLoader};
use crate::store::PropertyStore;
use crate::types::Format;

pub use render::render;

/// Maximum nesting of `include` directives.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Everything a parse needs besides the text itself.
#[derive(Clone, Default)]
pub struct ParseContext {
    listener: Option<Arc<dyn Listener>>,
    loader: ResourceLoader,
    source: String,
    base_dir: Option<PathBuf>,
    depth: usize,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(mut self, listener: Option<Arc<dyn Listener>>) -> Self {
        self.listener = listener;
        self
    }

    pub fn loader(mut self, loader: ResourceLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Name the document being parsed and the directory its relative
    /// `file(...)` includes resolve against.
    pub fn source(mut self, name: impl Into<String>, base_dir: Option<PathBuf>) -> Self {
        self.source = name.into();
        self.base_dir = base_dir;
        self
    }

    pub(crate) fn new_store(&self) -> PropertyStore {
        PropertyStore::with_listener(self.listener.clone())
    }

    /// Load and parse the target of an `include` directive.
    pub(crate) fn include(&self, directive: &IncludeDirective) -> Result<PropertyStore, ConfigError> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(ConfigError::Include {
                href: directive.target().to_string(),
                reason: format!("includes nested deeper than {MAX_INCLUDE_DEPTH}"),
            });
        }
        let resource = self.loader.load(directive, self.base_dir.as_deref())?;
        let format = Format::from_resource(&resource.name)?;
        let nested = ParseContext {
            listener: self.listener.clone(),
            loader: self.loader.clone(),
            source: resource.name.clone(),
            base_dir: resource.dir.clone(),
            depth: self.depth + 1,
        };
        parse(&resource.text, format, &nested)
    }
}

/// Parse `text` in the given dialect.
pub fn parse(text: &str, format: Format, ctx: &ParseContext) -> Result<PropertyStore, ConfigError> {
    let store = match format {
        Format::Hocon => hocon::parse(text, ctx)?,
        Format::Json => json::parse(text, ctx)?,
        Format::Yaml => yaml::parse(text, ctx)?,
        Format::Properties => properties::parse(text, ctx)?,
    };
    tracing::debug!(source = %ctx.source, %format, count = store.len(), "parsed properties");
    if let Some(listener) = &ctx.listener {
        listener.parsed(&ctx.source, format, store.len());
    }
    Ok(store)
}

/// Parse `text` with no listener, no search roots and no base directory.
pub fn parse_str(text: &str, format: Format) -> Result<PropertyStore, ConfigError> {
    parse(text, format, &ParseContext::new())
}

/// Join the open scopes and a local key into a dotted key, skipping
/// anonymous scopes.
pub(crate) fn dotted_key(parents: &[String], key: &str) -> String {
    let mut out = String::new();
    for segment in parents.iter().map(String::as_str).chain([key]) {
        if segment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}
