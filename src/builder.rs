use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::ConfigError;
use crate::listener::Listener;
use crate::parser::{self, ParseContext};
use crate::resource::{Resource, ResourceLoader};
use crate::types::{Format, SearchPath};
use crate::vcap::VcapServices;

/// Entry point for loading a configuration document.
pub struct Polyconf;

impl Polyconf {
    pub fn builder() -> PolyconfBuilder {
        PolyconfBuilder::new()
    }
}

enum VcapSource {
    Text(String),
    Env,
}

/// Builder for locating, parsing and overlaying one configuration document.
///
/// - **Source**: [`resource()`](Self::resource) names a file, tried as a path
///   first and then against the search roots; [`source_str()`](Self::source_str)
///   supplies the text directly.
/// - **Dialect**: taken from the resource extension unless
///   [`format()`](Self::format) says otherwise.
/// - **Roots**: [`search_paths()`](Self::search_paths) act as the classpath
///   for the resource and for `include classpath(...)`. First match wins.
/// - **Credentials**: [`vcap_services()`](Self::vcap_services) overlays a
///   service catalog after parsing.
pub struct PolyconfBuilder {
    app_name: Option<String>,
    resource: Option<PathBuf>,
    source: Option<String>,
    format: Option<Format>,
    search_paths: Option<Vec<SearchPath>>,
    listener: Option<Arc<dyn Listener>>,
    vcap: Option<VcapSource>,
}

impl PolyconfBuilder {
    fn new() -> Self {
        Self {
            app_name: None,
            resource: None,
            source: None,
            format: None,
            search_paths: None,
            listener: None,
            vcap: None,
        }
    }

    /// Set the application name. This derives defaults:
    /// - `resource` → `"{app_name}.conf"`
    /// - `search_paths` → `[Cwd, Platform]`
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// The document to load: a file path, or a name looked up in the search roots.
    pub fn resource(mut self, resource: impl Into<PathBuf>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Parse `text` instead of reading a resource. Relative `file(...)`
    /// includes resolve against the working directory.
    pub fn source_str(mut self, text: &str) -> Self {
        self.source = Some(text.to_string());
        self
    }

    /// Force the dialect instead of detecting it from the resource extension.
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Replace the default search paths entirely.
    ///
    /// Paths are tried in order and the first root holding the resource wins.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path without replacing the defaults.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        let defaults = self.effective_search_paths();
        self.search_paths.get_or_insert(defaults).push(path);
        self
    }

    /// Observe every property write, parse and sub-view.
    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Overlay the credentials of this service catalog after parsing.
    pub fn vcap_services(mut self, json: &str) -> Self {
        self.vcap = Some(VcapSource::Text(json.to_string()));
        self
    }

    /// Overlay the catalog in `VCAP_SERVICES`, if the variable is set.
    pub fn vcap_services_from_env(mut self) -> Self {
        self.vcap = Some(VcapSource::Env);
        self
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        if let Some(paths) = &self.search_paths {
            return paths.clone();
        }
        match self.app_name {
            Some(_) => vec![SearchPath::Cwd, SearchPath::Platform],
            None => vec![SearchPath::Cwd],
        }
    }

    fn effective_resource(&self) -> Result<PathBuf, ConfigError> {
        if let Some(resource) = &self.resource {
            return Ok(resource.clone());
        }
        let app = self.app_name.as_deref().ok_or(ConfigError::NoSource)?;
        Ok(PathBuf::from(format!("{app}.conf")))
    }

    fn read_source(&self, loader: &ResourceLoader) -> Result<Resource, ConfigError> {
        if let Some(text) = &self.source {
            return Ok(Resource {
                name: "<inline>".to_string(),
                text: text.clone(),
                dir: None,
            });
        }
        let resource = self.effective_resource()?;
        if resource.is_file() {
            return loader.read_file(&resource);
        }
        let name = resource.to_string_lossy();
        match loader.find(&name) {
            Some(path) => loader.read_file(&path),
            None => Err(ConfigError::Io {
                path: resource.clone(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("not a file and not found in {} search root(s)", loader.roots().len()),
                ),
            }),
        }
    }

    fn catalog(&self) -> Result<Option<VcapServices>, ConfigError> {
        match &self.vcap {
            Some(VcapSource::Text(json)) => VcapServices::parse(json).map(Some),
            Some(VcapSource::Env) => VcapServices::from_env(),
            None => Ok(None),
        }
    }

    /// Locate, parse and overlay the configuration.
    pub fn load(self) -> Result<Configuration, ConfigError> {
        let app_name = self.app_name.as_deref().unwrap_or_default();
        let loader = ResourceLoader::new(&self.effective_search_paths(), app_name);
        let resource = self.read_source(&loader)?;
        let format = match self.format {
            Some(format) => format,
            None => Format::from_resource(&resource.name)?,
        };
        tracing::debug!(resource = %resource.name, %format, "loading configuration");

        let ctx = ParseContext::new()
            .listener(self.listener.clone())
            .loader(loader)
            .source(resource.name.clone(), resource.dir.clone());
        let store = parser::parse(&resource.text, format, &ctx)?;
        let mut config = Configuration::new(store);

        if let Some(catalog) = self.catalog()? {
            catalog.apply(&mut config);
        }
        Ok(config)
    }
}
