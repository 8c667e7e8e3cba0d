//! Locating and reading configuration resources.
//!
//! # Search roots
//!
//! Each [`SearchPath`] resolves to one concrete directory. Together the
//! resolved roots play the role of a classpath: a resource name is tried
//! against every root in list order and the **first** existing file wins.
//! Roots that cannot be resolved (no home directory, no working directory)
//! are skipped.
//!
//! # Include directives
//!
//! A HOCON `include` line names its target in one of three ways:
//!
//! - `classpath(name)` searched against the roots.
//! - `file(path)` relative to the directory of the including document, or
//!   used as-is when the including document has no directory (parsed from a
//!   string) or the path is absolute.
//! - `url(...)` with a `file://` URL (feature `url`) or an `http(s)://` URL
//!   (feature `http`).
//!
//! Any failure to locate or read an included resource is an
//! [`Include`](ConfigError::Include) error and aborts the parse.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::SearchPath;

/// A parsed `include` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeDirective {
    Classpath(String),
    File(String),
    Url(String),
}

impl IncludeDirective {
    /// Parse `kind(target)` as written after the `include` keyword.
    pub fn parse(raw: &str) -> Option<IncludeDirective> {
        let open = raw.find('(')?;
        let inner = raw[open + 1..].strip_suffix(')')?.trim();
        if inner.is_empty() {
            return None;
        }
        let target = inner.to_string();
        match &raw[..open] {
            "classpath" => Some(IncludeDirective::Classpath(target)),
            "file" => Some(IncludeDirective::File(target)),
            "url" => Some(IncludeDirective::Url(target)),
            _ => None,
        }
    }

    /// The resource name whose extension decides the included dialect.
    pub fn target(&self) -> &str {
        match self {
            IncludeDirective::Classpath(t) | IncludeDirective::File(t) | IncludeDirective::Url(t) => t,
        }
    }

    fn href(&self) -> String {
        match self {
            IncludeDirective::Classpath(t) => format!("classpath({t})"),
            IncludeDirective::File(t) => format!("file({t})"),
            IncludeDirective::Url(t) => format!("url({t})"),
        }
    }
}

/// The text of a loaded resource plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Name used for format detection and listener reports.
    pub name: String,
    pub text: String,
    /// Directory that relative `file(...)` includes inside this resource
    /// resolve against.
    pub dir: Option<PathBuf>,
}

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// `app_name` is used by `SearchPath::Platform` to construct the
/// platform-specific config directory (e.g. `~/.config/{app_name}/` on Linux).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Reads resources from the search roots, the filesystem and URLs.
#[derive(Debug, Clone, Default)]
pub struct ResourceLoader {
    roots: Vec<PathBuf>,
}

impl ResourceLoader {
    pub fn new(search_paths: &[SearchPath], app_name: &str) -> Self {
        let roots = search_paths
            .iter()
            .filter_map(|sp| resolve_search_path(sp, app_name))
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The first `{root}/{name}` that exists, in root order.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Read a file from disk into a [`Resource`].
    pub fn read_file(&self, path: &Path) -> Result<Resource, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Resource {
            name: path.to_string_lossy().into_owned(),
            text,
            dir: path.parent().map(Path::to_path_buf),
        })
    }

    /// Load the target of an `include` directive found in a document whose
    /// directory is `base_dir`.
    pub fn load(
        &self,
        directive: &IncludeDirective,
        base_dir: Option<&Path>,
    ) -> Result<Resource, ConfigError> {
        let fail = |reason: String| ConfigError::Include {
            href: directive.href(),
            reason,
        };
        let path = match directive {
            IncludeDirective::Classpath(name) => self
                .find(name)
                .ok_or_else(|| fail(format!("'{name}' not found in any search root")))?,
            IncludeDirective::File(name) => {
                let path = PathBuf::from(name);
                match base_dir {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path,
                }
            }
            IncludeDirective::Url(url) => return self.load_url(url).map_err(fail),
        };
        tracing::debug!(href = %directive.href(), path = %path.display(), "including resource");
        self.read_file(&path).map_err(|e| fail(e.to_string()))
    }

    fn load_url(&self, url: &str) -> Result<Resource, String> {
        if let Some(rest) = url.strip_prefix("file://") {
            return self.load_file_url(rest);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return fetch(url);
        }
        Err(format!("unsupported URL scheme in '{url}'"))
    }

    #[cfg(feature = "url")]
    fn load_file_url(&self, rest: &str) -> Result<Resource, String> {
        let decoded = percent_encoding::percent_decode_str(rest)
            .decode_utf8()
            .map_err(|e| e.to_string())?;
        self.read_file(Path::new(decoded.as_ref()))
            .map_err(|e| e.to_string())
    }

    #[cfg(not(feature = "url"))]
    fn load_file_url(&self, _rest: &str) -> Result<Resource, String> {
        Err("file:// includes require the `url` feature".to_string())
    }
}

#[cfg(feature = "http")]
fn fetch(url: &str) -> Result<Resource, String> {
    tracing::debug!(url, "fetching remote resource");
    let response = reqwest::blocking::get(url).map_err(|e| e.to_string())?;
    let response = response.error_for_status().map_err(|e| e.to_string())?;
    let text = response.text().map_err(|e| e.to_string())?;
    let path = url.split(['?', '#']).next().unwrap_or(url);
    Ok(Resource {
        name: path.to_string(),
        text,
        dir: None,
    })
}

#[cfg(not(feature = "http"))]
fn fetch(url: &str) -> Result<Resource, String> {
    Err(format!("cannot fetch '{url}': http includes require the `http` feature"))
}
