use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

/// The four configuration dialects understood by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Brace-nested `key = value` documents with `include` directives.
    #[default]
    Hocon,
    /// Brace-nested `key : value,` documents shaped like JSON.
    Json,
    /// Indentation-nested `key: value` documents with hyphen lists.
    Yaml,
    /// Flat `key=value` lines.
    Properties,
}

impl Format {
    /// Pick the dialect from a resource name's extension.
    ///
    /// `.conf` and extension-less names are HOCON; `.json`, `.yml`/`.yaml`
    /// and `.properties` map to their dialects. Anything else is rejected.
    pub fn from_resource(resource: &str) -> Result<Format, ConfigError> {
        let file_name = resource.rsplit(['/', '\\']).next().unwrap_or(resource);
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return Ok(Format::Hocon);
        };
        match ext.to_ascii_lowercase().as_str() {
            "conf" | "hocon" => Ok(Format::Hocon),
            "json" => Ok(Format::Json),
            "yml" | "yaml" => Ok(Format::Yaml),
            "properties" => Ok(Format::Properties),
            _ => Err(ConfigError::UnsupportedFormat(resource.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Hocon => write!(f, "hocon"),
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
            Format::Properties => write!(f, "properties"),
        }
    }
}

/// A root directory searched for resources named by `include classpath(...)`
/// and by builder resources that are not direct file paths.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory for the builder's app name
    /// (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit directory.
    Path(PathBuf),
}
