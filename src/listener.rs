//! Observation hooks for parsing, caching and binding.
//!
//! A [`Listener`] is handed to the builder (or directly to a parse call) and
//! is told about every store write, every completed parse, every cached
//! sub-view or overlaid value, and every object bound from configuration.
//! Nothing in the engine depends on a listener being present; the hooks exist
//! for auditing and diagnostics. [`Monitor`] is the stock implementation and
//! reports everything through `tracing`.

use std::any::Any;
use std::fmt;

use tracing::Level;

use crate::types::Format;

/// The kind of write performed on a property store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// A single key was set.
    Set,
    /// A batch of keys was merged in; the reported key is the batch size.
    InsertAll,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Set => write!(f, "set"),
            StoreOp::InsertAll => write!(f, "insert_all"),
        }
    }
}

/// Receives notifications from the parsers, the property store and the
/// configuration facade. Every method has an empty default.
pub trait Listener: Send + Sync {
    /// A property store was written to.
    fn property(&self, _op: StoreOp, _key: &str, _value: Option<&str>) {}

    /// A document was parsed into `count` properties.
    fn parsed(&self, _source: &str, _format: Format, _count: usize) {}

    /// A value was cached or overlaid. `configuration` is true when the value
    /// is a whole sub-view rather than a single leaf.
    fn cached(&self, _key: &str, _value: &str, _configuration: bool) {}

    /// A structured object was bound from the configuration under `key`.
    fn created(&self, _key: &str, _type_name: &str, _instance: &dyn Any) {}
}

/// A [`Listener`] that logs every notification through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    level: Level,
}

impl Monitor {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        match self.level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            Level::TRACE => tracing::trace!("{}", message),
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl Listener for Monitor {
    fn property(&self, op: StoreOp, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.log(format_args!("[BOOT] properties.{op}('{key}','{value}')")),
            None => self.log(format_args!("[BOOT] properties.{op}('{key}')")),
        }
    }

    fn parsed(&self, source: &str, format: Format, count: usize) {
        self.log(format_args!(
            "[BOOT] parsed {count} properties from '{source}' as {format}"
        ));
    }

    fn cached(&self, key: &str, value: &str, configuration: bool) {
        if configuration {
            self.log(format_args!("[BOOT] cached configuration '{key}'"));
        } else {
            self.log(format_args!("[BOOT] cached '{key}' = '{value}'"));
        }
    }

    fn created(&self, key: &str, type_name: &str, _instance: &dyn Any) {
        self.log(format_args!("[BOOT] created {type_name} from '{key}'"));
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Records every notification as a line of text, for assertions.
    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<String>>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Listener for Recorder {
        fn property(&self, op: StoreOp, key: &str, value: Option<&str>) {
            self.push(format!("{op} {key}={}", value.unwrap_or("")));
        }

        fn parsed(&self, source: &str, format: Format, count: usize) {
            self.push(format!("parsed {source} {format} {count}"));
        }

        fn cached(&self, key: &str, value: &str, configuration: bool) {
            self.push(format!("cached {key}={value} {configuration}"));
        }

        fn created(&self, key: &str, type_name: &str, _instance: &dyn Any) {
            self.push(format!("created {key} {type_name}"));
        }
    }
}
