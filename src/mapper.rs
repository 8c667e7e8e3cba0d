//! Binding value trees onto typed targets.
//!
//! Keys with no matching field are reported by `serde_ignored` and logged.
//! A field whose value fails to convert is logged, removed from the source
//! tree, and binding is retried, so the field keeps its `#[serde(default)]`.
//! Only a failure that cannot be pinned to a named field (a missing required
//! field, a top-level type mismatch) aborts the bind.

use serde::de::DeserializeOwned;

use crate::convert::{ValueDeserializer, display_path, short_type_name};
use crate::error::ConfigError;
use crate::value::Value;

/// Bind `source` onto `T`.
pub fn bind<T: DeserializeOwned>(source: Value) -> Result<T, ConfigError> {
    let ty = short_type_name::<T>();
    let mut source = source;
    loop {
        let mut unknown: Vec<String> = Vec::new();
        let result: Result<T, _> =
            serde_ignored::deserialize(ValueDeserializer::new(source.clone()), |path| {
                unknown.push(path.to_string());
            });

        let err = match result {
            Ok(bound) => {
                for key in unknown {
                    tracing::debug!(ty = %ty, key = %key, "ignoring key with no matching field");
                }
                return Ok(bound);
            }
            Err(err) => err,
        };

        let Some(field) = err.field_path().map(<[_]>::to_vec) else {
            return Err(err.into_binding(&ty));
        };
        if !source.remove_path(&field) {
            return Err(err.into_binding(&ty));
        }
        tracing::warn!(
            ty = %ty,
            field = %display_path(&field),
            error = %err.message(),
            "skipping field that failed to bind"
        );
    }
}
