//! Loading configurations whose file entries override the defaults.

pub use crate::error::Error;
pub use burn::config::Config;

use serde_json::Value;
use std::{fs, path::Path};

/// Checking a configuration once before it is used.
pub trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

/// Reading the JSON file at `path` and merging its entries over
/// `C::default()`.
///
/// Nested objects are merged key by key, other values are replaced.
pub fn load_with_overrides<C: Config + Default + Validate>(
    path: impl AsRef<Path>
) -> Result<C, Error> {
    let overrides = serde_json::from_str(&fs::read_to_string(path)?)?;
    let config = merge_with_defaults::<C>(overrides)?;
    config.validate()?;

    #[cfg(all(debug_assertions, not(test)))]
    log::debug!(target: "textmesh::trainer::config", "load_with_overrides");

    Ok(config)
}

/// Deserializing `overrides` on top of the serialized defaults of `C`.
pub fn merge_with_defaults<C: Config + Default>(
    overrides: Value
) -> Result<C, Error> {
    let defaults = serde_json::to_value(C::default())?;
    Ok(serde_json::from_value(merge_json(defaults, overrides))?)
}

/// Merging `overrides` into `base` recursively.
pub fn merge_json(
    base: Value,
    overrides: Value,
) -> Value {
    match (base, overrides) {
        (Value::Object(mut base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let merged = match base.remove(&key) {
                    Some(previous) => merge_json(previous, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        },
        (Value::Object(base), Value::Null) => Value::Object(base),
        (_, overrides) => overrides,
    }
}
