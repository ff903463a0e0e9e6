//! Replace-array deep merge.
//!
//! - Objects: merged key by key, recursively
//! - Arrays: the overlay's array replaces the base's entirely
//! - Scalars and null: the overlay wins

use serde_json::Value;

/// Deep-merges `overlay` into `base` and returns the result.
///
/// Keys present only in `base` are kept. When both sides hold an object
/// under the same key the merge recurses; in every other case the overlay's
/// value replaces the base's, including when both are arrays.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}
