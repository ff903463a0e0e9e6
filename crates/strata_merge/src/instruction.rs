//! Instruction-script overlays.
//!
//! An overlay whose only top-level key is `$instructions` is not merged as
//! data. Its value is a list of edits, each tagged by `op` and addressed by a
//! JSON Pointer (RFC 6901) `path`:
//!
//! ```json
//! { "$instructions": [
//!     { "op": "set",    "path": "/sword/damage", "value": 6 },
//!     { "op": "remove", "path": "/sword/legacy" },
//!     { "op": "append", "path": "/sword/tags",   "value": "rare" },
//!     { "op": "insert", "path": "/sword/tags/0", "value": "first" },
//!     { "op": "merge",  "path": "/sword",        "value": { "weight": 2 } },
//!     { "op": "test",   "path": "/sword/kind",   "value": "blade" }
//! ] }
//! ```
//!
//! A script is all-or-nothing: it runs against a copy of the document and
//! the copy replaces the original only if every instruction succeeded.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApplyError;
use crate::merge::deep_merge;

/// Top-level key that marks an overlay as an instruction script.
pub const INSTRUCTIONS_KEY: &str = "$instructions";

/// A single edit in an instruction script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Instruction {
    /// Creates or replaces the value at `path`. On arrays the last token is
    /// an existing index, or `-` to append.
    Set {
        /// Target pointer.
        path: String,
        /// New value.
        value: Value,
    },
    /// Removes the existing value at `path`.
    Remove {
        /// Target pointer.
        path: String,
    },
    /// Pushes `value` onto the array at `path`.
    Append {
        /// Pointer to an array.
        path: String,
        /// Element to push.
        value: Value,
    },
    /// Inserts `value` into an array before the index named by the last token.
    Insert {
        /// Pointer ending in an array index in `0..=len`.
        path: String,
        /// Element to insert.
        value: Value,
    },
    /// Deep-merges `value` into the value at `path` (arrays replaced).
    Merge {
        /// Target pointer.
        path: String,
        /// Overlay to merge.
        value: Value,
    },
    /// Fails the script unless the value at `path` equals `value`.
    Test {
        /// Target pointer.
        path: String,
        /// Expected value.
        value: Value,
    },
}

/// Returns `true` if `overlay` is an instruction script rather than data.
pub fn is_instruction_document(overlay: &Value) -> bool {
    match overlay.as_object() {
        Some(map) => map.len() == 1 && map.get(INSTRUCTIONS_KEY).is_some_and(Value::is_array),
        None => false,
    }
}

/// Runs the instruction script `script` against `document`.
///
/// Either every instruction is applied or `document` is left unchanged.
pub fn apply_instructions(document: &mut Value, script: &Value) -> Result<(), ApplyError> {
    let list = script
        .get(INSTRUCTIONS_KEY)
        .ok_or_else(|| ApplyError::Malformed {
            reason: format!("missing '{INSTRUCTIONS_KEY}' key"),
        })?;
    let instructions: Vec<Instruction> =
        serde_json::from_value(list.clone()).map_err(|e| ApplyError::Malformed {
            reason: e.to_string(),
        })?;

    let mut working = document.clone();
    for instruction in &instructions {
        instruction.apply(&mut working)?;
    }
    *document = working;
    Ok(())
}

impl Instruction {
    /// Applies this single instruction to `document` in place.
    ///
    /// A failing instruction may leave `document` partially edited; callers
    /// wanting atomicity go through [`apply_instructions`].
    pub fn apply(&self, document: &mut Value) -> Result<(), ApplyError> {
        match self {
            Self::Set { path, value } => {
                let Some((parent, token)) = split_last(path)? else {
                    *document = value.clone();
                    return Ok(());
                };
                match resolve_mut(document, parent)? {
                    Value::Object(map) => {
                        map.insert(token, value.clone());
                    }
                    Value::Array(items) if token == "-" => items.push(value.clone()),
                    Value::Array(items) => {
                        let index = parse_index(parent, &token, items.len(), false)?;
                        items[index] = value.clone();
                    }
                    _ => return Err(type_mismatch(parent, "an object or array")),
                }
            }
            Self::Remove { path } => {
                let Some((parent, token)) = split_last(path)? else {
                    return Err(ApplyError::Malformed {
                        reason: "cannot remove the document root".to_string(),
                    });
                };
                match resolve_mut(document, parent)? {
                    Value::Object(map) => {
                        map.remove(&token).ok_or_else(|| ApplyError::NotFound {
                            pointer: path.clone(),
                        })?;
                    }
                    Value::Array(items) => {
                        let index = parse_index(parent, &token, items.len(), false)?;
                        items.remove(index);
                    }
                    _ => return Err(type_mismatch(parent, "an object or array")),
                }
            }
            Self::Append { path, value } => match resolve_mut(document, path)? {
                Value::Array(items) => items.push(value.clone()),
                _ => return Err(type_mismatch(path, "an array")),
            },
            Self::Insert { path, value } => {
                let Some((parent, token)) = split_last(path)? else {
                    return Err(type_mismatch(path, "an array element"));
                };
                match resolve_mut(document, parent)? {
                    Value::Array(items) => {
                        let index = if token == "-" {
                            items.len()
                        } else {
                            parse_index(parent, &token, items.len(), true)?
                        };
                        items.insert(index, value.clone());
                    }
                    _ => return Err(type_mismatch(parent, "an array")),
                }
            }
            Self::Merge { path, value } => {
                let target = resolve_mut(document, path)?;
                let current = std::mem::take(target);
                *target = deep_merge(current, value.clone());
            }
            Self::Test { path, value } => {
                validate_pointer(path)?;
                let actual = document.pointer(path).ok_or_else(|| ApplyError::NotFound {
                    pointer: path.clone(),
                })?;
                if actual != value {
                    return Err(ApplyError::TestFailed {
                        pointer: path.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn validate_pointer(pointer: &str) -> Result<(), ApplyError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(())
    } else {
        Err(ApplyError::InvalidPointer {
            pointer: pointer.to_string(),
        })
    }
}

fn resolve_mut<'a>(document: &'a mut Value, pointer: &str) -> Result<&'a mut Value, ApplyError> {
    validate_pointer(pointer)?;
    document
        .pointer_mut(pointer)
        .ok_or_else(|| ApplyError::NotFound {
            pointer: pointer.to_string(),
        })
}

/// Splits a pointer into its parent pointer and unescaped last token.
/// Returns `None` for the root pointer `""`.
fn split_last(pointer: &str) -> Result<Option<(&str, String)>, ApplyError> {
    validate_pointer(pointer)?;
    Ok(pointer.rfind('/').map(|at| {
        let token = pointer[at + 1..].replace("~1", "/").replace("~0", "~");
        (&pointer[..at], token)
    }))
}

fn parse_index(pointer: &str, token: &str, len: usize, allow_end: bool) -> Result<usize, ApplyError> {
    let out_of_bounds = || ApplyError::IndexOutOfBounds {
        pointer: pointer.to_string(),
        token: token.to_string(),
        len,
    };
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(out_of_bounds());
    }
    let index: usize = token.parse().map_err(|_| out_of_bounds())?;
    if index < len || (allow_end && index == len) {
        Ok(index)
    } else {
        Err(out_of_bounds())
    }
}

fn type_mismatch(pointer: &str, expected: &'static str) -> ApplyError {
    ApplyError::TypeMismatch {
        pointer: pointer.to_string(),
        expected,
    }
}
