//! Structured-document merging for Strata overlays.
//!
//! Overlays are applied to a base document one at a time. A plain overlay is
//! deep-merged into the accumulating document with arrays replaced wholesale;
//! an overlay consisting of an `$instructions` script is executed as a list
//! of pointer-addressed edits instead.

#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod instruction;
pub mod merge;

pub use document::{load_document, write_document};
pub use error::{ApplyError, DocumentError};
pub use instruction::{apply_instructions, is_instruction_document, Instruction, INSTRUCTIONS_KEY};
pub use merge::deep_merge;

use serde_json::Value;

/// Applies one overlay to the accumulating document.
///
/// Instruction documents are executed with [`apply_instructions`]; anything
/// else is folded in with [`deep_merge`]. On error the document is left
/// exactly as it was before the call.
pub fn apply_overlay(document: &mut Value, overlay: Value) -> Result<(), ApplyError> {
    if is_instruction_document(&overlay) {
        apply_instructions(document, &overlay)
    } else {
        let base = std::mem::take(document);
        *document = deep_merge(base, overlay);
        Ok(())
    }
}
