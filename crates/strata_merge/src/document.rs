//! Reading and writing structured documents.
//!
//! Documents are JSON. Output is pretty-printed with object keys in sorted
//! order, so an unchanged merge always produces a byte-identical artifact.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use serde_json::Value;

use crate::error::DocumentError;

/// Reads and parses the JSON document at `path`.
pub fn load_document(path: &Path) -> Result<Value, DocumentError> {
    let file = File::open(path).map_err(|e| DocumentError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| DocumentError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serializes `document` as indented JSON followed by a newline.
pub fn write_document<W: Write>(mut writer: W, document: &Value) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
