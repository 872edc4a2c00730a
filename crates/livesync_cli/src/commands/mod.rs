//! CLI command implementations.

pub mod decode;
pub mod replay;
pub mod schema;

use livesync_codec::SchemaDescription;
use std::path::Path;

/// Reads and parses a schema description file.
pub fn load_schema(path: &Path) -> Result<SchemaDescription, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read schema {}: {e}", path.display()))?;
    Ok(SchemaDescription::parse(&text)?)
}
