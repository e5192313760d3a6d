//! Loading the telemetry schema document from disk.

use std::path::{Path, PathBuf};

use devlink_core::TelemetrySchema;
use thiserror::Error;
use tracing::info;

/// Error type for schema loading.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error reading schema at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reads and parses the schema at `path`.
///
/// Unlike the host configuration, a missing schema file is an error: the
/// caller asked for telemetry routing by configuring its path.
///
/// # Errors
///
/// Returns [`SchemaError::Io`] if the file cannot be read and
/// [`SchemaError::Parse`] if it is not a valid schema.
pub fn load_schema(path: &Path) -> Result<TelemetrySchema, SchemaError> {
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let schema: TelemetrySchema = toml::from_str(&content)?;
    info!(
        path = %path.display(),
        classes = schema.classes.len(),
        "telemetry schema loaded"
    );
    Ok(schema)
}
