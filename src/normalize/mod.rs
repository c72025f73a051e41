//! Schema normalization.
//!
//! The single entry point for extraction output. Nothing else in the crate
//! looks at raw payload JSON.

pub mod payload;
pub mod schema;

pub use payload::extract_json_object;
pub use schema::{normalize, Coercion, NormalizedReport};

use crate::error::SchemaError;

/// Extract the JSON object from an extraction response and normalize it.
pub fn normalize_text(text: &str) -> Result<NormalizedReport, SchemaError> {
    let value = extract_json_object(text)?;
    normalize(&value)
}
