//! Canonical encoding of provider documents.

use bytes::Bytes;

use crate::errors::SyncError;

/// Re-encodes a JSON document with two-space indentation.
///
/// Insignificant whitespace is discarded and object keys keep their source
/// order, so two documents differing only in formatting produce identical
/// bytes.
///
/// # Errors
/// - `SyncError::MalformedDocument` - Input is not a single JSON value
pub fn normalize(document: &[u8]) -> Result<Bytes, SyncError> {
    let value: serde_json::Value =
        serde_json::from_slice(document).map_err(|e| SyncError::MalformedDocument {
            reason: e.to_string(),
        })?;

    let encoded = serde_json::to_vec_pretty(&value).map_err(|e| SyncError::MalformedDocument {
        reason: e.to_string(),
    })?;

    Ok(Bytes::from(encoded))
}
