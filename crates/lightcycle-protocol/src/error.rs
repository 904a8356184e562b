//! Error types for the protocol layer.
//!
//! Decoding itself never fails; these errors come from interpreting
//! individual fields.

/// Errors that can occur while interpreting packet fields.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A `move` argument that is not one of `up`, `right`, `down`, `left`.
    #[error("unknown direction: {0:?}")]
    UnknownDirection(String),

    /// A field failed a schema or text rule.
    #[error("invalid field: {0}")]
    InvalidField(String),
}
