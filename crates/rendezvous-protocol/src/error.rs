//! Error types for the protocol layer.
//!
//! Each crate in Rendezvous defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into an event (or back), never
//! a networking or membership problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into an event).
    ///
    /// Common causes: malformed JSON, an unknown event name, or a payload
    /// missing a required field such as `room`.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
