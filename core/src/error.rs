//! Error kinds shared by every layer of the store.
//!
//! The split mirrors the design's error-handling section: [`CoreError`] is what the
//! `OrderedMap`/`PartitionEngine` layer returns; [`ProtocolError`] is what a
//! `StoragePeer`/`Router` returns once a request has crossed the wire.

use thiserror::Error;

/// Errors raised by the ordered map and partition engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// `d < 3` or `L < 2` at construction time.
    #[error("invalid tree parameters: {0}")]
    InvalidCapacity(String),

    /// A structural invariant (see the data model) was violated. Fatal: the owning peer
    /// should log this at `CRITICAL` and exit the process.
    #[error("structural invariant violated: {0}")]
    StructuralInvariantViolation(String),

    /// The backing arena could not grow further.
    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while decoding bytes off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("truncated envelope: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("unknown request code: {0}")]
    UnknownRequestCode(u8),

    #[error("unknown transport op: {0}")]
    UnknownOp(u8),

    #[error("missing payload where one was required")]
    MissingPayload,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
