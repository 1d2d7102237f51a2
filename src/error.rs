//! Portable result taxonomy shared by every backend.
//!
//! Native status codes never cross this boundary; each backend translates
//! its own vocabulary into this enum at the call site (for Vulkan, see
//! `vulkan::convert`).

use thiserror::Error;

/// Portable failure taxonomy for encoding and translation operations.
///
/// The set is closed — callers match on these variants, so new kinds must
/// not be added casually. Success is `Result::Ok`, not a variant.
///
/// Resource-exhaustion codes (out of host/device/pool memory, too many
/// objects) map to [`Error::ArgumentOutOfRange`] rather than a dedicated
/// exhaustion kind. The conflation is questionable, but callers key
/// behavior off this mapping and it must not change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An optional feature, extension, or layer is absent.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// The hardware or driver cannot satisfy the request.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A caller-supplied argument is out of range; also covers native
    /// resource exhaustion (see the type-level note).
    #[error("argument out of range: {0}")]
    ArgumentOutOfRange(String),

    /// The encoder was used outside its documented contract, e.g. a
    /// dispatch with no pipeline bound.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Uncategorized native failure. The message preserves the native
    /// code's symbolic name for diagnosis.
    #[error("native runtime failure: {0}")]
    Runtime(String),
}
