//! Vitric GPU — portable compute encoding over explicit command recording.
//!
//! Client code issues pipeline/resource binds and dispatches through a
//! backend-agnostic surface; the enabled backend translates each call into
//! the native API's stateful command-recording model, inserting the layout
//! transitions and barriers that model requires and restoring transitioned
//! images when the encoding scope ends.
//!
//! # Backends
//!
//! Backends are selected by cargo feature, one module per backend. The
//! `vulkan-backend` feature (default) records through `ash`; the
//! [`backend`] module wraps the enabled backends in thin dispatch enums so
//! callers never name a native type. Command-buffer allocation, submission,
//! and device initialization stay outside this crate — an encoder borrows a
//! command buffer that is already recording and hands it back when the
//! scope ends.
//!
//! # Errors
//!
//! Every fallible operation reports through [`Error`], a closed portable
//! taxonomy. Native status codes never escape this crate; see
//! `vulkan::convert` for the translation tables.

pub mod backend;
pub mod error;
pub mod types;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub use backend::{
    NativeBuffer, NativeComputeEncoder, NativeComputePipeline, NativeDependencies, NativeSampler,
    NativeTexture,
};
pub use error::Error;
pub use types::{CompareFunction, Dimensions, StencilOperation, TextureFormat, UniformDesc};
