//! Vulkan backend: translates portable compute encoding into explicit
//! command recording over `ash`.

pub mod binder;
pub mod context;
pub mod convert;
pub mod encoder;
pub mod resources;

#[cfg(any(test, feature = "mock"))]
pub mod recording;

pub use binder::ResourcesBinder;
pub use context::{AshContext, BindingWrite, BufferBarrier, ComputeContext, ImageBarrier};
pub use encoder::{ComputeCommandEncoder, Dependencies};
pub use resources::{VulkanBuffer, VulkanComputePipeline, VulkanSampler, VulkanTexture};
