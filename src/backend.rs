//! Backend abstraction — thin enum dispatch layer over the enabled
//! native backends.
//!
//! `NativeTexture`, `NativeBuffer`, `NativeSampler`,
//! `NativeComputePipeline`, and `NativeComputeEncoder` wrap the
//! backend-specific types. When only one feature is enabled, dead code
//! elimination removes unreachable arms (zero overhead).
//!
//! Each enum has an `Unavailable` variant so the code compiles even when
//! no backend feature is enabled.

use std::marker::PhantomData;

use crate::error::Error;
use crate::types::{Dimensions, TextureFormat, UniformDesc};

#[cfg(feature = "vulkan-backend")]
use crate::vulkan::{
    ComputeCommandEncoder, ComputeContext, Dependencies, VulkanBuffer, VulkanComputePipeline,
    VulkanSampler, VulkanTexture,
};

fn backend_unavailable() -> Error {
    Error::Unsupported("no GPU backend enabled".into())
}

// ---------------------------------------------------------------------------
// NativeTexture
// ---------------------------------------------------------------------------

pub enum NativeTexture {
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanTexture),
    /// Placeholder when no backend is enabled — never constructed at runtime.
    #[allow(dead_code)]
    Unavailable,
}

impl NativeTexture {
    #[cfg(feature = "vulkan-backend")]
    pub fn as_vulkan(&self) -> Option<&VulkanTexture> {
        match self {
            NativeTexture::Vulkan(texture) => Some(texture),
            _ => None,
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl From<VulkanTexture> for NativeTexture {
    fn from(texture: VulkanTexture) -> Self {
        NativeTexture::Vulkan(texture)
    }
}

// ---------------------------------------------------------------------------
// NativeBuffer
// ---------------------------------------------------------------------------

pub enum NativeBuffer {
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanBuffer),
    #[allow(dead_code)]
    Unavailable,
}

impl NativeBuffer {
    #[cfg(feature = "vulkan-backend")]
    pub fn as_vulkan(&self) -> Option<&VulkanBuffer> {
        match self {
            NativeBuffer::Vulkan(buffer) => Some(buffer),
            _ => None,
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl From<VulkanBuffer> for NativeBuffer {
    fn from(buffer: VulkanBuffer) -> Self {
        NativeBuffer::Vulkan(buffer)
    }
}

// ---------------------------------------------------------------------------
// NativeSampler
// ---------------------------------------------------------------------------

pub enum NativeSampler {
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanSampler),
    #[allow(dead_code)]
    Unavailable,
}

impl NativeSampler {
    #[cfg(feature = "vulkan-backend")]
    pub fn as_vulkan(&self) -> Option<&VulkanSampler> {
        match self {
            NativeSampler::Vulkan(sampler) => Some(sampler),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// NativeComputePipeline
// ---------------------------------------------------------------------------

pub enum NativeComputePipeline {
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanComputePipeline),
    #[allow(dead_code)]
    Unavailable,
}

impl NativeComputePipeline {
    #[cfg(feature = "vulkan-backend")]
    pub fn as_vulkan(&self) -> Option<&VulkanComputePipeline> {
        match self {
            NativeComputePipeline::Vulkan(pipeline) => Some(pipeline),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// NativeDependencies
// ---------------------------------------------------------------------------

/// Prior-producer resources a dispatch must wait on, backend-agnostic.
#[derive(Default, Clone, Copy)]
pub struct NativeDependencies<'a> {
    pub textures: &'a [&'a NativeTexture],
    pub buffers: &'a [&'a NativeBuffer],
}

// ---------------------------------------------------------------------------
// NativeComputeEncoder
// ---------------------------------------------------------------------------

/// One compute encoding session on whichever backend the owning context
/// selected at construction time.
pub enum NativeComputeEncoder<'a> {
    #[cfg(feature = "vulkan-backend")]
    Vulkan(ComputeCommandEncoder<'a>),
    /// Placeholder when no backend is enabled — never constructed at runtime.
    #[allow(dead_code)]
    Unavailable(PhantomData<&'a ()>),
}

#[allow(unused_variables)]
impl<'a> NativeComputeEncoder<'a> {
    /// Opens a Vulkan encoding session on `cmd_buffer`.
    #[cfg(feature = "vulkan-backend")]
    pub fn vulkan(cmd_buffer: ash::vk::CommandBuffer, ctx: &'a dyn ComputeContext) -> Self {
        NativeComputeEncoder::Vulkan(ComputeCommandEncoder::new(cmd_buffer, ctx))
    }

    pub fn is_encoding(&self) -> bool {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.is_encoding(),
            NativeComputeEncoder::Unavailable(_) => false,
        }
    }

    pub fn bind_compute_pipeline_state(&mut self, pipeline: &'a NativeComputePipeline) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => match pipeline.as_vulkan() {
                Some(pipeline) => encoder.bind_compute_pipeline_state(pipeline),
                None => log::error!("pipeline does not belong to the Vulkan backend"),
            },
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn bind_texture(&mut self, index: u32, texture: &'a NativeTexture) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => match texture.as_vulkan() {
                Some(texture) => encoder.bind_texture(index, texture),
                None => log::error!("texture does not belong to the Vulkan backend"),
            },
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn bind_image_texture(
        &mut self,
        index: u32,
        texture: &'a NativeTexture,
        format: TextureFormat,
    ) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => match texture.as_vulkan() {
                Some(texture) => encoder.bind_image_texture(index, texture, format),
                None => log::error!("texture does not belong to the Vulkan backend"),
            },
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn bind_sampler_state(&mut self, index: u32, sampler: &'a NativeSampler) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => match sampler.as_vulkan() {
                Some(sampler) => encoder.bind_sampler_state(index, sampler),
                None => log::error!("sampler does not belong to the Vulkan backend"),
            },
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn bind_buffer(&mut self, index: u32, buffer: &'a NativeBuffer, offset: u64, size: u64) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => match buffer.as_vulkan() {
                Some(buffer) => encoder.bind_buffer(index, buffer, offset, size),
                None => log::error!("buffer does not belong to the Vulkan backend"),
            },
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn bind_bytes(&mut self, index: u32, data: &[u8]) -> Result<(), Error> {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.bind_bytes(index, data),
            NativeComputeEncoder::Unavailable(_) => Err(backend_unavailable()),
        }
    }

    pub fn bind_push_constants(&mut self, data: &[u8], offset: u32) -> Result<(), Error> {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.bind_push_constants(data, offset),
            NativeComputeEncoder::Unavailable(_) => Err(backend_unavailable()),
        }
    }

    pub fn bind_uniform(&mut self, desc: &UniformDesc, data: &[u8]) -> Result<(), Error> {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.bind_uniform(desc, data),
            NativeComputeEncoder::Unavailable(_) => Err(backend_unavailable()),
        }
    }

    pub fn dispatch_thread_groups(
        &mut self,
        threadgroup_count: Dimensions,
        threadgroup_size: Dimensions,
        dependencies: &NativeDependencies<'_>,
    ) -> Result<(), Error> {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => {
                let textures: Vec<&VulkanTexture> = dependencies
                    .textures
                    .iter()
                    .filter_map(|texture| texture.as_vulkan())
                    .collect();
                let buffers: Vec<&VulkanBuffer> = dependencies
                    .buffers
                    .iter()
                    .filter_map(|buffer| buffer.as_vulkan())
                    .collect();
                encoder.dispatch_thread_groups(
                    threadgroup_count,
                    threadgroup_size,
                    &Dependencies {
                        textures: &textures,
                        buffers: &buffers,
                    },
                )
            }
            NativeComputeEncoder::Unavailable(_) => Err(backend_unavailable()),
        }
    }

    pub fn end_encoding(&mut self) -> Result<(), Error> {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.end_encoding(),
            NativeComputeEncoder::Unavailable(_) => Ok(()),
        }
    }

    pub fn push_debug_group_label(&self, label: &str, color: [f32; 4]) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.push_debug_group_label(label, color),
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn insert_debug_event_label(&self, label: &str, color: [f32; 4]) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.insert_debug_event_label(label, color),
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }

    pub fn pop_debug_group_label(&self) {
        match self {
            #[cfg(feature = "vulkan-backend")]
            NativeComputeEncoder::Vulkan(encoder) => encoder.pop_debug_group_label(),
            NativeComputeEncoder::Unavailable(_) => {}
        }
    }
}
