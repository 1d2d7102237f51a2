//! Accumulates bind intents for one encoding session and materializes
//! them into native binding calls at most once per dispatch.
//!
//! Repeated binds to the same index before a dispatch coalesce — only the
//! last one has effect. Push constants follow Vulkan's model: uploaded
//! when dirty, then persistent across dispatches until overwritten.

use std::collections::BTreeMap;

use ash::vk;

use crate::error::Error;
use crate::types::{TextureFormat, UniformDesc};

use super::context::{BindingWrite, ComputeContext};
use super::resources::{VulkanBuffer, VulkanComputePipeline, VulkanSampler, VulkanTexture};

/// Push-constant payloads must be sized in whole 32-bit words.
const PUSH_CONSTANT_ALIGNMENT: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Binding<'a> {
    Texture(&'a VulkanTexture),
    ImageTexture {
        texture: &'a VulkanTexture,
        format: TextureFormat,
    },
    Sampler(&'a VulkanSampler),
    Buffer {
        buffer: &'a VulkanBuffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PushConstantBlock {
    pub bytes: Vec<u8>,
    pub offset: u32,
}

/// Per-session bind state. At most one binding occupies an index; the
/// borrow checker holds callers to the resources-outlive-the-session
/// precondition.
#[derive(Debug, Default)]
pub struct ResourcesBinder<'a> {
    bindings: BTreeMap<u32, Binding<'a>>,
    bindings_dirty: bool,
    push_constants: Option<PushConstantBlock>,
    push_constants_dirty: bool,
}

impl<'a> ResourcesBinder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a plain texture bind. Only storage-capable textures are
    /// accepted on this path; anything else is a documented no-op —
    /// sampled access goes through [`ResourcesBinder::bind_sampler_state`].
    pub fn bind_texture(&mut self, index: u32, texture: &'a VulkanTexture) {
        if !texture.is_storage() {
            log::debug!("ignoring non-storage texture bound at index {index}");
            return;
        }
        self.bindings.insert(index, Binding::Texture(texture));
        self.bindings_dirty = true;
    }

    /// Records a storage-image bind. Returns whether the bind was
    /// recorded, so the encoder can skip its transition bookkeeping when
    /// it was not. Non-storage textures violate the contract: loud in
    /// debug builds, refused in release builds.
    pub fn bind_image_texture(
        &mut self,
        index: u32,
        texture: &'a VulkanTexture,
        format: TextureFormat,
    ) -> bool {
        debug_assert!(
            texture.is_storage(),
            "bind_image_texture requires a storage-capable texture"
        );
        if !texture.is_storage() {
            log::error!("refusing non-storage image texture at index {index}");
            return false;
        }
        self.bindings
            .insert(index, Binding::ImageTexture { texture, format });
        self.bindings_dirty = true;
        true
    }

    pub fn bind_sampler_state(&mut self, index: u32, sampler: &'a VulkanSampler) {
        self.bindings.insert(index, Binding::Sampler(sampler));
        self.bindings_dirty = true;
    }

    /// Records a buffer range bind. Non-storage buffers are a documented
    /// no-op.
    pub fn bind_buffer(
        &mut self,
        index: u32,
        buffer: &'a VulkanBuffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        if !buffer.is_storage() {
            log::debug!("ignoring non-storage buffer bound at index {index}");
            return;
        }
        self.bindings.insert(
            index,
            Binding::Buffer {
                buffer,
                offset,
                range,
            },
        );
        self.bindings_dirty = true;
    }

    /// Inline byte binding is not supported on this backend and must not
    /// silently succeed.
    pub fn bind_bytes(&mut self, _index: u32, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unimplemented(
            "bind_bytes is not supported by the Vulkan backend".into(),
        ))
    }

    /// Copies `data` as the session's push-constant block. The caller's
    /// slice is not retained. Lengths that are not a positive multiple of
    /// 4 are rejected and leave any previously stored block unchanged.
    pub fn bind_push_constants(&mut self, data: &[u8], offset: u32) -> Result<(), Error> {
        if data.is_empty() || data.len() % PUSH_CONSTANT_ALIGNMENT != 0 {
            return Err(Error::ArgumentOutOfRange(format!(
                "push constant length {} must be a positive multiple of {}",
                data.len(),
                PUSH_CONSTANT_ALIGNMENT
            )));
        }
        self.push_constants = Some(PushConstantBlock {
            bytes: data.to_vec(),
            offset,
        });
        self.push_constants_dirty = true;
        Ok(())
    }

    /// Escape hatch for backends whose native API cannot batch small
    /// constants. Vulkan has push constants, so it is rejected here.
    pub fn bind_uniform(&mut self, _desc: &UniformDesc, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unimplemented(
            "single-uniform binding is not supported by the Vulkan backend".into(),
        ))
    }

    /// Pushes the recorded state into native calls on `cmd_buffer`.
    ///
    /// Invoked by the encoder immediately before each dispatch. Dirty
    /// flags are cleared; the binding map and push-constant block persist
    /// so later dispatches reuse the native state already recorded.
    pub fn flush(
        &mut self,
        ctx: &dyn ComputeContext,
        cmd_buffer: vk::CommandBuffer,
        pipeline: &VulkanComputePipeline,
    ) {
        if self.bindings_dirty && !self.bindings.is_empty() {
            let writes: Vec<BindingWrite> = self
                .bindings
                .iter()
                .map(|(&binding, bound)| match *bound {
                    Binding::Texture(texture) => BindingWrite::StorageImage {
                        binding,
                        view: texture.view(),
                        layout: texture.layout(),
                    },
                    Binding::ImageTexture { texture, format } => {
                        log::trace!("binding {binding}: storage image, format {format:?}");
                        BindingWrite::StorageImage {
                            binding,
                            view: texture.view(),
                            layout: texture.layout(),
                        }
                    }
                    Binding::Sampler(sampler) => BindingWrite::Sampler {
                        binding,
                        sampler: sampler.sampler(),
                    },
                    Binding::Buffer {
                        buffer,
                        offset,
                        range,
                    } => BindingWrite::StorageBuffer {
                        binding,
                        buffer: buffer.buffer(),
                        offset,
                        range,
                    },
                })
                .collect();
            ctx.update_bindings(cmd_buffer, pipeline.layout(), &writes);
            self.bindings_dirty = false;
        }

        if self.push_constants_dirty {
            if let Some(block) = &self.push_constants {
                ctx.push_constants(cmd_buffer, pipeline.layout(), block.offset, &block.bytes);
            }
            self.push_constants_dirty = false;
        }
    }

    #[cfg(test)]
    pub(crate) fn push_constant_block(&self) -> Option<&PushConstantBlock> {
        self.push_constants.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vulkan::recording::{fixtures, RecordedCall, RecordingContext};

    fn flush(binder: &mut ResourcesBinder<'_>, ctx: &RecordingContext) {
        let pipeline = fixtures::pipeline(0xF0);
        binder.flush(ctx, vk::CommandBuffer::null(), &pipeline);
    }

    #[test]
    fn last_bind_per_index_wins() {
        let ctx = RecordingContext::new();
        let first = fixtures::storage_texture(1);
        let second = fixtures::storage_texture(2);

        let mut binder = ResourcesBinder::new();
        binder.bind_texture(0, &first);
        binder.bind_texture(0, &second);
        flush(&mut binder, &ctx);

        let calls = ctx.calls();
        let writes = calls
            .iter()
            .find_map(|call| match call {
                RecordedCall::UpdateBindings { writes } => Some(writes.clone()),
                _ => None,
            })
            .expect("one binding flush");
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0],
            BindingWrite::StorageImage {
                binding: 0,
                view: second.view(),
                layout: second.layout(),
            }
        );
    }

    #[test]
    fn non_storage_texture_bind_is_a_silent_no_op() {
        let ctx = RecordingContext::new();
        let sampled = fixtures::sampled_texture(3);

        let mut binder = ResourcesBinder::new();
        binder.bind_texture(0, &sampled);
        flush(&mut binder, &ctx);

        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn non_storage_buffer_bind_is_a_silent_no_op() {
        let ctx = RecordingContext::new();
        let uniform = fixtures::uniform_buffer(4, 64);

        let mut binder = ResourcesBinder::new();
        binder.bind_buffer(0, &uniform, 0, 64);
        flush(&mut binder, &ctx);

        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn bind_bytes_is_unimplemented() {
        let mut binder = ResourcesBinder::new();
        assert!(matches!(
            binder.bind_bytes(0, &[0, 1, 2, 3]),
            Err(Error::Unimplemented(_))
        ));
    }

    #[test]
    fn bind_uniform_is_unimplemented() {
        let mut binder = ResourcesBinder::new();
        let desc = UniformDesc { location: 0 };
        assert!(matches!(
            binder.bind_uniform(&desc, &[0u8; 4]),
            Err(Error::Unimplemented(_))
        ));
    }

    #[test]
    fn misaligned_push_constants_leave_stored_block_unchanged() {
        let mut binder = ResourcesBinder::new();
        binder.bind_push_constants(&[0u8; 8], 0).unwrap();

        assert!(matches!(
            binder.bind_push_constants(&[0u8; 6], 0),
            Err(Error::ArgumentOutOfRange(_))
        ));
        assert!(matches!(
            binder.bind_push_constants(&[], 0),
            Err(Error::ArgumentOutOfRange(_))
        ));

        let block = binder.push_constant_block().expect("block retained");
        assert_eq!(block.bytes.len(), 8);
    }

    #[test]
    fn push_constants_upload_once_until_overwritten() {
        let ctx = RecordingContext::new();
        let mut binder = ResourcesBinder::new();
        binder.bind_push_constants(&[1u8, 2, 3, 4], 0).unwrap();

        flush(&mut binder, &ctx);
        flush(&mut binder, &ctx);

        let uploads = ctx.count(|call| matches!(call, RecordedCall::PushConstants { .. }));
        assert_eq!(uploads, 1);

        binder.bind_push_constants(&[5u8, 6, 7, 8], 4).unwrap();
        flush(&mut binder, &ctx);
        let calls = ctx.calls();
        assert_eq!(
            calls.last(),
            Some(&RecordedCall::PushConstants {
                offset: 4,
                data: vec![5, 6, 7, 8],
            })
        );
    }

    #[test]
    fn flush_coalesces_to_one_binding_update() {
        let ctx = RecordingContext::new();
        let texture = fixtures::storage_texture(5);
        let buffer = fixtures::storage_buffer(6, 128);
        let sampler = fixtures::sampler(7);

        let mut binder = ResourcesBinder::new();
        binder.bind_texture(0, &texture);
        binder.bind_buffer(1, &buffer, 0, 128);
        binder.bind_sampler_state(2, &sampler);

        flush(&mut binder, &ctx);
        flush(&mut binder, &ctx);

        let updates = ctx.count(|call| matches!(call, RecordedCall::UpdateBindings { .. }));
        assert_eq!(updates, 1, "clean state must not re-flush");
    }
}
