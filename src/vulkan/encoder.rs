//! The compute command encoder: one recording session on one borrowed
//! command buffer.
//!
//! The encoder sequences pipeline binding, resource binding, dispatch,
//! and synchronization onto the native command buffer, and tracks which
//! images it moved into `GENERAL` so it can move them back to a shared
//! read-only layout when the session ends. The command buffer is not
//! owned: allocation and submission belong to the context collaborator,
//! and exactly one thread drives a given encoder for its whole lifetime.

use ash::vk;

use crate::error::Error;
use crate::types::{Dimensions, TextureFormat, UniformDesc};

use super::binder::ResourcesBinder;
use super::context::{BufferBarrier, ComputeContext, ImageBarrier};
use super::resources::{VulkanBuffer, VulkanComputePipeline, VulkanSampler, VulkanTexture};

/// Prior-producer resources a dispatch must wait on before reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dependencies<'a> {
    pub textures: &'a [&'a VulkanTexture],
    pub buffers: &'a [&'a VulkanBuffer],
}

#[derive(Debug)]
struct RestoreEntry<'a> {
    texture: &'a VulkanTexture,
    aspect_mask: vk::ImageAspectFlags,
}

/// A single compute encoding session.
///
/// Constructed referencing a command buffer that is already inside a
/// recording scope; becomes inert exactly once, through
/// [`ComputeCommandEncoder::end_encoding`] or, if the caller forgot, at
/// drop (which performs the same work so no native recording state
/// leaks). An inert encoder accepts no further bind or dispatch calls.
pub struct ComputeCommandEncoder<'a> {
    ctx: &'a dyn ComputeContext,
    cmd_buffer: vk::CommandBuffer,
    is_encoding: bool,
    binder: ResourcesBinder<'a>,
    restore_layout: Vec<RestoreEntry<'a>>,
    pipeline: Option<&'a VulkanComputePipeline>,
}

impl<'a> ComputeCommandEncoder<'a> {
    pub fn new(cmd_buffer: vk::CommandBuffer, ctx: &'a dyn ComputeContext) -> Self {
        Self {
            ctx,
            cmd_buffer,
            is_encoding: true,
            binder: ResourcesBinder::new(),
            restore_layout: Vec::new(),
            pipeline: None,
        }
    }

    /// The raw command buffer handle, for collaborators (submission
    /// logic) that act on the same recording scope.
    pub fn vk_command_buffer(&self) -> vk::CommandBuffer {
        self.cmd_buffer
    }

    pub fn is_encoding(&self) -> bool {
        self.is_encoding
    }

    /// Records the active pipeline and issues the native bind
    /// immediately; pipeline binding takes no part in layout bookkeeping.
    pub fn bind_compute_pipeline_state(&mut self, pipeline: &'a VulkanComputePipeline) {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return;
        }
        self.pipeline = Some(pipeline);
        self.ctx
            .bind_compute_pipeline(self.cmd_buffer, pipeline.pipeline());
    }

    /// Binds a texture for storage access at `index`. A no-op for
    /// non-storage textures; see [`ResourcesBinder::bind_texture`].
    pub fn bind_texture(&mut self, index: u32, texture: &'a VulkanTexture) {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return;
        }
        self.binder.bind_texture(index, texture);
    }

    /// Binds a storage image at `index` and, when the image is not
    /// already in `GENERAL`, records the transition and schedules the
    /// image for restoration at end of encoding. Rebinding the same
    /// image at another index adds no second restoration entry.
    pub fn bind_image_texture(
        &mut self,
        index: u32,
        texture: &'a VulkanTexture,
        format: TextureFormat,
    ) {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return;
        }
        if self.binder.bind_image_texture(index, texture, format) {
            self.transition_to_general(texture);
        }
    }

    pub fn bind_sampler_state(&mut self, index: u32, sampler: &'a VulkanSampler) {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return;
        }
        self.binder.bind_sampler_state(index, sampler);
    }

    /// Binds `range` bytes of `buffer` starting at `offset`. A no-op for
    /// non-storage buffers.
    pub fn bind_buffer(
        &mut self,
        index: u32,
        buffer: &'a VulkanBuffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return;
        }
        self.binder.bind_buffer(index, buffer, offset, range);
    }

    /// Not supported on this backend.
    pub fn bind_bytes(&mut self, index: u32, data: &[u8]) -> Result<(), Error> {
        self.binder.bind_bytes(index, data)
    }

    /// Stores push constants for upload at the next dispatch. `data`
    /// must be a positive multiple of 4 bytes long.
    pub fn bind_push_constants(&mut self, data: &[u8], offset: u32) -> Result<(), Error> {
        debug_assert!(self.is_encoding, "bind on an encoder that already ended");
        if !self.is_encoding {
            return Err(Error::InvalidOperation("encoder is not recording".into()));
        }
        self.binder.bind_push_constants(data, offset)
    }

    /// Reserved for backends that cannot batch small constants; not
    /// supported on this backend.
    pub fn bind_uniform(&mut self, desc: &UniformDesc, data: &[u8]) -> Result<(), Error> {
        self.binder.bind_uniform(desc, data)
    }

    /// Resolves `dependencies` into barriers, flushes pending bind state,
    /// then issues the dispatch. Barriers are recorded before the binding
    /// flush so they cannot be reordered past the dispatch they guard.
    pub fn dispatch_thread_groups(
        &mut self,
        threadgroup_count: Dimensions,
        threadgroup_size: Dimensions,
        dependencies: &Dependencies<'_>,
    ) -> Result<(), Error> {
        debug_assert!(self.is_encoding, "dispatch on an encoder that already ended");
        if !self.is_encoding {
            return Err(Error::InvalidOperation("encoder is not recording".into()));
        }
        let Some(pipeline) = self.pipeline else {
            log::error!("dispatch_thread_groups: no compute pipeline bound");
            return Err(Error::InvalidOperation("no compute pipeline bound".into()));
        };

        self.process_dependencies(dependencies);
        self.binder.flush(self.ctx, self.cmd_buffer, pipeline);
        self.ctx.dispatch(
            self.cmd_buffer,
            threadgroup_count.into(),
            threadgroup_size.into(),
        );
        Ok(())
    }

    /// Restores every image this session transitioned back to its shared
    /// read-only layout and closes the recording scope. Calling it a
    /// second time has no effect.
    pub fn end_encoding(&mut self) -> Result<(), Error> {
        if !self.is_encoding {
            return Ok(());
        }
        self.is_encoding = false;

        for entry in std::mem::take(&mut self.restore_layout) {
            let new_layout = if entry
                .aspect_mask
                .intersects(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
            {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            } else {
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            };
            self.ctx.image_barrier(
                self.cmd_buffer,
                &ImageBarrier {
                    image: entry.texture.image(),
                    old_layout: entry.texture.layout(),
                    new_layout,
                    aspect_mask: entry.aspect_mask,
                },
            );
            entry.texture.set_layout(new_layout);
        }

        self.ctx.end_recording(self.cmd_buffer)
    }

    /// Opens a labeled group on the command stream. No-op when the
    /// `debug-markers` feature is disabled.
    pub fn push_debug_group_label(&self, label: &str, color: [f32; 4]) {
        #[cfg(feature = "debug-markers")]
        self.ctx.debug_group_begin(self.cmd_buffer, label, color);
        #[cfg(not(feature = "debug-markers"))]
        let _ = (label, color);
    }

    /// Inserts a single labeled event. No-op when the `debug-markers`
    /// feature is disabled.
    pub fn insert_debug_event_label(&self, label: &str, color: [f32; 4]) {
        #[cfg(feature = "debug-markers")]
        self.ctx.debug_insert_label(self.cmd_buffer, label, color);
        #[cfg(not(feature = "debug-markers"))]
        let _ = (label, color);
    }

    /// Closes the innermost labeled group. No-op when the `debug-markers`
    /// feature is disabled.
    pub fn pop_debug_group_label(&self) {
        #[cfg(feature = "debug-markers")]
        self.ctx.debug_group_end(self.cmd_buffer);
    }

    fn process_dependencies(&self, dependencies: &Dependencies<'_>) {
        for texture in dependencies.textures {
            // Same-layout barrier: makes the producing dispatch's writes
            // visible without disturbing the image's current layout.
            let layout = texture.layout();
            self.ctx.image_barrier(
                self.cmd_buffer,
                &ImageBarrier {
                    image: texture.image(),
                    old_layout: layout,
                    new_layout: layout,
                    aspect_mask: texture.aspect_mask(),
                },
            );
        }
        for buffer in dependencies.buffers {
            self.ctx.buffer_barrier(
                self.cmd_buffer,
                &BufferBarrier {
                    buffer: buffer.buffer(),
                    offset: 0,
                    size: buffer.size(),
                },
            );
        }
    }

    fn transition_to_general(&mut self, texture: &'a VulkanTexture) {
        if texture.layout() == vk::ImageLayout::GENERAL {
            return;
        }
        let aspect_mask = texture.aspect_mask();
        self.ctx.image_barrier(
            self.cmd_buffer,
            &ImageBarrier {
                image: texture.image(),
                old_layout: texture.layout(),
                new_layout: vk::ImageLayout::GENERAL,
                aspect_mask,
            },
        );
        texture.set_layout(vk::ImageLayout::GENERAL);

        let already_tracked = self
            .restore_layout
            .iter()
            .any(|entry| entry.texture.image() == texture.image());
        if !already_tracked {
            self.restore_layout.push(RestoreEntry {
                texture,
                aspect_mask,
            });
        }
    }
}

impl Drop for ComputeCommandEncoder<'_> {
    fn drop(&mut self) {
        if self.is_encoding {
            if cfg!(debug_assertions) && !std::thread::panicking() {
                log::error!(
                    "ComputeCommandEncoder dropped while still encoding; \
                     end_encoding() was not called"
                );
            }
            if let Err(err) = self.end_encoding() {
                log::error!("end_encoding during drop failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vulkan::recording::{fixtures, RecordedCall, RecordingContext};

    fn position(calls: &[RecordedCall], pred: impl Fn(&RecordedCall) -> bool) -> usize {
        calls
            .iter()
            .position(pred)
            .unwrap_or_else(|| panic!("expected call not found in {calls:?}"))
    }

    #[test]
    fn full_session_records_the_expected_stream() {
        let ctx = RecordingContext::new();
        let pipeline = fixtures::pipeline(1);
        let texture = fixtures::storage_texture(2);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_compute_pipeline_state(&pipeline);
        encoder.bind_image_texture(0, &texture, TextureFormat::Rgba8Unorm);
        encoder
            .dispatch_thread_groups(
                Dimensions::new(4, 4, 1),
                Dimensions::new(8, 8, 1),
                &Dependencies::default(),
            )
            .unwrap();
        encoder.end_encoding().unwrap();

        let calls = ctx.calls();

        assert_eq!(
            ctx.count(|c| matches!(c, RecordedCall::BindPipeline { .. })),
            1
        );

        let to_general = position(&calls, |c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b)
                    if b.new_layout == vk::ImageLayout::GENERAL
            )
        });
        let dispatch = position(&calls, |c| matches!(c, RecordedCall::Dispatch { .. }));
        let restore = position(&calls, |c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b)
                    if b.new_layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            )
        });
        assert!(to_general < dispatch);
        assert!(dispatch < restore);
        assert_eq!(
            ctx.count(|c| matches!(c, RecordedCall::ImageBarrier(_))),
            2,
            "exactly one transition out and one back"
        );

        assert_eq!(
            calls[dispatch],
            RecordedCall::Dispatch {
                group_count: [4, 4, 1],
                group_size: [8, 8, 1],
            }
        );
        assert_eq!(calls.last(), Some(&RecordedCall::EndRecording));
        assert_eq!(texture.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn rebinding_an_image_tracks_one_restoration() {
        let ctx = RecordingContext::new();
        let texture = fixtures::storage_texture(3);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_image_texture(0, &texture, TextureFormat::Rgba8Unorm);
        encoder.bind_image_texture(1, &texture, TextureFormat::Rgba8Unorm);
        encoder.end_encoding().unwrap();

        let transitions = ctx.count(|c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b) if b.new_layout == vk::ImageLayout::GENERAL
            )
        });
        let restores = ctx.count(|c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b)
                    if b.new_layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            )
        });
        assert_eq!(transitions, 1);
        assert_eq!(restores, 1);
    }

    #[test]
    fn end_encoding_twice_is_inert() {
        let ctx = RecordingContext::new();
        let texture = fixtures::storage_texture(4);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_image_texture(0, &texture, TextureFormat::R32Float);
        encoder.end_encoding().unwrap();
        let after_first = ctx.calls().len();

        encoder.end_encoding().unwrap();
        assert_eq!(ctx.calls().len(), after_first);
        assert!(!encoder.is_encoding());
    }

    #[test]
    fn drop_without_end_encoding_still_restores_and_closes() {
        let ctx = RecordingContext::new();
        let texture = fixtures::storage_texture(5);

        {
            let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
            encoder.bind_image_texture(0, &texture, TextureFormat::Rgba8Unorm);
        }

        let restores = ctx.count(|c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b)
                    if b.new_layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            )
        });
        assert_eq!(restores, 1);
        assert_eq!(ctx.calls().last(), Some(&RecordedCall::EndRecording));
    }

    #[test]
    fn dispatch_without_pipeline_is_invalid_and_records_nothing() {
        let ctx = RecordingContext::new();
        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);

        let result = encoder.dispatch_thread_groups(
            Dimensions::new(1, 1, 1),
            Dimensions::new(64, 1, 1),
            &Dependencies::default(),
        );
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert_eq!(ctx.count(|c| matches!(c, RecordedCall::Dispatch { .. })), 0);

        encoder.end_encoding().unwrap();
    }

    #[test]
    #[should_panic(expected = "storage-capable")]
    fn non_storage_image_texture_asserts() {
        let ctx = RecordingContext::new();
        let sampled = fixtures::sampled_texture(6);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_image_texture(0, &sampled, TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn plain_texture_bind_records_no_transition() {
        let ctx = RecordingContext::new();
        let sampled = fixtures::sampled_texture(7);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_texture(0, &sampled);
        encoder.end_encoding().unwrap();

        assert_eq!(ctx.count(|c| matches!(c, RecordedCall::ImageBarrier(_))), 0);
        assert_eq!(sampled.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn already_general_image_needs_no_transition_or_restore() {
        let ctx = RecordingContext::new();
        let texture = fixtures::general_storage_texture(8);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_image_texture(0, &texture, TextureFormat::Rgba8Unorm);
        encoder.end_encoding().unwrap();

        assert_eq!(ctx.count(|c| matches!(c, RecordedCall::ImageBarrier(_))), 0);
        assert_eq!(texture.layout(), vk::ImageLayout::GENERAL);
    }

    #[test]
    fn depth_images_restore_to_depth_stencil_read_only() {
        let ctx = RecordingContext::new();
        let depth = fixtures::storage_depth_texture(9);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_image_texture(0, &depth, TextureFormat::Depth32Float);
        encoder.end_encoding().unwrap();

        let calls = ctx.calls();
        let restore = position(&calls, |c| {
            matches!(
                c,
                RecordedCall::ImageBarrier(b)
                    if b.new_layout == vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            )
        });
        match &calls[restore] {
            RecordedCall::ImageBarrier(barrier) => {
                assert_eq!(barrier.aspect_mask, vk::ImageAspectFlags::DEPTH);
            }
            other => panic!("expected image barrier, got {other:?}"),
        }
        assert_eq!(
            depth.layout(),
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn dependency_barriers_precede_the_binding_flush_and_dispatch() {
        let ctx = RecordingContext::new();
        let pipeline = fixtures::pipeline(10);
        let produced = fixtures::general_storage_texture(11);
        let counters = fixtures::storage_buffer(12, 256);
        let output = fixtures::storage_buffer(13, 1024);

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_compute_pipeline_state(&pipeline);
        encoder.bind_buffer(0, &output, 0, 1024);
        encoder
            .dispatch_thread_groups(
                Dimensions::new(16, 1, 1),
                Dimensions::new(64, 1, 1),
                &Dependencies {
                    textures: &[&produced],
                    buffers: &[&counters],
                },
            )
            .unwrap();
        encoder.end_encoding().unwrap();

        let calls = ctx.calls();
        let image_wait = position(&calls, |c| matches!(c, RecordedCall::ImageBarrier(_)));
        let buffer_wait = position(&calls, |c| matches!(c, RecordedCall::BufferBarrier { .. }));
        let flush = position(&calls, |c| matches!(c, RecordedCall::UpdateBindings { .. }));
        let dispatch = position(&calls, |c| matches!(c, RecordedCall::Dispatch { .. }));

        assert!(image_wait < flush);
        assert!(buffer_wait < flush);
        assert!(flush < dispatch);

        match &calls[image_wait] {
            RecordedCall::ImageBarrier(barrier) => {
                assert_eq!(barrier.old_layout, barrier.new_layout);
            }
            other => panic!("expected image barrier, got {other:?}"),
        }
    }

    #[test]
    fn push_constants_reach_the_stream_before_the_dispatch() {
        let ctx = RecordingContext::new();
        let pipeline = fixtures::pipeline(14);
        let output = fixtures::storage_buffer(15, 64);
        let params: [u32; 2] = [640, 480];

        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        encoder.bind_compute_pipeline_state(&pipeline);
        encoder.bind_buffer(0, &output, 0, 64);
        encoder
            .bind_push_constants(bytemuck::bytes_of(&params), 0)
            .unwrap();
        encoder
            .dispatch_thread_groups(
                Dimensions::new(10, 8, 1),
                Dimensions::new(8, 8, 1),
                &Dependencies::default(),
            )
            .unwrap();
        // Push constants persist: a second dispatch re-uploads nothing.
        encoder
            .dispatch_thread_groups(
                Dimensions::new(10, 8, 1),
                Dimensions::new(8, 8, 1),
                &Dependencies::default(),
            )
            .unwrap();
        encoder.end_encoding().unwrap();

        let calls = ctx.calls();
        let upload = position(&calls, |c| matches!(c, RecordedCall::PushConstants { .. }));
        let dispatch = position(&calls, |c| matches!(c, RecordedCall::Dispatch { .. }));
        assert!(upload < dispatch);
        assert_eq!(
            ctx.count(|c| matches!(c, RecordedCall::PushConstants { .. })),
            1
        );
        assert_eq!(ctx.count(|c| matches!(c, RecordedCall::Dispatch { .. })), 2);

        match &calls[upload] {
            RecordedCall::PushConstants { offset, data } => {
                assert_eq!(*offset, 0);
                assert_eq!(data, bytemuck::bytes_of(&params));
            }
            other => panic!("expected push constants, got {other:?}"),
        }
    }

    #[cfg(feature = "debug-markers")]
    #[test]
    fn debug_labels_pass_through() {
        let ctx = RecordingContext::new();
        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);

        encoder.push_debug_group_label("culling", [0.2, 0.4, 0.8, 1.0]);
        encoder.insert_debug_event_label("first pass", [1.0; 4]);
        encoder.pop_debug_group_label();
        encoder.end_encoding().unwrap();

        let calls = ctx.calls();
        assert_eq!(
            calls[0],
            RecordedCall::DebugGroupBegin {
                label: "culling".into(),
            }
        );
        assert_eq!(
            calls[1],
            RecordedCall::DebugInsert {
                label: "first pass".into(),
            }
        );
        assert_eq!(calls[2], RecordedCall::DebugGroupEnd);
    }

    #[test]
    fn raw_handle_accessor_returns_the_borrowed_buffer() {
        let ctx = RecordingContext::new();
        let mut encoder = ComputeCommandEncoder::new(vk::CommandBuffer::null(), &ctx);
        assert_eq!(encoder.vk_command_buffer(), vk::CommandBuffer::null());
        encoder.end_encoding().unwrap();
    }
}
