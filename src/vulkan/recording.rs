//! A [`ComputeContext`] that captures the native command stream instead
//! of issuing it, so encoder behavior can be verified without a driver.
//!
//! Available to downstream crates through the `mock` feature; the crate's
//! own tests use it unconditionally.

use std::cell::RefCell;

use ash::vk;

use crate::error::Error;

use super::context::{BindingWrite, BufferBarrier, ComputeContext, ImageBarrier};

/// One native call captured by [`RecordingContext`], in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    BindPipeline {
        pipeline: vk::Pipeline,
    },
    UpdateBindings {
        writes: Vec<BindingWrite>,
    },
    PushConstants {
        offset: u32,
        data: Vec<u8>,
    },
    Dispatch {
        group_count: [u32; 3],
        group_size: [u32; 3],
    },
    ImageBarrier(ImageBarrier),
    BufferBarrier {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
    EndRecording,
    DebugGroupBegin {
        label: String,
    },
    DebugGroupEnd,
    DebugInsert {
        label: String,
    },
}

/// Captures everything an encoder records, in order.
#[derive(Debug, Default)]
pub struct RecordingContext {
    calls: RefCell<Vec<RecordedCall>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured stream, in the order the encoder issued it.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// How many captured calls satisfy `pred`.
    pub fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl ComputeContext for RecordingContext {
    fn bind_compute_pipeline(&self, _cmd_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(RecordedCall::BindPipeline { pipeline });
    }

    fn update_bindings(
        &self,
        _cmd_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        writes: &[BindingWrite],
    ) {
        self.record(RecordedCall::UpdateBindings {
            writes: writes.to_vec(),
        });
    }

    fn push_constants(
        &self,
        _cmd_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        offset: u32,
        data: &[u8],
    ) {
        self.record(RecordedCall::PushConstants {
            offset,
            data: data.to_vec(),
        });
    }

    fn dispatch(
        &self,
        _cmd_buffer: vk::CommandBuffer,
        group_count: [u32; 3],
        group_size: [u32; 3],
    ) {
        self.record(RecordedCall::Dispatch {
            group_count,
            group_size,
        });
    }

    fn image_barrier(&self, _cmd_buffer: vk::CommandBuffer, barrier: &ImageBarrier) {
        self.record(RecordedCall::ImageBarrier(*barrier));
    }

    fn buffer_barrier(&self, _cmd_buffer: vk::CommandBuffer, barrier: &BufferBarrier) {
        self.record(RecordedCall::BufferBarrier {
            buffer: barrier.buffer,
            offset: barrier.offset,
            size: barrier.size,
        });
    }

    fn end_recording(&self, _cmd_buffer: vk::CommandBuffer) -> Result<(), Error> {
        self.record(RecordedCall::EndRecording);
        Ok(())
    }

    fn debug_group_begin(&self, _cmd_buffer: vk::CommandBuffer, label: &str, _color: [f32; 4]) {
        self.record(RecordedCall::DebugGroupBegin {
            label: label.to_owned(),
        });
    }

    fn debug_group_end(&self, _cmd_buffer: vk::CommandBuffer) {
        self.record(RecordedCall::DebugGroupEnd);
    }

    fn debug_insert_label(&self, _cmd_buffer: vk::CommandBuffer, label: &str, _color: [f32; 4]) {
        self.record(RecordedCall::DebugInsert {
            label: label.to_owned(),
        });
    }
}

/// Resource constructors over fabricated handles, for tests that never
/// touch a real device.
pub mod fixtures {
    use ash::vk;
    use ash::vk::Handle;

    use crate::vulkan::resources::{
        VulkanBuffer, VulkanComputePipeline, VulkanSampler, VulkanTexture,
    };

    pub fn storage_texture(raw: u64) -> VulkanTexture {
        VulkanTexture::new(
            vk::Image::from_raw(raw),
            vk::ImageView::from_raw(raw),
            vk::ImageAspectFlags::COLOR,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    }

    pub fn general_storage_texture(raw: u64) -> VulkanTexture {
        VulkanTexture::new(
            vk::Image::from_raw(raw),
            vk::ImageView::from_raw(raw),
            vk::ImageAspectFlags::COLOR,
            vk::ImageUsageFlags::STORAGE,
            vk::ImageLayout::GENERAL,
        )
    }

    pub fn sampled_texture(raw: u64) -> VulkanTexture {
        VulkanTexture::new(
            vk::Image::from_raw(raw),
            vk::ImageView::from_raw(raw),
            vk::ImageAspectFlags::COLOR,
            vk::ImageUsageFlags::SAMPLED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    }

    pub fn storage_depth_texture(raw: u64) -> VulkanTexture {
        VulkanTexture::new(
            vk::Image::from_raw(raw),
            vk::ImageView::from_raw(raw),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageUsageFlags::STORAGE,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        )
    }

    pub fn storage_buffer(raw: u64, size: vk::DeviceSize) -> VulkanBuffer {
        VulkanBuffer::new(
            vk::Buffer::from_raw(raw),
            vk::BufferUsageFlags::STORAGE_BUFFER,
            size,
        )
    }

    pub fn uniform_buffer(raw: u64, size: vk::DeviceSize) -> VulkanBuffer {
        VulkanBuffer::new(
            vk::Buffer::from_raw(raw),
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            size,
        )
    }

    pub fn sampler(raw: u64) -> VulkanSampler {
        VulkanSampler::new(vk::Sampler::from_raw(raw))
    }

    pub fn pipeline(raw: u64) -> VulkanComputePipeline {
        VulkanComputePipeline::new(
            vk::Pipeline::from_raw(raw),
            vk::PipelineLayout::from_raw(raw),
        )
    }
}
