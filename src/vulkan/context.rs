//! The native call surface the encoder records through.
//!
//! [`ComputeContext`] is the seam to the command-buffer/context
//! collaborator: the encoder owns the ordering of calls, the context owns
//! how they reach the device. [`AshContext`] is the production
//! implementation; tests drive the encoder against the recording
//! implementation in the `recording` module.

use std::ffi::CString;

use ash::vk;

use crate::error::Error;

use super::convert;

/// One descriptor update for a bound resource, resolved to raw handles.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingWrite {
    StorageImage {
        binding: u32,
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    Sampler {
        binding: u32,
        sampler: vk::Sampler,
    },
    StorageBuffer {
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
}

impl BindingWrite {
    pub fn binding(&self) -> u32 {
        match *self {
            BindingWrite::StorageImage { binding, .. }
            | BindingWrite::Sampler { binding, .. }
            | BindingWrite::StorageBuffer { binding, .. } => binding,
        }
    }
}

/// An image layout transition to record. `old_layout == new_layout`
/// expresses a pure visibility hand-off with no layout change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub aspect_mask: vk::ImageAspectFlags,
}

/// A shader-write to shader-read hand-off on a buffer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

/// Native call surface supplied by the command-buffer/context collaborator.
///
/// The context is assumed to already be inside a recording scope when an
/// encoder is constructed; [`ComputeContext::end_recording`] closes that
/// scope. Descriptor materialization strategy belongs to the context —
/// the encoder only hands over the resolved binding set.
pub trait ComputeContext {
    fn bind_compute_pipeline(&self, cmd_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// Materializes the binding set on descriptor set 0 of `layout`.
    fn update_bindings(
        &self,
        cmd_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        writes: &[BindingWrite],
    );

    fn push_constants(
        &self,
        cmd_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        offset: u32,
        data: &[u8],
    );

    /// Issues the native dispatch. `group_size` is carried for backends
    /// that take it at dispatch time; Vulkan bakes the group size into
    /// the shader, so the ash implementation forwards only `group_count`.
    fn dispatch(&self, cmd_buffer: vk::CommandBuffer, group_count: [u32; 3], group_size: [u32; 3]);

    fn image_barrier(&self, cmd_buffer: vk::CommandBuffer, barrier: &ImageBarrier);

    fn buffer_barrier(&self, cmd_buffer: vk::CommandBuffer, barrier: &BufferBarrier);

    /// Closes the recording scope.
    fn end_recording(&self, cmd_buffer: vk::CommandBuffer) -> Result<(), Error>;

    fn debug_group_begin(&self, cmd_buffer: vk::CommandBuffer, label: &str, color: [f32; 4]);

    fn debug_group_end(&self, cmd_buffer: vk::CommandBuffer);

    fn debug_insert_label(&self, cmd_buffer: vk::CommandBuffer, label: &str, color: [f32; 4]);
}

/// Production context backed by a live `ash::Device`.
///
/// Bindings are materialized with `VK_KHR_push_descriptor`, which keeps
/// descriptor-pool management entirely out of this layer; the device must
/// have been created with that extension enabled. Debug labels go through
/// `VK_EXT_debug_utils` when available and are dropped otherwise.
pub struct AshContext {
    device: ash::Device,
    push_descriptor: ash::khr::push_descriptor::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
}

impl AshContext {
    pub fn new(instance: &ash::Instance, device: ash::Device, with_debug_utils: bool) -> Self {
        let push_descriptor = ash::khr::push_descriptor::Device::new(instance, &device);
        let debug_utils =
            with_debug_utils.then(|| ash::ext::debug_utils::Device::new(instance, &device));
        Self {
            device,
            push_descriptor,
            debug_utils,
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }
}

/// Access mask and pipeline stage implied by an image layout on the
/// compute path.
fn layout_access(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        vk::ImageLayout::GENERAL => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

impl ComputeContext for AshContext {
    fn bind_compute_pipeline(&self, cmd_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd_buffer, vk::PipelineBindPoint::COMPUTE, pipeline);
        }
    }

    fn update_bindings(
        &self,
        cmd_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        writes: &[BindingWrite],
    ) {
        if writes.is_empty() {
            return;
        }

        // All infos are pushed before any descriptor write takes a
        // reference into the arrays.
        let mut image_infos = Vec::with_capacity(writes.len());
        let mut buffer_infos = Vec::with_capacity(writes.len());
        for write in writes {
            match *write {
                BindingWrite::StorageImage { view, layout, .. } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: view,
                        image_layout: layout,
                    });
                }
                BindingWrite::Sampler { sampler, .. } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler,
                        image_view: vk::ImageView::null(),
                        image_layout: vk::ImageLayout::UNDEFINED,
                    });
                }
                BindingWrite::StorageBuffer {
                    buffer,
                    offset,
                    range,
                    ..
                } => {
                    buffer_infos.push(vk::DescriptorBufferInfo {
                        buffer,
                        offset,
                        range,
                    });
                }
            }
        }

        let mut next_image = 0;
        let mut next_buffer = 0;
        let mut descriptor_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let base = vk::WriteDescriptorSet::default().dst_binding(write.binding());
            let descriptor_write = match write {
                BindingWrite::StorageImage { .. } => {
                    let info = &image_infos[next_image];
                    next_image += 1;
                    base.descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                        .image_info(std::slice::from_ref(info))
                }
                BindingWrite::Sampler { .. } => {
                    let info = &image_infos[next_image];
                    next_image += 1;
                    base.descriptor_type(vk::DescriptorType::SAMPLER)
                        .image_info(std::slice::from_ref(info))
                }
                BindingWrite::StorageBuffer { .. } => {
                    let info = &buffer_infos[next_buffer];
                    next_buffer += 1;
                    base.descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                        .buffer_info(std::slice::from_ref(info))
                }
            };
            descriptor_writes.push(descriptor_write);
        }

        unsafe {
            self.push_descriptor.cmd_push_descriptor_set(
                cmd_buffer,
                vk::PipelineBindPoint::COMPUTE,
                layout,
                0,
                &descriptor_writes,
            );
        }
    }

    fn push_constants(
        &self,
        cmd_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                cmd_buffer,
                layout,
                vk::ShaderStageFlags::COMPUTE,
                offset,
                data,
            );
        }
    }

    fn dispatch(
        &self,
        cmd_buffer: vk::CommandBuffer,
        group_count: [u32; 3],
        _group_size: [u32; 3],
    ) {
        unsafe {
            self.device
                .cmd_dispatch(cmd_buffer, group_count[0], group_count[1], group_count[2]);
        }
    }

    fn image_barrier(&self, cmd_buffer: vk::CommandBuffer, barrier: &ImageBarrier) {
        let (src_access_mask, src_stage) = layout_access(barrier.old_layout);
        let (dst_access_mask, dst_stage) = layout_access(barrier.new_layout);

        let vk_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(src_access_mask)
            .dst_access_mask(dst_access_mask)
            .old_layout(barrier.old_layout)
            .new_layout(barrier.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(barrier.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: barrier.aspect_mask,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[vk_barrier],
            );
        }
    }

    fn buffer_barrier(&self, cmd_buffer: vk::CommandBuffer, barrier: &BufferBarrier) {
        let vk_barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(barrier.buffer)
            .offset(barrier.offset)
            .size(barrier.size);

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[vk_barrier],
                &[],
            );
        }
    }

    fn end_recording(&self, cmd_buffer: vk::CommandBuffer) -> Result<(), Error> {
        match unsafe { self.device.end_command_buffer(cmd_buffer) } {
            Ok(()) => Ok(()),
            Err(code) => convert::result_from_vk(code),
        }
    }

    fn debug_group_begin(&self, cmd_buffer: vk::CommandBuffer, label: &str, color: [f32; 4]) {
        if let Some(debug_utils) = &self.debug_utils {
            let Ok(name) = CString::new(label) else {
                return;
            };
            let label_info = vk::DebugUtilsLabelEXT::default()
                .label_name(&name)
                .color(color);
            unsafe {
                debug_utils.cmd_begin_debug_utils_label(cmd_buffer, &label_info);
            }
        }
    }

    fn debug_group_end(&self, cmd_buffer: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(cmd_buffer);
            }
        }
    }

    fn debug_insert_label(&self, cmd_buffer: vk::CommandBuffer, label: &str, color: [f32; 4]) {
        if let Some(debug_utils) = &self.debug_utils {
            let Ok(name) = CString::new(label) else {
                return;
            };
            let label_info = vk::DebugUtilsLabelEXT::default()
                .label_name(&name)
                .color(color);
            unsafe {
                debug_utils.cmd_insert_debug_utils_label(cmd_buffer, &label_info);
            }
        }
    }
}
