//! Non-owning resource handles the encoder records against.
//!
//! Creation and destruction of the underlying Vulkan objects belong to the
//! device layer outside this crate; these types carry the raw handles plus
//! the bookkeeping the compute path consults (storage capability, aspect
//! flags, current layout). Every reference the encoder takes to one of
//! them must outlive the encoding session.

use std::cell::Cell;

use ash::vk;

/// A Vulkan image plus the metadata the compute encoder needs.
///
/// The current layout uses interior mutability: a recording session is
/// confined to one thread, and a transition recorded by the encoder must
/// be visible to later binds of the same image within that session.
#[derive(Debug)]
pub struct VulkanTexture {
    image: vk::Image,
    view: vk::ImageView,
    aspect_mask: vk::ImageAspectFlags,
    usage: vk::ImageUsageFlags,
    layout: Cell<vk::ImageLayout>,
}

impl VulkanTexture {
    pub fn new(
        image: vk::Image,
        view: vk::ImageView,
        aspect_mask: vk::ImageAspectFlags,
        usage: vk::ImageUsageFlags,
        layout: vk::ImageLayout,
    ) -> Self {
        Self {
            image,
            view,
            aspect_mask,
            usage,
            layout: Cell::new(layout),
        }
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    /// Whether the image was created with storage usage.
    pub fn is_storage(&self) -> bool {
        self.usage.contains(vk::ImageUsageFlags::STORAGE)
    }

    /// The layout the image is in as of the last recorded transition.
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout.get()
    }

    pub(crate) fn set_layout(&self, layout: vk::ImageLayout) {
        self.layout.set(layout);
    }
}

/// A Vulkan buffer plus the usage flags the binder checks.
#[derive(Debug)]
pub struct VulkanBuffer {
    buffer: vk::Buffer,
    usage: vk::BufferUsageFlags,
    size: vk::DeviceSize,
}

impl VulkanBuffer {
    pub fn new(buffer: vk::Buffer, usage: vk::BufferUsageFlags, size: vk::DeviceSize) -> Self {
        Self { buffer, usage, size }
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the buffer was created with storage usage.
    pub fn is_storage(&self) -> bool {
        self.usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER)
    }
}

/// A sampler handle carrier.
#[derive(Debug)]
pub struct VulkanSampler {
    sampler: vk::Sampler,
}

impl VulkanSampler {
    pub fn new(sampler: vk::Sampler) -> Self {
        Self { sampler }
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

/// A compiled compute pipeline and the layout its bindings live on.
///
/// Pipeline construction (shader modules, reflection, layout derivation)
/// happens upstream; the encoder only needs the two handles.
#[derive(Debug)]
pub struct VulkanComputePipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl VulkanComputePipeline {
    pub fn new(pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        Self { pipeline, layout }
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}
