//! Translation between the portable vocabulary and Vulkan's.
//!
//! Everything here is a pure mapping — no state, no side effects. The
//! result table is a compatibility contract other components key behavior
//! off; change it and downstream error handling silently breaks.

use ash::vk;

use crate::error::Error;
use crate::types::{CompareFunction, StencilOperation, TextureFormat};

/// Translates a native `vk::Result` into the portable result type.
///
/// Codes in the "optional capability absent" family become
/// [`Error::Unimplemented`]; "driver cannot satisfy" codes become
/// [`Error::Unsupported`]; exhaustion codes become
/// [`Error::ArgumentOutOfRange`] (see [`Error`] for why that coarse
/// mapping is frozen). Any other non-success code becomes
/// [`Error::Runtime`] with the code's symbolic name preserved.
pub fn result_from_vk(value: vk::Result) -> Result<(), Error> {
    match value {
        vk::Result::SUCCESS => Ok(()),

        vk::Result::ERROR_LAYER_NOT_PRESENT
        | vk::Result::ERROR_EXTENSION_NOT_PRESENT
        | vk::Result::ERROR_FEATURE_NOT_PRESENT => Err(Error::Unimplemented(format!("{value:?}"))),

        vk::Result::ERROR_INCOMPATIBLE_DRIVER | vk::Result::ERROR_FORMAT_NOT_SUPPORTED => {
            Err(Error::Unsupported(format!("{value:?}")))
        }

        vk::Result::ERROR_OUT_OF_HOST_MEMORY
        | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
        | vk::Result::ERROR_OUT_OF_POOL_MEMORY
        | vk::Result::ERROR_TOO_MANY_OBJECTS => {
            Err(Error::ArgumentOutOfRange(format!("{value:?}")))
        }

        other => Err(Error::Runtime(format!("{other:?}"))),
    }
}

/// Maps a portable comparison function onto `vk::CompareOp`.
pub fn compare_function_to_vk(value: CompareFunction) -> vk::CompareOp {
    match value {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::AlwaysPass => vk::CompareOp::ALWAYS,
    }
}

/// Maps a portable stencil operation onto `vk::StencilOp`.
pub fn stencil_operation_to_vk(value: StencilOperation) -> vk::StencilOp {
    match value {
        StencilOperation::Keep => vk::StencilOp::KEEP,
        StencilOperation::Zero => vk::StencilOp::ZERO,
        StencilOperation::Replace => vk::StencilOp::REPLACE,
        StencilOperation::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOperation::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOperation::Invert => vk::StencilOp::INVERT,
        StencilOperation::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOperation::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

/// Maps a sample count onto its `vk::SampleCountFlags` bit.
///
/// Counts outside {1, 2, 4, 8, 16, 32, 64} violate the caller contract
/// and panic rather than defaulting to a wrong bit.
pub fn sample_count_to_vk(count: u32) -> vk::SampleCountFlags {
    match count {
        1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        32 => vk::SampleCountFlags::TYPE_32,
        64 => vk::SampleCountFlags::TYPE_64,
        other => panic!("unsupported sample count: {other}"),
    }
}

/// Maps a portable texture format onto `vk::Format`.
pub fn texture_format_to_vk(value: TextureFormat) -> vk::Format {
    match value {
        TextureFormat::Invalid => vk::Format::UNDEFINED,
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
        TextureFormat::Depth24UnormStencil8 => vk::Format::D24_UNORM_S8_UINT,
    }
}
