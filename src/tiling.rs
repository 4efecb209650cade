//! Coordinate maps between logical tensors and the NPU's tiled layouts.
//!
//! Weights are stored kernel-major in groups (16 kernels for float16, 32
//! for int8) with the channel dimension split into 32-wide blocks. Feature
//! maps are stored as channel planes of a fixed width `C2` (atoms per
//! entry), with the plane-local channel innermost. Both maps take 1-based
//! coordinates, matching how the layouts were reverse engineered, and both
//! are bijections over their valid ranges.
//!
//! Element offsets are returned, not byte offsets; callers scale by the
//! element size.

use crate::err::NpuError;

/// Element offset of weight `[kernel k, channel c]` in the tiled layout.
///
/// `kernel_group` is 16 for float16 weights and 32 for int8 weights.
/// Coordinates are 1-based.
pub fn weight_offset(
    channels: u32,
    kernels: u32,
    kernel_group: u32,
    k: u32,
    c: u32,
) -> Result<usize, NpuError> {
    if k == 0 || k > kernels {
        return Err(NpuError::Coordinate("weight kernel index"));
    }
    if c == 0 || c > channels {
        return Err(NpuError::Coordinate("weight channel index"));
    }
    let k = k - 1;
    let c = c - 1;
    let offset = (c / 32) * 32 * kernel_group
        + (k / kernel_group) * kernel_group * channels
        + c % 32
        + (k % kernel_group) * 32;
    Ok(offset as usize)
}

/// Element offset of feature element `[channel c, row h, column w]` in the
/// planar layout with `plane_channels` (`C2`) channels per plane.
///
/// `C2` is 8 for float16 input, 16 for int8 input, 4 when reading back
/// 4-byte output atoms and 8 for narrow float16 output. Coordinates are
/// 1-based.
pub fn feature_offset(
    channels: u32,
    height: u32,
    width: u32,
    plane_channels: u32,
    c: u32,
    h: u32,
    w: u32,
) -> Result<usize, NpuError> {
    if c == 0 || c > channels {
        return Err(NpuError::Coordinate("feature channel index"));
    }
    if h == 0 || h > height {
        return Err(NpuError::Coordinate("feature row index"));
    }
    if w == 0 || w > width {
        return Err(NpuError::Coordinate("feature column index"));
    }
    let plane = (c - 1) / plane_channels;
    let offset = plane * height * width * plane_channels
        + plane_channels * ((h - 1) * width + (w - 1))
        + (c - 1) % plane_channels;
    Ok(offset as usize)
}
