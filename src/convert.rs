// SPDX-License-Identifier: MPL-2.0

//! Upload of software-decoded pixels into a mapped output image.
//!
//! Output images are always YV12 in the driver's plane order, which stores
//! V before U:
//!
//! | Plane | Frame (YV12 / YUY2)   | Image offset index |
//! |-------|-----------------------|--------------------|
//! | Y     | plane 0 / even bytes  | 0                  |
//! | U     | plane 1 / byte 4k+1   | 2                  |
//! | V     | plane 2 / byte 4k+3   | 1                  |
//!
//! Everything is clipped to the smaller of the frame and the image, so a
//! frame that briefly outgrows its context never writes past the mapping.
//! Rows are copied in parallel.

use rayon::prelude::*;

use crate::error::{Result, VoError};
use crate::frame::{FrameBuffers, PixelFormat};
use crate::va::VaImage;

/// Destination plane of the mapped image.
fn plane_mut<'a>(
    bytes: &'a mut [u8],
    image: &VaImage,
    index: usize,
    rows: usize,
) -> Result<(&'a mut [u8], usize)> {
    let pitch = image.pitches[index] as usize;
    let start = image.offsets[index] as usize;
    if pitch == 0 || start >= bytes.len() {
        return Err(VoError::InvalidInput("image plane outside mapped buffer"));
    }

    let end = (start + pitch * rows).min(bytes.len());
    Ok((&mut bytes[start..end], pitch))
}

fn copy_plane(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    dst_pitch: usize,
    width: usize,
    rows: usize,
) {
    if src_pitch == 0 {
        return;
    }

    dst.par_chunks_mut(dst_pitch)
        .zip(src.par_chunks(src_pitch))
        .take(rows)
        .for_each(|(d, s)| {
            let n = width.min(d.len()).min(s.len());
            d[..n].copy_from_slice(&s[..n]);
        });
}

/// Copy planar 4:2:0 into the image, swapping U and V into the image's order.
///
/// # Errors
///
/// `InvalidInput` when the frame lacks a plane or the image layout does not
/// fit its mapping.
pub fn yv12_to_yv12(
    src: &FrameBuffers,
    width: u32,
    height: u32,
    image: &VaImage,
    bytes: &mut [u8],
) -> Result<()> {
    let (Some(y), Some(u), Some(v)) = (src.planes.first(), src.planes.get(1), src.planes.get(2))
    else {
        return Err(VoError::InvalidInput("YV12 frame without three planes"));
    };

    let src_pitch = |i: usize| src.pitches.get(i).copied().unwrap_or(0);
    let width = width.min(image.width) as usize;
    let height = height.min(image.height) as usize;
    let (chroma_w, chroma_h) = (width.div_ceil(2), height.div_ceil(2));

    let (dst, pitch) = plane_mut(bytes, image, 0, height)?;
    copy_plane(y, src_pitch(0), dst, pitch, width, height);

    let (dst, pitch) = plane_mut(bytes, image, 2, chroma_h)?;
    copy_plane(u, src_pitch(1), dst, pitch, chroma_w, chroma_h);

    let (dst, pitch) = plane_mut(bytes, image, 1, chroma_h)?;
    copy_plane(v, src_pitch(2), dst, pitch, chroma_w, chroma_h);

    Ok(())
}

/// Convert packed 4:2:2 into the image's planar 4:2:0 layout.
///
/// Chroma of each output row pair is taken from the upper source row.
///
/// # Errors
///
/// `InvalidInput` when the frame has no packed plane or the image layout
/// does not fit its mapping.
pub fn yuy2_to_yv12(
    src: &FrameBuffers,
    width: u32,
    height: u32,
    image: &VaImage,
    bytes: &mut [u8],
) -> Result<()> {
    let Some(packed) = src.planes.first() else {
        return Err(VoError::InvalidInput("YUY2 frame without a plane"));
    };
    let src_pitch = src.pitches.first().copied().unwrap_or(0);
    if src_pitch == 0 {
        return Err(VoError::InvalidInput("YUY2 frame with zero pitch"));
    }

    let width = width.min(image.width) as usize;
    let height = height.min(image.height) as usize;
    let (chroma_w, chroma_h) = (width.div_ceil(2), height.div_ceil(2));

    let (dst, pitch) = plane_mut(bytes, image, 0, height)?;
    dst.par_chunks_mut(pitch)
        .zip(packed.par_chunks(src_pitch))
        .take(height)
        .for_each(|(d, s)| {
            for (x, out) in d.iter_mut().take(width).enumerate() {
                if let Some(luma) = s.get(2 * x) {
                    *out = *luma;
                }
            }
        });

    for (index, byte) in [(2, 1), (1, 3)] {
        let (dst, pitch) = plane_mut(bytes, image, index, chroma_h)?;
        dst.par_chunks_mut(pitch)
            .zip(packed.par_chunks(src_pitch).step_by(2))
            .take(chroma_h)
            .for_each(|(d, s)| {
                for (k, out) in d.iter_mut().take(chroma_w).enumerate() {
                    if let Some(chroma) = s.get(4 * k + byte) {
                        *out = *chroma;
                    }
                }
            });
    }

    Ok(())
}

/// Upload a software frame into the mapped bytes of `image`.
///
/// # Errors
///
/// `Unsupported` for hardware frames, otherwise see the conversion routines.
pub fn upload(
    format: PixelFormat,
    src: &FrameBuffers,
    width: u32,
    height: u32,
    image: &VaImage,
    bytes: &mut [u8],
) -> Result<()> {
    match format {
        PixelFormat::Yv12 => yv12_to_yv12(src, width, height, image, bytes),
        PixelFormat::Yuy2 => yuy2_to_yv12(src, width, height, image, bytes),
        PixelFormat::HwSurface => Err(VoError::Unsupported("hardware frame has no pixels")),
    }
}
