// SPDX-License-Identifier: MPL-2.0

//! Frames handed from the decoder to the video output.
//!
//! A frame is either backed by a decode surface (the decoder wrote the
//! picture straight into hardware) or carries CPU planes that the upload
//! stage converts into an output surface:
//!
//! | Format         | CPU planes                  | Pitches                          |
//! |----------------|-----------------------------|----------------------------------|
//! | `HwSurface`    | none                        | -                                |
//! | `Yv12`         | Y, U, V (4:2:0)             | `8*((w+7)/8)`, `8*((w+15)/16)` x2 |
//! | `Yuy2`         | packed Y0 U Y1 V (4:2:2)    | `8*((w+3)/4)`                    |

use std::sync::Arc;

use drm_fourcc::DrmFourcc;

use crate::context::ContextInfo;
use crate::error::Result;
use crate::surface_pool::FrameSlot;
use crate::va::{Profile, SurfaceId};

/// Pixel layout tag of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Picture lives in a decode surface.
    HwSurface,
    /// Planar 4:2:0, Y then U then V.
    Yv12,
    /// Packed 4:2:2.
    Yuy2,
}

impl PixelFormat {
    /// Matching four character code, where one exists.
    #[must_use]
    pub fn fourcc(self) -> Option<DrmFourcc> {
        match self {
            PixelFormat::HwSurface => None,
            PixelFormat::Yv12 => Some(DrmFourcc::Yvu420),
            PixelFormat::Yuy2 => Some(DrmFourcc::Yuyv),
        }
    }

    #[must_use]
    pub fn is_software(self) -> bool {
        !matches!(self, PixelFormat::HwSurface)
    }
}

/// CPU planes of a software frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffers {
    pub planes: Vec<Vec<u8>>,
    pub pitches: Vec<usize>,
}

impl FrameBuffers {
    /// Allocate zeroed planes for a software format.
    #[must_use]
    pub fn allocate(format: PixelFormat, width: u32, height: u32) -> Option<Self> {
        let (w, h) = (width as usize, height as usize);
        match format {
            PixelFormat::HwSurface => None,
            PixelFormat::Yv12 => {
                let luma = 8 * w.div_ceil(8);
                let chroma = 8 * ((w + 15) / 16);
                let chroma_rows = h.div_ceil(2);
                Some(Self {
                    planes: vec![
                        vec![0; luma * h],
                        vec![0; chroma * chroma_rows],
                        vec![0; chroma * chroma_rows],
                    ],
                    pitches: vec![luma, chroma, chroma],
                })
            }
            PixelFormat::Yuy2 => {
                let pitch = 8 * w.div_ceil(4);
                Some(Self {
                    planes: vec![vec![0; pitch * h]],
                    pitches: vec![pitch],
                })
            }
        }
    }
}

/// Crop margins in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// Hardware image formats a decoder may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwImageFormat {
    Mpeg2,
    Mpeg2Idct,
    Mpeg2MoComp,
    Mpeg4,
    H263,
    H264,
    Wmv3,
    Vc1,
}

/// Decoder-side pixel format of an accelerated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderPixFmt {
    VaapiVld,
    VaapiIdct,
    VaapiMoComp,
}

/// Decoder codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Mpeg2Video,
    Mpeg4,
    H263,
    H264,
    Wmv3,
    Vc1,
}

const CONVERSION_MAP: &[(HwImageFormat, DecoderPixFmt, CodecId)] = &[
    (HwImageFormat::Mpeg2, DecoderPixFmt::VaapiVld, CodecId::Mpeg2Video),
    (HwImageFormat::Mpeg2Idct, DecoderPixFmt::VaapiIdct, CodecId::Mpeg2Video),
    (HwImageFormat::Mpeg2MoComp, DecoderPixFmt::VaapiMoComp, CodecId::Mpeg2Video),
    (HwImageFormat::Mpeg4, DecoderPixFmt::VaapiVld, CodecId::Mpeg4),
    (HwImageFormat::H263, DecoderPixFmt::VaapiVld, CodecId::H263),
    (HwImageFormat::H264, DecoderPixFmt::VaapiVld, CodecId::H264),
    (HwImageFormat::Wmv3, DecoderPixFmt::VaapiVld, CodecId::Wmv3),
    (HwImageFormat::Vc1, DecoderPixFmt::VaapiVld, CodecId::Vc1),
];

impl HwImageFormat {
    #[must_use]
    pub fn from_decoder(pix_fmt: DecoderPixFmt, codec: CodecId) -> Option<Self> {
        CONVERSION_MAP
            .iter()
            .find(|(_, p, c)| *p == pix_fmt && *c == codec)
            .map(|(fmt, _, _)| *fmt)
    }

    /// Candidate profiles, most capable first.
    #[must_use]
    pub fn profiles(self, mpeg2_software_decode: bool) -> &'static [Profile] {
        match self {
            HwImageFormat::Mpeg2 | HwImageFormat::Mpeg2Idct | HwImageFormat::Mpeg2MoComp => {
                if mpeg2_software_decode {
                    &[]
                } else {
                    &[Profile::Mpeg2Main, Profile::Mpeg2Simple]
                }
            }
            HwImageFormat::Mpeg4 | HwImageFormat::H263 => &[
                Profile::Mpeg4Main,
                Profile::Mpeg4AdvancedSimple,
                Profile::Mpeg4Simple,
            ],
            HwImageFormat::H264 => &[Profile::H264High, Profile::H264Main, Profile::H264Baseline],
            HwImageFormat::Wmv3 => &[Profile::Vc1Main, Profile::Vc1Simple],
            HwImageFormat::Vc1 => &[Profile::Vc1Advanced],
        }
    }
}

/// Hardware entry points a frame carries for its decoder.
pub trait Accelerator: Send + Sync {
    /// Build (or reuse) the hardware context for a decode profile.
    ///
    /// # Errors
    ///
    /// Fails when the context cannot be created; the video output then
    /// renders frames as unsupported until the next successful request.
    fn init(&self, profile: Profile, width: u32, height: u32) -> Result<()>;

    /// Pick the decode profile for a decoder pixel format and codec.
    fn profile_from_imgfmt(
        &self,
        pix_fmt: DecoderPixFmt,
        codec: CodecId,
        mpeg2_software_decode: bool,
    ) -> Option<Profile>;

    /// Snapshot of the live hardware context.
    fn get_context(&self) -> ContextInfo;
}

/// Per-frame accelerator handle.
#[derive(Clone)]
pub struct AccelHandle {
    pub slot: FrameSlot,
    pub accelerator: Arc<dyn Accelerator>,
}

impl AccelHandle {
    /// Decode surface currently bound to this frame.
    #[must_use]
    pub fn surface(&self) -> Option<SurfaceId> {
        self.accelerator
            .get_context()
            .decode_surfaces
            .get(self.slot.0)
            .copied()
    }
}

impl std::fmt::Debug for AccelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelHandle")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// A decoded picture on its way to the screen.
#[derive(Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub ratio: f64,
    pub crop: Crop,
    pub progressive: bool,
    pub top_field_first: bool,
    pub flags: u32,
    pub buffers: Option<FrameBuffers>,
    pub accel: AccelHandle,
}

impl Frame {
    pub(crate) fn new(accel: AccelHandle) -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::HwSurface,
            ratio: 0.0,
            crop: Crop::default(),
            progressive: true,
            top_field_first: false,
            flags: 0,
            buffers: None,
            accel,
        }
    }

    #[must_use]
    pub fn slot(&self) -> FrameSlot {
        self.accel.slot
    }

    #[must_use]
    pub fn is_interlaced(&self) -> bool {
        !self.progressive
    }
}
