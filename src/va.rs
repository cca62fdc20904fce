// SPDX-License-Identifier: MPL-2.0

//! Hardware video acceleration display interface.
//!
//! Every call the video output makes into the acceleration driver goes
//! through [`VaDisplay`]. The trait mirrors the batch lifetime model of the
//! underlying API: surfaces are created and destroyed in groups, images are
//! only touched through [`with_mapped`], and nothing here is thread-safe on
//! its own. Callers serialize access through the display lock.
//!
//! ```text
//! decode surfaces (21) ──┐
//!                        ├── vaPutSurface ──► drawable / pixmap
//! output surfaces (2) ───┘        ▲
//!        ▲                        │
//!   image upload            subpicture (OSD)
//! ```

use drm_fourcc::DrmFourcc;

use crate::error::Result;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $inner);
    };
}

handle!(
    /// Hardware surface handle.
    SurfaceId(u32)
);
handle!(
    /// Decode configuration handle.
    ConfigId(u32)
);
handle!(
    /// Decode context handle.
    ContextId(u32)
);
handle!(
    /// Image handle.
    ImageId(u32)
);
handle!(
    /// Backing buffer of an image.
    BufferId(u32)
);
handle!(
    /// Subpicture handle.
    SubpictureId(u32)
);
handle!(
    /// Surface shared with a GL texture.
    GlSurfaceId(u32)
);
handle!(
    /// GL texture name.
    TextureId(u32)
);
handle!(
    /// Window-system drawable.
    Drawable(u64)
);
handle!(
    /// Window-system pixmap.
    PixmapId(u64)
);
handle!(
    /// GL pixmap wrapping a window-system pixmap.
    GlxPixmapId(u64)
);

/// Render target format bit for YUV 4:2:0 surfaces.
pub const RT_FORMAT_YUV420: u32 = 0x0000_0001;

/// Decoding profiles, numbered like the driver API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Profile {
    Mpeg2Simple = 0,
    Mpeg2Main = 1,
    Mpeg4Simple = 2,
    Mpeg4AdvancedSimple = 3,
    Mpeg4Main = 4,
    H264Baseline = 5,
    H264Main = 6,
    H264High = 7,
    Vc1Simple = 8,
    Vc1Main = 9,
    Vc1Advanced = 10,
}

impl Profile {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Profile::Mpeg2Simple => "VAProfileMPEG2Simple",
            Profile::Mpeg2Main => "VAProfileMPEG2Main",
            Profile::Mpeg4Simple => "VAProfileMPEG4Simple",
            Profile::Mpeg4AdvancedSimple => "VAProfileMPEG4AdvancedSimple",
            Profile::Mpeg4Main => "VAProfileMPEG4Main",
            Profile::H264Baseline => "VAProfileH264Baseline",
            Profile::H264Main => "VAProfileH264Main",
            Profile::H264High => "VAProfileH264High",
            Profile::Vc1Simple => "VAProfileVC1Simple",
            Profile::Vc1Main => "VAProfileVC1Main",
            Profile::Vc1Advanced => "VAProfileVC1Advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Entrypoint {
    Vld = 1,
    Izz = 2,
    Idct = 3,
    MoComp = 4,
    Deblocking = 5,
}

impl Entrypoint {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Entrypoint::Vld => "VAEntrypointVLD",
            Entrypoint::Izz => "VAEntrypointIZZ",
            Entrypoint::Idct => "VAEntrypointIDCT",
            Entrypoint::MoComp => "VAEntrypointMoComp",
            Entrypoint::Deblocking => "VAEntrypointDeblocking",
        }
    }
}

/// Rendering state of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Rendering,
    Displaying,
    Ready,
    Skipped,
}

/// Picture structure passed with every put-surface call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFlags {
    Frame,
    TopField,
    BottomField,
}

impl FieldFlags {
    /// Bit value understood by the driver.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            FieldFlags::Frame => 0x0000_0000,
            FieldFlags::TopField => 0x0000_0001,
            FieldFlags::BottomField => 0x0000_0002,
        }
    }
}

/// Source or destination rectangle of a blit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// CPU view description of a hardware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaImage {
    pub id: ImageId,
    pub buf: BufferId,
    pub fourcc: DrmFourcc,
    pub width: u32,
    pub height: u32,
    pub num_planes: usize,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
    pub data_size: usize,
}

/// Adjustable display attribute kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAttribKind {
    Brightness,
    Contrast,
    Hue,
    Saturation,
    BackgroundColor,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttribute {
    pub kind: DisplayAttribKind,
    pub min: i32,
    pub max: i32,
    pub value: i32,
}

/// Destination of a put-surface call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutTarget {
    Drawable(Drawable),
    Pixmap(PixmapId),
}

/// Connection to the acceleration driver.
///
/// Release calls never fail: the driver API reports nothing useful on
/// destruction and the video output has no way to recover from it anyway.
pub trait VaDisplay: Send {
    /// Initialize the connection, returning the API version.
    fn initialize(&mut self) -> Result<(i32, i32)>;
    fn terminate(&mut self);
    fn vendor(&self) -> String;

    fn set_background_color(&mut self, argb: u32) -> Result<()>;

    fn create_surfaces(
        &mut self,
        width: u32,
        height: u32,
        rt_format: u32,
        count: usize,
    ) -> Result<Vec<SurfaceId>>;
    fn destroy_surfaces(&mut self, surfaces: &[SurfaceId]);
    fn query_surface_status(&mut self, surface: SurfaceId) -> Result<SurfaceStatus>;

    fn supports_profile(&self, profile: Profile) -> bool;
    /// Render target formats supported for the profile and entrypoint.
    fn rt_format_attribute(&mut self, profile: Profile, entrypoint: Entrypoint) -> Result<u32>;
    fn create_config(
        &mut self,
        profile: Profile,
        entrypoint: Entrypoint,
        rt_format: u32,
    ) -> Result<ConfigId>;
    fn destroy_config(&mut self, config: ConfigId);
    fn create_context(
        &mut self,
        config: ConfigId,
        width: u32,
        height: u32,
        surfaces: &[SurfaceId],
    ) -> Result<ContextId>;
    fn destroy_context(&mut self, context: ContextId);

    fn query_image_formats(&mut self) -> Result<Vec<DrmFourcc>>;
    /// Map the surface memory directly as an image.
    fn derive_image(&mut self, surface: SurfaceId) -> Result<VaImage>;
    fn create_image(&mut self, fourcc: DrmFourcc, width: u32, height: u32) -> Result<VaImage>;
    fn destroy_image(&mut self, image: ImageId);
    /// Map the buffer, run `f` over its bytes and unmap it again.
    fn map_buffer(&mut self, buf: BufferId, f: &mut dyn FnMut(&mut [u8])) -> Result<()>;
    fn put_image(&mut self, surface: SurfaceId, image: &VaImage, src: Rect, dst: Rect)
    -> Result<()>;

    fn query_subpicture_formats(&mut self) -> Result<Vec<DrmFourcc>>;
    fn create_subpicture(&mut self, image: ImageId) -> Result<SubpictureId>;
    fn destroy_subpicture(&mut self, subpicture: SubpictureId);
    fn associate_subpicture(
        &mut self,
        subpicture: SubpictureId,
        targets: &[SurfaceId],
        src: Rect,
        dst: Rect,
    ) -> Result<()>;
    fn deassociate_subpicture(&mut self, subpicture: SubpictureId, targets: &[SurfaceId]);

    fn query_display_attributes(&mut self) -> Result<Vec<DisplayAttribute>>;

    fn put_surface(
        &mut self,
        surface: SurfaceId,
        target: PutTarget,
        src: Rect,
        dst: Rect,
        field: FieldFlags,
    ) -> Result<()>;

    fn create_surface_glx(&mut self, texture: TextureId) -> Result<GlSurfaceId>;
    fn copy_surface_glx(
        &mut self,
        gl_surface: GlSurfaceId,
        surface: SurfaceId,
        field: FieldFlags,
    ) -> Result<()>;
    fn destroy_surface_glx(&mut self, gl_surface: GlSurfaceId);
}

/// Run `f` over the mapped bytes of `buf`, unmapping afterwards.
///
/// # Errors
///
/// Returns the driver's mapping error; `f` is not called in that case.
pub fn with_mapped<R>(
    display: &mut dyn VaDisplay,
    buf: BufferId,
    f: impl FnOnce(&mut [u8]) -> R,
) -> Result<R> {
    let mut f = Some(f);
    let mut out = None;
    display.map_buffer(buf, &mut |bytes| {
        if let Some(f) = f.take() {
            out = Some(f(bytes));
        }
    })?;

    out.ok_or(crate::error::VoError::MappingFailure { call: "vaMapBuffer" })
}
