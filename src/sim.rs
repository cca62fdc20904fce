// SPDX-License-Identifier: MPL-2.0

//! In-memory acceleration driver and window system.
//!
//! Backs the demo binary and the test-suite. Both handles are cheap to clone
//! and share their state, so a test can keep one clone for inspection and
//! hand the other to the driver. Every failure path of the video output can
//! be provoked through the `fail_*` switches of the state structs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drm_fourcc::DrmFourcc;

use crate::error::{
    Result, VA_STATUS_ERROR_ALLOCATION_FAILED, VA_STATUS_ERROR_INVALID_IMAGE,
    VA_STATUS_ERROR_INVALID_SURFACE, VA_STATUS_ERROR_OPERATION_FAILED,
    VA_STATUS_ERROR_UNKNOWN, VA_STATUS_ERROR_UNSUPPORTED_PROFILE, VA_STATUS_SUCCESS, VaStatus,
    VoError,
};
use crate::va::{
    BufferId, ConfigId, ContextId, DisplayAttribKind, DisplayAttribute, Drawable, Entrypoint,
    FieldFlags, GlSurfaceId, GlxPixmapId, ImageId, PixmapId, Profile, PutTarget, RT_FORMAT_YUV420,
    Rect, SubpictureId, SurfaceId, SurfaceStatus, TextureId, VaDisplay, VaImage,
};
use crate::window::{FbConfig, GlRenderer, WindowSystem};

const BAD_MATCH: u8 = 8;
const BAD_DRAWABLE: u8 = 9;

fn fail<T>(status: VaStatus, call: &'static str) -> Result<T> {
    Err(VoError::Status { call, status })
}

fn align16(v: u32) -> u32 {
    (v + 15) & !15
}

/// One recorded put-surface call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutRecord {
    pub surface: SurfaceId,
    pub target: PutTarget,
    pub src: Rect,
    pub dst: Rect,
    pub field: FieldFlags,
}

#[derive(Debug, Clone)]
struct SimImage {
    info: VaImage,
    derived_from: Option<SurfaceId>,
}

#[derive(Debug)]
pub struct DisplayState {
    next_id: u32,
    surfaces: HashMap<SurfaceId, (u32, u32)>,
    images: HashMap<ImageId, SimImage>,
    buffers: HashMap<BufferId, Vec<u8>>,
    configs: HashSet<ConfigId>,
    contexts: HashMap<ContextId, (u32, u32)>,
    subpictures: HashMap<SubpictureId, ImageId>,
    associations: HashMap<SubpictureId, Vec<SurfaceId>>,
    gl_surfaces: HashSet<GlSurfaceId>,

    pub vendor: String,
    pub profiles: Vec<Profile>,
    pub rt_formats: u32,
    pub derive_supported: bool,
    pub image_formats: Vec<DrmFourcc>,
    pub subpicture_formats: Vec<DrmFourcc>,
    pub display_attributes: Vec<DisplayAttribute>,
    /// Maximum number of live surfaces.
    pub surface_budget: Option<usize>,
    pub not_ready: HashSet<SurfaceId>,

    pub fail_initialize: bool,
    pub fail_context: bool,
    pub fail_map: bool,
    pub fail_associate: bool,
    pub fail_put_surface: bool,

    pub initialized: bool,
    pub initialize_calls: usize,
    pub terminate_calls: usize,
    pub background_color: Option<u32>,
    pub puts: Vec<PutRecord>,
    pub glx_copies: Vec<(GlSurfaceId, SurfaceId, FieldFlags)>,
    pub put_images: usize,
    pub maps: usize,
    pub status_queries: usize,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            next_id: 0x0400_0000,
            surfaces: HashMap::new(),
            images: HashMap::new(),
            buffers: HashMap::new(),
            configs: HashSet::new(),
            contexts: HashMap::new(),
            subpictures: HashMap::new(),
            associations: HashMap::new(),
            gl_surfaces: HashSet::new(),
            vendor: String::from("Intel i965 driver for Intel(R) Simulated - 2.4.1"),
            profiles: vec![
                Profile::Mpeg2Simple,
                Profile::Mpeg2Main,
                Profile::H264Main,
                Profile::H264High,
                Profile::Vc1Simple,
                Profile::Vc1Main,
                Profile::Vc1Advanced,
            ],
            rt_formats: RT_FORMAT_YUV420,
            derive_supported: true,
            image_formats: vec![DrmFourcc::Nv12, DrmFourcc::Yvu420, DrmFourcc::Yuyv],
            subpicture_formats: vec![DrmFourcc::Argb8888],
            display_attributes: vec![
                attribute(DisplayAttribKind::Brightness, -100, 100, 0),
                attribute(DisplayAttribKind::Contrast, 0, 200, 100),
                attribute(DisplayAttribKind::Hue, -180, 180, 0),
                attribute(DisplayAttribKind::Saturation, 0, 200, 100),
                attribute(DisplayAttribKind::BackgroundColor, 0, 0x00ff_ffff, 0),
            ],
            surface_budget: None,
            not_ready: HashSet::new(),
            fail_initialize: false,
            fail_context: false,
            fail_map: false,
            fail_associate: false,
            fail_put_surface: false,
            initialized: false,
            initialize_calls: 0,
            terminate_calls: 0,
            background_color: None,
            puts: Vec::new(),
            glx_copies: Vec::new(),
            put_images: 0,
            maps: 0,
            status_queries: 0,
        }
    }
}

fn attribute(kind: DisplayAttribKind, min: i32, max: i32, value: i32) -> DisplayAttribute {
    DisplayAttribute {
        kind,
        min,
        max,
        value,
    }
}

impl DisplayState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn live_configs(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn live_subpictures(&self) -> usize {
        self.subpictures.len()
    }

    #[must_use]
    pub fn live_gl_surfaces(&self) -> usize {
        self.gl_surfaces.len()
    }

    /// Surfaces the subpicture is currently associated with.
    #[must_use]
    pub fn associated_surfaces(&self) -> Vec<SurfaceId> {
        self.associations.values().flatten().copied().collect()
    }

    /// Bytes and geometry of the image backing the live subpicture.
    #[must_use]
    pub fn subpicture_image(&self) -> Option<(VaImage, Vec<u8>)> {
        let image = self.subpictures.values().next()?;
        let image = self.images.get(image)?;
        let bytes = self.buffers.get(&image.info.buf)?;
        Some((image.info.clone(), bytes.clone()))
    }

    /// Bytes of the image derived from `surface`, if any.
    #[must_use]
    pub fn derived_bytes(&self, surface: SurfaceId) -> Option<&[u8]> {
        let image = self
            .images
            .values()
            .find(|image| image.derived_from == Some(surface))?;
        self.buffers.get(&image.info.buf).map(Vec::as_slice)
    }

    /// Bytes of the most recently created image.
    #[must_use]
    pub fn latest_image_bytes(&self) -> Option<&[u8]> {
        let image = self.images.values().max_by_key(|image| image.info.id)?;
        self.buffers.get(&image.info.buf).map(Vec::as_slice)
    }

    fn new_image(
        &mut self,
        fourcc: DrmFourcc,
        width: u32,
        height: u32,
        derived_from: Option<SurfaceId>,
    ) -> Result<VaImage> {
        let (num_planes, pitches, offsets, data_size) = match fourcc {
            DrmFourcc::Yvu420 => {
                let luma = align16(width);
                let chroma = align16(width.div_ceil(2));
                let chroma_rows = height.div_ceil(2);
                let v = luma * height;
                let u = v + chroma * chroma_rows;
                (
                    3,
                    [luma, chroma, chroma],
                    [0, v, u],
                    (u + chroma * chroma_rows) as usize,
                )
            }
            DrmFourcc::Yuyv => {
                let pitch = align16(width * 2);
                (1, [pitch, 0, 0], [0, 0, 0], (pitch * height) as usize)
            }
            DrmFourcc::Argb8888 => {
                let pitch = width * 4;
                (1, [pitch, 0, 0], [0, 0, 0], (pitch * height) as usize)
            }
            _ => {
                return fail(VA_STATUS_ERROR_INVALID_IMAGE, "vaCreateImage");
            }
        };

        let id = ImageId(self.next());
        let buf = BufferId(self.next());
        let info = VaImage {
            id,
            buf,
            fourcc,
            width,
            height,
            num_planes,
            pitches,
            offsets,
            data_size,
        };
        // Driver memory starts out dirty.
        self.buffers.insert(buf, vec![0xa5; data_size]);
        self.images.insert(
            id,
            SimImage {
                info: info.clone(),
                derived_from,
            },
        );
        Ok(info)
    }
}

/// Simulated acceleration driver connection.
#[derive(Debug, Clone, Default)]
pub struct SimDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl SimDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VaDisplay for SimDisplay {
    fn initialize(&mut self) -> Result<(i32, i32)> {
        let mut state = self.state();
        if state.fail_initialize {
            return fail(VA_STATUS_ERROR_UNKNOWN, "vaInitialize");
        }
        state.initialized = true;
        state.initialize_calls += 1;
        Ok((0, 32))
    }

    fn terminate(&mut self) {
        let mut state = self.state();
        state.initialized = false;
        state.terminate_calls += 1;
    }

    fn vendor(&self) -> String {
        self.state().vendor.clone()
    }

    fn set_background_color(&mut self, argb: u32) -> Result<()> {
        self.state().background_color = Some(argb);
        VoError::check(VA_STATUS_SUCCESS, "vaSetDisplayAttributes")
    }

    fn create_surfaces(
        &mut self,
        width: u32,
        height: u32,
        rt_format: u32,
        count: usize,
    ) -> Result<Vec<SurfaceId>> {
        let mut state = self.state();
        if width == 0 || height == 0 || rt_format & state.rt_formats == 0 {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaCreateSurfaces");
        }
        if state
            .surface_budget
            .is_some_and(|budget| state.surfaces.len() + count > budget)
        {
            return fail(VA_STATUS_ERROR_ALLOCATION_FAILED, "vaCreateSurfaces");
        }

        let surfaces: Vec<_> = (0..count).map(|_| SurfaceId(state.next())).collect();
        for surface in &surfaces {
            state.surfaces.insert(*surface, (width, height));
        }
        Ok(surfaces)
    }

    fn destroy_surfaces(&mut self, surfaces: &[SurfaceId]) {
        let mut state = self.state();
        for surface in surfaces {
            state.surfaces.remove(surface);
            state.not_ready.remove(surface);
        }
    }

    fn query_surface_status(&mut self, surface: SurfaceId) -> Result<SurfaceStatus> {
        let mut state = self.state();
        state.status_queries += 1;
        if !state.surfaces.contains_key(&surface) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaQuerySurfaceStatus");
        }
        if state.not_ready.contains(&surface) {
            Ok(SurfaceStatus::Rendering)
        } else {
            Ok(SurfaceStatus::Ready)
        }
    }

    fn supports_profile(&self, profile: Profile) -> bool {
        self.state().profiles.contains(&profile)
    }

    fn rt_format_attribute(&mut self, profile: Profile, entrypoint: Entrypoint) -> Result<u32> {
        let state = self.state();
        if !state.profiles.contains(&profile) || entrypoint != Entrypoint::Vld {
            return fail(VA_STATUS_ERROR_UNSUPPORTED_PROFILE, "vaGetConfigAttributes");
        }
        Ok(state.rt_formats)
    }

    fn create_config(
        &mut self,
        profile: Profile,
        entrypoint: Entrypoint,
        rt_format: u32,
    ) -> Result<ConfigId> {
        let mut state = self.state();
        if !state.profiles.contains(&profile) || entrypoint != Entrypoint::Vld {
            return fail(VA_STATUS_ERROR_UNSUPPORTED_PROFILE, "vaCreateConfig");
        }
        if rt_format & state.rt_formats == 0 {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaCreateConfig");
        }
        let config = ConfigId(state.next());
        state.configs.insert(config);
        Ok(config)
    }

    fn destroy_config(&mut self, config: ConfigId) {
        self.state().configs.remove(&config);
    }

    fn create_context(
        &mut self,
        config: ConfigId,
        width: u32,
        height: u32,
        surfaces: &[SurfaceId],
    ) -> Result<ContextId> {
        let mut state = self.state();
        if state.fail_context || !state.configs.contains(&config) {
            return fail(VA_STATUS_ERROR_ALLOCATION_FAILED, "vaCreateContext");
        }
        if surfaces.iter().any(|s| !state.surfaces.contains_key(s)) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaCreateContext");
        }
        let context = ContextId(state.next());
        state.contexts.insert(context, (width, height));
        Ok(context)
    }

    fn destroy_context(&mut self, context: ContextId) {
        self.state().contexts.remove(&context);
    }

    fn query_image_formats(&mut self) -> Result<Vec<DrmFourcc>> {
        Ok(self.state().image_formats.clone())
    }

    fn derive_image(&mut self, surface: SurfaceId) -> Result<VaImage> {
        let mut state = self.state();
        if !state.derive_supported {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaDeriveImage");
        }
        let Some(&(width, height)) = state.surfaces.get(&surface) else {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaDeriveImage");
        };
        state.new_image(DrmFourcc::Yvu420, width, height, Some(surface))
    }

    fn create_image(&mut self, fourcc: DrmFourcc, width: u32, height: u32) -> Result<VaImage> {
        let mut state = self.state();
        if !state.image_formats.contains(&fourcc) && !state.subpicture_formats.contains(&fourcc) {
            return fail(VA_STATUS_ERROR_INVALID_IMAGE, "vaCreateImage");
        }
        state.new_image(fourcc, width, height, None)
    }

    fn destroy_image(&mut self, image: ImageId) {
        let mut state = self.state();
        if let Some(image) = state.images.remove(&image) {
            state.buffers.remove(&image.info.buf);
        }
    }

    fn map_buffer(&mut self, buf: BufferId, f: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        let mut state = self.state();
        if state.fail_map {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaMapBuffer");
        }
        state.maps += 1;
        let Some(bytes) = state.buffers.get_mut(&buf) else {
            return fail(VA_STATUS_ERROR_INVALID_IMAGE, "vaMapBuffer");
        };
        f(bytes);
        Ok(())
    }

    fn put_image(
        &mut self,
        surface: SurfaceId,
        image: &VaImage,
        _src: Rect,
        _dst: Rect,
    ) -> Result<()> {
        let mut state = self.state();
        if !state.surfaces.contains_key(&surface) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaPutImage");
        }
        if !state.images.contains_key(&image.id) {
            return fail(VA_STATUS_ERROR_INVALID_IMAGE, "vaPutImage");
        }
        state.put_images += 1;
        Ok(())
    }

    fn query_subpicture_formats(&mut self) -> Result<Vec<DrmFourcc>> {
        Ok(self.state().subpicture_formats.clone())
    }

    fn create_subpicture(&mut self, image: ImageId) -> Result<SubpictureId> {
        let mut state = self.state();
        if !state.images.contains_key(&image) {
            return fail(VA_STATUS_ERROR_INVALID_IMAGE, "vaCreateSubpicture");
        }
        let subpicture = SubpictureId(state.next());
        state.subpictures.insert(subpicture, image);
        Ok(subpicture)
    }

    fn destroy_subpicture(&mut self, subpicture: SubpictureId) {
        let mut state = self.state();
        state.subpictures.remove(&subpicture);
        state.associations.remove(&subpicture);
    }

    fn associate_subpicture(
        &mut self,
        subpicture: SubpictureId,
        targets: &[SurfaceId],
        _src: Rect,
        _dst: Rect,
    ) -> Result<()> {
        let mut state = self.state();
        if state.fail_associate || !state.subpictures.contains_key(&subpicture) {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaAssociateSubpicture");
        }
        if targets.iter().any(|s| !state.surfaces.contains_key(s)) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaAssociateSubpicture");
        }
        state.associations.insert(subpicture, targets.to_vec());
        Ok(())
    }

    fn deassociate_subpicture(&mut self, subpicture: SubpictureId, _targets: &[SurfaceId]) {
        self.state().associations.remove(&subpicture);
    }

    fn query_display_attributes(&mut self) -> Result<Vec<DisplayAttribute>> {
        Ok(self.state().display_attributes.clone())
    }

    fn put_surface(
        &mut self,
        surface: SurfaceId,
        target: PutTarget,
        src: Rect,
        dst: Rect,
        field: FieldFlags,
    ) -> Result<()> {
        let mut state = self.state();
        if state.fail_put_surface {
            return fail(VA_STATUS_ERROR_OPERATION_FAILED, "vaPutSurface");
        }
        if !state.surfaces.contains_key(&surface) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaPutSurface");
        }
        state.puts.push(PutRecord {
            surface,
            target,
            src,
            dst,
            field,
        });
        Ok(())
    }

    fn create_surface_glx(&mut self, _texture: TextureId) -> Result<GlSurfaceId> {
        let mut state = self.state();
        let gl_surface = GlSurfaceId(state.next());
        state.gl_surfaces.insert(gl_surface);
        Ok(gl_surface)
    }

    fn copy_surface_glx(
        &mut self,
        gl_surface: GlSurfaceId,
        surface: SurfaceId,
        field: FieldFlags,
    ) -> Result<()> {
        let mut state = self.state();
        if !state.gl_surfaces.contains(&gl_surface) || !state.surfaces.contains_key(&surface) {
            return fail(VA_STATUS_ERROR_INVALID_SURFACE, "vaCopySurfaceGLX");
        }
        state.glx_copies.push((gl_surface, surface, field));
        Ok(())
    }

    fn destroy_surface_glx(&mut self, gl_surface: GlSurfaceId) {
        self.state().gl_surfaces.remove(&gl_surface);
    }
}

/// One recorded textured quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub texture: TextureId,
    pub dst: Rect,
    pub extent: (f32, f32),
}

#[derive(Debug)]
pub struct WindowState {
    next_id: u64,
    pixmaps: HashSet<PixmapId>,
    glx_pixmaps: HashSet<GlxPixmapId>,
    textures: HashSet<TextureId>,

    pub window_size: (u32, u32),
    pub renderer: Option<GlRenderer>,
    pub gl_extensions: String,
    pub glx_extensions: String,
    pub entry_points: Vec<String>,
    pub fbconfig_depths: Vec<u32>,

    pub fail_gl_context: bool,
    pub fail_glx_pixmap: bool,
    pub fail_bind_tex_image: bool,
    pub fail_texture: bool,

    pub gl_context: Option<Drawable>,
    pub bound_pixmap: Option<GlxPixmapId>,
    pub viewport: Option<(u32, u32)>,
    pub quads: Vec<Quad>,
    pub clears: usize,
    pub swaps: usize,
    pub syncs: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            next_id: 0x0060_0000,
            pixmaps: HashSet::new(),
            glx_pixmaps: HashSet::new(),
            textures: HashSet::new(),
            window_size: (1280, 720),
            renderer: Some(GlRenderer {
                renderer: String::from("Mesa Intel(R) Simulated Graphics"),
                direct: true,
            }),
            gl_extensions: String::from(
                "GL_ARB_texture_non_power_of_two GL_ARB_fragment_program GL_EXT_bgra",
            ),
            glx_extensions: String::from(
                "GLX_ARB_multisample GLX_EXT_texture_from_pixmap GLX_SGI_swap_control",
            ),
            entry_points: [
                "glGenTextures",
                "glBindTexture",
                "glXBindTexImageEXT",
                "glXReleaseTexImageEXT",
                "glXCreatePixmap",
                "glXDestroyPixmap",
                "glGenProgramsARB",
            ]
            .iter()
            .map(|name| String::from(*name))
            .collect(),
            fbconfig_depths: vec![24, 32],
            fail_gl_context: false,
            fail_glx_pixmap: false,
            fail_bind_tex_image: false,
            fail_texture: false,
            gl_context: None,
            bound_pixmap: None,
            viewport: None,
            quads: Vec::new(),
            clears: 0,
            swaps: 0,
            syncs: 0,
        }
    }
}

impl WindowState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Pixmaps, GL pixmaps and textures still alive.
    #[must_use]
    pub fn live_gl_resources(&self) -> usize {
        self.pixmaps.len() + self.glx_pixmaps.len() + self.textures.len()
    }
}

/// Simulated window-system connection.
#[derive(Debug, Clone, Default)]
pub struct SimWindow {
    state: Arc<Mutex<WindowState>>,
}

impl SimWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WindowSystem for SimWindow {
    fn drawable_size(&self, _drawable: Drawable) -> (u32, u32) {
        self.state().window_size
    }

    fn sync(&mut self) {
        self.state().syncs += 1;
    }

    fn probe_renderer(&mut self) -> Option<GlRenderer> {
        self.state().renderer.clone()
    }

    fn create_gl_context(&mut self, drawable: Drawable) -> Result<()> {
        let mut state = self.state();
        if state.fail_gl_context {
            return Err(VoError::DisplayProtocolError {
                call: "glXCreateContext",
                code: BAD_MATCH,
            });
        }
        state.gl_context = Some(drawable);
        Ok(())
    }

    fn destroy_gl_context(&mut self) {
        self.state().gl_context = None;
    }

    fn gl_extensions(&self) -> String {
        self.state().gl_extensions.clone()
    }

    fn glx_extensions(&self) -> String {
        self.state().glx_extensions.clone()
    }

    fn has_entry_point(&self, name: &str) -> bool {
        self.state().entry_points.iter().any(|entry| entry == name)
    }

    fn framebuffer_config(&mut self, depth: u32) -> Option<FbConfig> {
        let state = self.state();
        state
            .fbconfig_depths
            .iter()
            .position(|d| *d == depth)
            .map(|index| FbConfig {
                id: 0x21 + index as u32,
                depth,
            })
    }

    fn create_pixmap(
        &mut self,
        _drawable: Drawable,
        width: u32,
        height: u32,
        _depth: u32,
    ) -> Result<PixmapId> {
        let mut state = self.state();
        if width == 0 || height == 0 {
            return Err(VoError::InvalidInput("zero sized pixmap"));
        }
        let pixmap = PixmapId(state.next());
        state.pixmaps.insert(pixmap);
        Ok(pixmap)
    }

    fn free_pixmap(&mut self, pixmap: PixmapId) {
        self.state().pixmaps.remove(&pixmap);
    }

    fn create_glx_pixmap(&mut self, _config: FbConfig, pixmap: PixmapId) -> Result<GlxPixmapId> {
        let mut state = self.state();
        if state.fail_glx_pixmap || !state.pixmaps.contains(&pixmap) {
            return Err(VoError::DisplayProtocolError {
                call: "glXCreatePixmap",
                code: BAD_MATCH,
            });
        }
        let glx_pixmap = GlxPixmapId(state.next());
        state.glx_pixmaps.insert(glx_pixmap);
        Ok(glx_pixmap)
    }

    fn destroy_glx_pixmap(&mut self, pixmap: GlxPixmapId) -> Result<()> {
        let mut state = self.state();
        if !state.glx_pixmaps.remove(&pixmap) {
            return Err(VoError::DisplayProtocolError {
                call: "glXDestroyPixmap",
                code: BAD_DRAWABLE,
            });
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, allocate: bool) -> Result<TextureId> {
        let mut state = self.state();
        if allocate && (width == 0 || height == 0) {
            return Err(VoError::InvalidInput("zero sized texture"));
        }
        if state.fail_texture {
            return Err(VoError::ResourceExhausted {
                call: "glGenTextures",
                what: "texture",
            });
        }
        let texture = TextureId(state.next() as u32);
        state.textures.insert(texture);
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.state().textures.remove(&texture);
    }

    fn bind_tex_image(&mut self, pixmap: GlxPixmapId) -> Result<()> {
        let mut state = self.state();
        if state.fail_bind_tex_image || !state.glx_pixmaps.contains(&pixmap) {
            return Err(VoError::DisplayProtocolError {
                call: "glXBindTexImageEXT",
                code: BAD_DRAWABLE,
            });
        }
        state.bound_pixmap = Some(pixmap);
        Ok(())
    }

    fn release_tex_image(&mut self, _pixmap: GlxPixmapId) -> Result<()> {
        self.state().bound_pixmap = None;
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.state().viewport = Some((width, height));
    }

    fn clear(&mut self) {
        self.state().clears += 1;
    }

    fn draw_textured_quad(&mut self, texture: TextureId, dst: Rect, tex_extent: (f32, f32)) {
        self.state().quads.push(Quad {
            texture,
            dst,
            extent: tex_extent,
        });
    }

    fn swap_buffers(&mut self, _drawable: Drawable) {
        self.state().swaps += 1;
    }
}
