// SPDX-License-Identifier: MPL-2.0

//! Hardware decode context and its rebuild state machine.
//!
//! ```text
//!                 init(triple)
//! Uninitialized ───────────────► Ready ◄──────┐
//!                                  │          │ rebuild ok
//!                  triple changed  │          │
//!                  and reinit on   ▼          │
//!                           Reinitializing ───┘
//!                                  │ any failure
//!                                  ▼
//!                               Failed ──── next init ───► Reinitializing
//! ```
//!
//! The context owns both surface pools, the decode config and context
//! handles, the per-output-surface images and the OSD subpicture. It is
//! only ever built or torn down as a whole, so a failed step never leaves
//! a partial set of hardware objects behind.

use drm_fourcc::DrmFourcc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, VoError};
use crate::overlay::SUBPICTURE_FORMAT;
use crate::surface_pool::{FrameSlot, OUTPUT_SURFACES, RENDER_SURFACES, SurfacePool};
use crate::va::{
    ConfigId, ContextId, DisplayAttribKind, DisplayAttribute, Entrypoint, ImageId, Profile,
    RT_FORMAT_YUV420, SubpictureId, SurfaceId, VaDisplay, VaImage, with_mapped,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextState {
    #[default]
    Uninitialized,
    Ready,
    Reinitializing,
    Failed,
}

/// Picture adjustment attributes reported by the display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Equalizer {
    pub brightness: Option<DisplayAttribute>,
    pub contrast: Option<DisplayAttribute>,
    pub hue: Option<DisplayAttribute>,
    pub saturation: Option<DisplayAttribute>,
}

impl Equalizer {
    fn from_attributes(attributes: &[DisplayAttribute]) -> Self {
        let mut eq = Self::default();
        for attr in attributes {
            let slot = match attr.kind {
                DisplayAttribKind::Brightness => &mut eq.brightness,
                DisplayAttribKind::Contrast => &mut eq.contrast,
                DisplayAttribKind::Hue => &mut eq.hue,
                DisplayAttribKind::Saturation => &mut eq.saturation,
                _ => continue,
            };
            *slot = Some(*attr);
        }
        eq
    }
}

/// A context (re)build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitRequest {
    /// Decode profile, `None` for a software-surface context.
    pub profile: Option<Profile>,
    pub width: u32,
    pub height: u32,
}

impl InitRequest {
    #[must_use]
    pub fn software(width: u32, height: u32) -> Self {
        Self {
            profile: None,
            width,
            height,
        }
    }

    #[must_use]
    pub fn hardware(profile: Profile, width: u32, height: u32) -> Self {
        Self {
            profile: Some(profile),
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_software(&self) -> bool {
        self.profile.is_none()
    }
}

/// What an init request did to the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Same triple as the live context.
    Unchanged,
    /// Reinit disabled; the live context was kept.
    Reused,
    /// Torn down and built again.
    Rebuilt,
}

/// Snapshot of the live context handed to decoders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextInfo {
    pub state: ContextState,
    pub config: Option<ConfigId>,
    pub context: Option<ContextId>,
    pub width: u32,
    pub height: u32,
    pub profile: Option<Profile>,
    pub decode_surfaces: Vec<SurfaceId>,
    pub equalizer: Equalizer,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct HardwareContext {
    state: ContextState,
    config: Option<ConfigId>,
    context: Option<ContextId>,
    width: u32,
    height: u32,
    profile: Option<Profile>,
    softsurface: bool,
    /// Output images are derived from their surfaces.
    is_bound: bool,
    equalizer: Equalizer,
    pool: SurfacePool,
    subpicture: Option<SubpictureId>,
    subpicture_image: Option<VaImage>,
    osd_associated: bool,
    generation: u64,
}

impl HardwareContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `request` would tear the context down.
    #[must_use]
    pub fn needs_rebuild(&self, request: &InitRequest, reinit: bool) -> bool {
        match self.state {
            ContextState::Ready => !self.matches(request) && reinit,
            _ => true,
        }
    }

    fn matches(&self, request: &InitRequest) -> bool {
        self.profile == request.profile
            && self.width == request.width
            && self.height == request.height
    }

    /// Bring the context in line with `request`.
    ///
    /// `frames` are the slots of every frame handed out so far; they are
    /// bound to the decode surfaces of a rebuilt pool.
    ///
    /// # Errors
    ///
    /// Any failing hardware call. The context is closed and left `Failed`.
    pub fn init(
        &mut self,
        display: &mut dyn VaDisplay,
        request: InitRequest,
        frames: &[FrameSlot],
        reinit: bool,
    ) -> Result<InitOutcome> {
        if self.state == ContextState::Ready {
            if self.matches(&request) {
                return Ok(InitOutcome::Unchanged);
            }
            if !reinit {
                debug!(
                    width = request.width,
                    height = request.height,
                    current_width = self.width,
                    current_height = self.height,
                    "reinit disabled, keeping context"
                );
                return Ok(InitOutcome::Reused);
            }
        }

        let restart = self.state != ContextState::Uninitialized;
        self.state = ContextState::Reinitializing;
        self.close(display);

        match self.build(display, request, frames, restart) {
            Ok(()) => {
                self.state = ContextState::Ready;
                self.generation += 1;
                self.equalizer = display
                    .query_display_attributes()
                    .map(|attrs| Equalizer::from_attributes(&attrs))
                    .unwrap_or_default();
                info!(
                    width = self.width,
                    height = self.height,
                    profile = self.profile.map_or("software", Profile::name),
                    derived = self.is_bound,
                    generation = self.generation,
                    brightness = attr_value(self.equalizer.brightness),
                    contrast = attr_value(self.equalizer.contrast),
                    hue = attr_value(self.equalizer.hue),
                    saturation = attr_value(self.equalizer.saturation),
                    "hardware context ready"
                );
                Ok(InitOutcome::Rebuilt)
            }
            Err(why) => {
                error!(
                    width = request.width,
                    height = request.height,
                    %why,
                    "hardware context rebuild failed"
                );
                self.close(display);
                self.state = ContextState::Failed;
                Err(why)
            }
        }
    }

    fn build(
        &mut self,
        display: &mut dyn VaDisplay,
        request: InitRequest,
        frames: &[FrameSlot],
        restart: bool,
    ) -> Result<()> {
        if restart {
            display.terminate();
            let (major, minor) = display.initialize()?;
            let vendor = display.vendor();
            info!(major, minor, vendor = %vendor, "display reinitialized");
        }

        display.set_background_color(0)?;

        self.width = request.width;
        self.height = request.height;
        self.profile = request.profile;
        self.softsurface = request.is_software();

        self.pool
            .allocate_decode(display, self.width, self.height, RENDER_SURFACES, frames)?;
        self.pool
            .allocate_output(display, self.width, self.height, OUTPUT_SURFACES)?;

        if let Some(profile) = request.profile {
            debug!(
                profile = profile.name(),
                entrypoint = Entrypoint::Vld.name(),
                surfaces = RENDER_SURFACES,
                "creating decode context"
            );
            let rt_format = display.rt_format_attribute(profile, Entrypoint::Vld)?;
            if rt_format & RT_FORMAT_YUV420 == 0 {
                return Err(VoError::Unsupported("profile without YUV 4:2:0 target"));
            }

            let config = display
                .create_config(profile, Entrypoint::Vld, rt_format)
                .map_err(|why| exhausted(why, "vaCreateConfig", "decode config"))?;
            self.config = Some(config);
            let context = display
                .create_context(config, self.width, self.height, self.pool.decode_surfaces())
                .map_err(|why| exhausted(why, "vaCreateContext", "decode context"))?;
            self.context = Some(context);
        }

        for (index, surface) in self.pool.output_surfaces().into_iter().enumerate() {
            let image = self.create_output_image(display, surface)?;
            self.pool.set_output_image(index, image);
        }

        Ok(())
    }

    fn create_output_image(
        &mut self,
        display: &mut dyn VaDisplay,
        surface: SurfaceId,
    ) -> Result<VaImage> {
        let formats = display.query_image_formats()?;

        let image = match display.derive_image(surface) {
            Ok(image) => {
                self.is_bound = true;
                image
            }
            Err(why) => {
                debug!(%why, "surface not derivable, creating image");
                if !formats.contains(&DrmFourcc::Yvu420) {
                    return Err(VoError::Unsupported("no YV12 image format"));
                }
                display.create_image(DrmFourcc::Yvu420, self.width, self.height)?
            }
        };

        if let Err(why) = with_mapped(display, image.buf, |bytes| bytes.fill(0)) {
            warn!(%why, image = image.id.0, "could not clear output image");
        }

        Ok(image)
    }

    /// Destroy every hardware object of the context. Safe to repeat.
    pub fn close(&mut self, display: &mut dyn VaDisplay) {
        self.destroy_subpicture(display);

        if let Some(context) = self.context.take() {
            display.destroy_context(context);
        }

        self.pool.release(display);

        if let Some(config) = self.config.take() {
            display.destroy_config(config);
        }

        self.is_bound = false;
        if self.state == ContextState::Ready {
            self.state = ContextState::Uninitialized;
        }
    }

    /// Create the OSD subpicture and its zeroed image.
    ///
    /// # Errors
    ///
    /// `Unsupported` when the display has no ARGB subpicture format, or the
    /// failing hardware call.
    pub fn create_subpicture(
        &mut self,
        display: &mut dyn VaDisplay,
        width: u32,
        height: u32,
    ) -> Result<(SubpictureId, VaImage)> {
        if width == 0 || height == 0 {
            return Err(VoError::InvalidInput("empty subpicture"));
        }
        if !display.query_subpicture_formats()?.contains(&SUBPICTURE_FORMAT) {
            return Err(VoError::Unsupported("no BGRA subpicture format"));
        }

        let image = display.create_image(SUBPICTURE_FORMAT, width, height)?;
        let subpicture = match display.create_subpicture(image.id) {
            Ok(subpicture) => subpicture,
            Err(why) => {
                display.destroy_image(image.id);
                return Err(why);
            }
        };

        if let Err(why) = with_mapped(display, image.buf, |bytes| bytes.fill(0)) {
            warn!(%why, "could not clear subpicture");
        }

        self.subpicture = Some(subpicture);
        self.subpicture_image = Some(image.clone());
        Ok((subpicture, image))
    }

    /// Deassociate and free the OSD subpicture.
    pub fn destroy_subpicture(&mut self, display: &mut dyn VaDisplay) {
        if let Some(subpicture) = self.subpicture.filter(|_| self.osd_associated) {
            display.deassociate_subpicture(subpicture, &self.osd_targets());
        }
        self.osd_associated = false;

        if let Some(image) = self.subpicture_image.take() {
            display.destroy_image(image.id);
        }
        if let Some(subpicture) = self.subpicture.take() {
            display.destroy_subpicture(subpicture);
        }
    }

    /// Surfaces the OSD is attached to.
    #[must_use]
    pub fn osd_targets(&self) -> Vec<SurfaceId> {
        if self.softsurface {
            self.pool.output_surfaces()
        } else {
            self.pool.decode_surfaces().to_vec()
        }
    }

    pub fn set_osd_associated(&mut self, associated: bool) {
        self.osd_associated = associated;
    }

    #[must_use]
    pub fn osd_associated(&self) -> bool {
        self.osd_associated
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ContextState::Ready
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn is_softsurface(&self) -> bool {
        self.softsurface
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.is_bound
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn context_id(&self) -> Option<ContextId> {
        self.context
    }

    #[must_use]
    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut SurfacePool {
        &mut self.pool
    }

    /// Image attached to an output surface.
    #[must_use]
    pub fn output_image(&self, surface: SurfaceId) -> Option<&VaImage> {
        self.pool
            .outputs()
            .iter()
            .find(|output| output.surface == surface)
            .and_then(|output| output.image.as_ref())
    }

    #[must_use]
    pub fn subpicture_image(&self) -> Option<ImageId> {
        self.subpicture_image.as_ref().map(|image| image.id)
    }

    #[must_use]
    pub fn info(&self) -> ContextInfo {
        ContextInfo {
            state: self.state,
            config: self.config,
            context: self.context,
            width: self.width,
            height: self.height,
            profile: self.profile,
            decode_surfaces: self.pool.decode_surfaces().to_vec(),
            equalizer: self.equalizer,
            generation: self.generation,
        }
    }
}

fn exhausted(why: VoError, call: &'static str, what: &'static str) -> VoError {
    warn!(%why, "{call} failed");
    VoError::ResourceExhausted { call, what }
}

fn attr_value(attr: Option<DisplayAttribute>) -> i32 {
    attr.map_or(0, |a| a.value)
}
