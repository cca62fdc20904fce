// SPDX-License-Identifier: MPL-2.0

//! The video output driver.
//!
//! One [`Driver`] owns the acceleration display, the window system, the
//! hardware context and everything built on top of it. All of it sits behind
//! a single lock: the decoder thread takes it when it negotiates a decode
//! profile through the [`Accelerator`] handed out with every frame, the
//! presentation thread takes it for every per-frame entry point.
//!
//! Per frame:
//!
//! ```text
//! update_frame_format ─► overlay_begin/blend/end ─► display_frame
//!                                                       │
//!        context check ─► convert ─► ready check ─► present passes ─► release
//! ```
//!
//! Every entry point degrades to "nothing shown this frame" on failure and
//! never loses a frame: `display_frame` takes ownership and always releases.

mod stats;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use vaapi_vo_config::Settings;

use crate::context::{ContextInfo, HardwareContext, InitOutcome, InitRequest};
use crate::convert::upload;
use crate::error::{Result, VoError};
use crate::frame::{
    AccelHandle, Accelerator, CodecId, DecoderPixFmt, Frame, FrameBuffers, HwImageFormat,
    PixelFormat,
};
use crate::overlay::{MergeOutcome, OverlayCompositor, OverlayLayer};
use crate::present::{Backend, PresentGeometry, Presenter, field_passes};
use crate::scaler::{AspectRatio, VideoScaler};
use crate::surface_pool::{FrameSlot, RENDER_SURFACES};
use crate::va::{Drawable, Profile, Rect, SurfaceId, SurfaceStatus, VaDisplay, with_mapped};
use crate::window::WindowSystem;

pub use stats::DriverStats;
use stats::Counters;

/// One refresh interval at 60 Hz.
const REFRESH_INTERVAL: Duration = Duration::from_micros(16_667);

/// What the driver accepts and how it composites overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoCapabilities(u32);

impl VoCapabilities {
    pub const YV12: Self = Self(1 << 0);
    pub const YUY2: Self = Self(1 << 1);
    pub const CROP: Self = Self(1 << 2);
    pub const UNSCALED_OVERLAY: Self = Self(1 << 3);
    pub const ARGB_LAYER_OVERLAY: Self = Self(1 << 4);
    /// Frames may arrive already decoded into hardware surfaces.
    pub const VAAPI: Self = Self(1 << 5);
    pub const CUSTOM_EXTENT_OVERLAY: Self = Self(1 << 6);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

const CAPABILITIES: VoCapabilities = VoCapabilities::YV12
    .union(VoCapabilities::YUY2)
    .union(VoCapabilities::CROP)
    .union(VoCapabilities::UNSCALED_OVERLAY)
    .union(VoCapabilities::ARGB_LAYER_OVERLAY)
    .union(VoCapabilities::VAAPI)
    .union(VoCapabilities::CUSTOM_EXTENT_OVERLAY);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    WindowWidth,
    WindowHeight,
    OutputWidth,
    OutputHeight,
    OutputXOffset,
    OutputYOffset,
    ZoomX,
    ZoomY,
    AspectRatio,
    MaxNumFrames,
}

/// Notifications from the embedding GUI.
#[derive(Debug)]
pub enum GuiData<'a> {
    Expose { count: u32 },
    DrawableChanged(Drawable),
    /// Window rectangle translated in place to frame coordinates.
    TranslateGuiToVideo(&'a mut Rect),
    Completion,
    Other(u32),
}

struct Hardware {
    display: Box<dyn VaDisplay>,
    window: Box<dyn WindowSystem>,
    context: HardwareContext,
    presenter: Presenter,
    overlay: OverlayCompositor,
    scaler: VideoScaler,
    settings: Settings,
    vendor: String,
    poll_surface_ready: bool,
    /// A software frame format changed since the last presentation.
    pending_init: bool,
    next_slot: usize,
    free_slots: Vec<FrameSlot>,
    disposed: bool,
}

impl Hardware {
    /// Slots of every frame handed out so far.
    fn frame_slots(&self) -> Vec<FrameSlot> {
        (0..self.next_slot).map(FrameSlot).collect()
    }

    fn init_context(&mut self, request: InitRequest, stats: &Counters) -> Result<InitOutcome> {
        let reinit = self.settings.reinit_on_format_change;
        if self.context.needs_rebuild(&request, reinit) {
            self.presenter
                .teardown(self.display.as_mut(), self.window.as_mut());
            self.overlay.reset_association();
        }

        let frames = self.frame_slots();
        let outcome = self
            .context
            .init(self.display.as_mut(), request, &frames, reinit)?;

        if outcome == InitOutcome::Rebuilt {
            Counters::bump(&stats.context_rebuilds);
            self.scaler.force_redraw();
        }
        Ok(outcome)
    }

    fn software_init_needed(&self, frame: &Frame) -> bool {
        frame.format.is_software()
            && (self.pending_init
                || !self.context.is_ready()
                || !self.context.is_softsurface()
                || self.context.width() != frame.width
                || self.context.height() != frame.height)
    }

    fn unsupported(&self, frame: &Frame, stats: &Counters) -> bool {
        warn!(
            format = ?frame.format,
            width = frame.width,
            height = frame.height,
            state = ?self.context.state(),
            "unsupported frame, nothing shown"
        );
        Counters::bump(&stats.unsupported);
        false
    }

    /// Select, fill and present the surface for `frame`.
    fn present(&mut self, frame: &Frame, stats: &Counters) -> bool {
        if !self.context.is_ready() {
            return self.unsupported(frame, stats);
        }

        let surface = match frame.format {
            PixelFormat::HwSurface => self.context.pool().surface_for(frame.slot()),
            PixelFormat::Yv12 | PixelFormat::Yuy2 => self
                .context
                .pool_mut()
                .next_output()
                .map(|output| output.surface),
        };
        let Some(surface) = surface else {
            return self.unsupported(frame, stats);
        };

        if self.poll_surface_ready {
            match self.display.query_surface_status(surface) {
                Ok(SurfaceStatus::Ready) => {}
                status => {
                    debug!(surface = surface.0, ?status, "surface not ready, frame skipped");
                    Counters::bump(&stats.skipped_not_ready);
                    return false;
                }
            }
        }

        if frame.format.is_software() {
            if let Err(why) = self.convert(frame, surface) {
                warn!(%why, surface = surface.0, "frame upload failed");
                Counters::bump(&stats.conversion_failures);
                return false;
            }
        }

        let passes = field_passes(
            self.settings.deinterlace_mode,
            frame.is_interlaced(),
            frame.top_field_first,
        );
        let geometry = PresentGeometry {
            context_width: self.context.width(),
            context_height: self.context.height(),
            frame_width: frame.width,
            frame_height: frame.height,
            output: self.scaler.output(),
        };

        let done = self.presenter.present(
            self.display.as_mut(),
            self.window.as_mut(),
            surface,
            &geometry,
            &passes,
        );
        if done > 0 {
            Counters::bump(&stats.frames_displayed);
        }
        done == passes.len()
    }

    fn convert(&mut self, frame: &Frame, surface: SurfaceId) -> Result<()> {
        let image = self
            .context
            .output_image(surface)
            .cloned()
            .ok_or(VoError::InvalidInput("output surface without image"))?;
        let buffers: &FrameBuffers = frame
            .buffers
            .as_ref()
            .ok_or(VoError::InvalidInput("software frame without planes"))?;

        with_mapped(self.display.as_mut(), image.buf, |bytes| {
            upload(frame.format, buffers, frame.width, frame.height, &image, bytes)
        })
        .map_err(|why| {
            debug!(%why, "output image map failed");
            VoError::MappingFailure { call: "vaMapBuffer" }
        })??;

        if !self.context.is_bound() {
            let rect = Rect::sized(image.width, image.height);
            if let Err(why) = self.display.put_image(surface, &image, rect, rect) {
                warn!(%why, surface = surface.0, "vaPutImage failed");
            }
        }
        Ok(())
    }

    fn associate_overlay(&mut self, show: bool, stats: &Counters) {
        let result = self
            .overlay
            .associate(self.display.as_mut(), &mut self.context, show);
        if let Err(why) = result {
            debug!(%why, show, "overlay hidden for this frame");
            Counters::bump(&stats.association_failures);
        }
    }

    fn close(&mut self) {
        self.presenter
            .teardown(self.display.as_mut(), self.window.as_mut());
        self.context.close(self.display.as_mut());
        self.overlay.reset_association();
    }
}

struct Shared {
    hardware: Mutex<Hardware>,
    stats: Counters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Hardware> {
        self.hardware.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Accelerator for Shared {
    fn init(&self, profile: Profile, width: u32, height: u32) -> Result<()> {
        let mut hw = self.lock();
        if hw.disposed {
            return Err(VoError::InvalidInput("video output disposed"));
        }

        let outcome = hw.init_context(InitRequest::hardware(profile, width, height), &self.stats)?;
        debug!(profile = profile.name(), width, height, ?outcome, "decoder context request");
        Ok(())
    }

    fn profile_from_imgfmt(
        &self,
        pix_fmt: DecoderPixFmt,
        codec: CodecId,
        mpeg2_software_decode: bool,
    ) -> Option<Profile> {
        let Some(format) = HwImageFormat::from_decoder(pix_fmt, codec) else {
            debug!(?pix_fmt, ?codec, "no hardware image format");
            return None;
        };

        let hw = self.lock();
        let profile = format
            .profiles(mpeg2_software_decode)
            .iter()
            .copied()
            .find(|profile| hw.display.supports_profile(*profile));

        match profile {
            Some(profile) => debug!(?format, profile = profile.name(), "decode profile selected"),
            None => info!(?format, vendor = %hw.vendor, "no supported decode profile"),
        }
        profile
    }

    fn get_context(&self) -> ContextInfo {
        self.lock().context.info()
    }
}

/// Hardware accelerated video output.
pub struct Driver {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Driver {
    /// Connect to the display and prepare presentation on `drawable`.
    ///
    /// # Errors
    ///
    /// Fails when the acceleration display cannot be initialized.
    pub fn open(
        mut display: Box<dyn VaDisplay>,
        mut window: Box<dyn WindowSystem>,
        drawable: Drawable,
        settings: Settings,
    ) -> Result<Self> {
        let settings = settings.sanitized();
        let (major, minor) = display.initialize()?;
        let vendor = display.vendor();

        let poll_surface_ready = settings.poll_surface_ready && !vendor.contains("VDPAU");
        if settings.poll_surface_ready && !poll_surface_ready {
            info!(%vendor, "surface status polling disabled for this backend");
        }

        let opengl = settings.render_via_opengl && Presenter::verify_direct(window.as_mut());
        let presenter = Presenter::new(drawable, opengl, settings.use_zero_copy_texture);

        info!(
            major,
            minor,
            %vendor,
            opengl,
            zero_copy = settings.use_zero_copy_texture,
            reinit = settings.reinit_on_format_change,
            deinterlace = settings.deinterlace_mode.level(),
            poll_surface_ready,
            "video output opened"
        );

        let overlay = OverlayCompositor::new((
            settings.force_osd_min_width,
            settings.force_osd_min_height,
        ));

        let hardware = Hardware {
            display,
            window,
            context: HardwareContext::new(),
            presenter,
            overlay,
            scaler: VideoScaler::new(),
            settings,
            vendor,
            poll_surface_ready,
            pending_init: false,
            next_slot: 0,
            free_slots: Vec::new(),
            disposed: false,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                hardware: Mutex::new(hardware),
                stats: Counters::default(),
            }),
        })
    }

    #[must_use]
    pub fn capabilities(&self) -> VoCapabilities {
        CAPABILITIES
    }

    /// Hand out a frame bound to the next free decode slot.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` once every slot is in use.
    pub fn alloc_frame(&self) -> Result<Frame> {
        let mut hw = self.shared.lock();
        let slot = match hw.free_slots.pop() {
            Some(slot) => slot,
            None if hw.next_slot < RENDER_SURFACES => {
                hw.next_slot += 1;
                FrameSlot(hw.next_slot - 1)
            }
            None => {
                return Err(VoError::ResourceExhausted {
                    call: "alloc_frame",
                    what: "frame slot",
                });
            }
        };
        hw.context.pool_mut().bind(slot);

        let accelerator: Arc<dyn Accelerator> = self.shared.clone();
        Ok(Frame::new(AccelHandle { slot, accelerator }))
    }

    /// Return a frame without showing it.
    pub fn release_frame(&self, frame: Frame) {
        let mut hw = self.shared.lock();
        self.release(&mut hw, frame);
    }

    fn release(&self, hw: &mut Hardware, frame: Frame) {
        let slot = frame.slot();
        if !hw.free_slots.contains(&slot) {
            hw.free_slots.push(slot);
        }
        Counters::bump(&self.shared.stats.frames_released);
    }

    /// Set the format of `frame`, reallocating its planes on change.
    pub fn update_frame_format(
        &self,
        frame: &mut Frame,
        width: u32,
        height: u32,
        ratio: f64,
        format: PixelFormat,
        flags: u32,
    ) {
        if frame.width != width || frame.height != height || frame.format != format {
            frame.buffers = FrameBuffers::allocate(format, width, height);
            frame.width = width;
            frame.height = height;
            frame.format = format;
            frame.flags = flags;

            // hardware frames had their context built by the decoder
            self.shared.lock().pending_init = format.is_software();
            debug!(width, height, ?format, "frame format changed");
        }
        frame.ratio = ratio;
    }

    /// Start an overlay batch when the overlay changed, hiding the current
    /// OSD. Returns whether a batch was opened.
    pub fn overlay_begin(&self, changed: bool) -> bool {
        let mut hw = self.shared.lock();
        let opened = hw.overlay.begin(changed);
        if opened {
            hw.associate_overlay(false, &self.shared.stats);
        }
        opened
    }

    pub fn overlay_blend(&self, layer: OverlayLayer) -> bool {
        self.shared.lock().overlay.blend(layer)
    }

    /// Merge the batch and attach it to the surfaces of the context.
    pub fn overlay_end(&self, frame: &Frame) {
        let mut hw = self.shared.lock();
        let gui_size = hw.scaler.gui_size();
        match hw.overlay.end((frame.width, frame.height), gui_size) {
            MergeOutcome::Idle | MergeOutcome::Cleared => {}
            MergeOutcome::Merged { has_overlay } => {
                hw.associate_overlay(has_overlay, &self.shared.stats);
            }
        }
    }

    /// Show `frame` and release it.
    pub fn display_frame(&self, frame: Frame) {
        let stats = &self.shared.stats;
        let mut guard = self.shared.lock();
        let hw = &mut *guard;

        if hw.disposed {
            self.release(hw, frame);
            return;
        }

        if hw
            .scaler
            .update_frame(frame.width, frame.height, frame.ratio, frame.crop)
        {
            debug!(width = frame.width, height = frame.height, "frame geometry changed");
        }

        if hw.software_init_needed(&frame) {
            hw.pending_init = false;
            let request = InitRequest::software(frame.width, frame.height);
            if let Err(why) = hw.init_context(request, stats) {
                warn!(%why, transient = why.is_transient(), "software surface context unavailable");
            }
            hw.scaler.force_redraw();
        }

        // GL objects are built against a live context only
        if hw.context.is_ready() && hw.presenter.needs_setup() {
            hw.presenter.setup(
                hw.display.as_mut(),
                hw.window.as_mut(),
                frame.width,
                frame.height,
            );
            hw.scaler.force_redraw();
        }

        let (gui_width, gui_height) = hw.window.drawable_size(hw.presenter.drawable());
        hw.scaler.set_gui_size(gui_width, gui_height);
        if hw.scaler.redraw_needed() {
            hw.presenter
                .update_viewport(hw.window.as_mut(), gui_width, gui_height);
        }

        let start = Instant::now();
        hw.present(&frame, stats);
        hw.window.sync();
        self.release(hw, frame);
        let elapsed = start.elapsed();
        drop(guard);

        let factor = (elapsed.as_secs_f64() / REFRESH_INTERVAL.as_secs_f64()) as u32;
        if factor > 1 {
            warn!(
                factor,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "presentation took longer than a refresh interval"
            );
            Counters::bump(&stats.slow_presents);
        }
    }

    #[must_use]
    pub fn get_property(&self, property: Property) -> i32 {
        let hw = self.shared.lock();
        let (gui_width, gui_height) = hw.scaler.gui_size();
        let output = hw.scaler.output();
        let (zoom_x, zoom_y) = hw.scaler.zoom();

        match property {
            Property::WindowWidth => gui_width as i32,
            Property::WindowHeight => gui_height as i32,
            Property::OutputWidth => output.width as i32,
            Property::OutputHeight => output.height as i32,
            Property::OutputXOffset => output.x,
            Property::OutputYOffset => output.y,
            Property::ZoomX => zoom_x,
            Property::ZoomY => zoom_y,
            Property::AspectRatio => hw.scaler.user_ratio() as i32,
            Property::MaxNumFrames => RENDER_SURFACES as i32,
        }
    }

    /// Write a property. Returns the value as stored.
    pub fn set_property(&self, property: Property, value: i32) -> i32 {
        let mut hw = self.shared.lock();
        match property {
            Property::AspectRatio => {
                let ratio = AspectRatio::from_value(value);
                hw.scaler.set_user_ratio(ratio);
                debug!(?ratio, "aspect ratio set");
                ratio as i32
            }
            Property::ZoomX => {
                if hw.scaler.set_zoom_x(value) {
                    info!(value, "horizontal zoom set");
                }
                value
            }
            Property::ZoomY => {
                if hw.scaler.set_zoom_y(value) {
                    info!(value, "vertical zoom set");
                }
                value
            }
            _ => value,
        }
    }

    #[must_use]
    pub fn get_property_min_max(&self, _property: Property) -> (i32, i32) {
        (0, 0)
    }

    /// Handle a GUI notification. Returns `false` for unknown requests.
    pub fn gui_data_exchange(&self, data: GuiData<'_>) -> bool {
        let mut guard = self.shared.lock();
        let hw = &mut *guard;

        match data {
            GuiData::Completion => {}
            GuiData::Expose { count } => {
                if count == 0 {
                    hw.window.sync();
                    hw.scaler.force_redraw();
                }
            }
            GuiData::DrawableChanged(drawable) => {
                debug!(drawable = drawable.0, "drawable changed");
                if hw.presenter.backend().is_gl() {
                    hw.presenter
                        .teardown(hw.display.as_mut(), hw.window.as_mut());
                }
                hw.presenter.set_drawable(drawable);
                hw.scaler.force_redraw();
            }
            GuiData::TranslateGuiToVideo(rect) => hw.scaler.translate_rect(rect),
            GuiData::Other(kind) => {
                debug!(kind, "unknown GUI request");
                return false;
            }
        }
        true
    }

    /// Apply changed settings at runtime.
    ///
    /// Policy changes take effect with the next frame; switching the
    /// presentation path rebuilds the GL resources.
    pub fn update_settings(&self, settings: Settings) {
        let settings = settings.sanitized();
        let mut guard = self.shared.lock();
        let hw = &mut *guard;

        hw.poll_surface_ready = settings.poll_surface_ready && !hw.vendor.contains("VDPAU");
        hw.overlay.min_size = (settings.force_osd_min_width, settings.force_osd_min_height);

        if settings.render_via_opengl != hw.settings.render_via_opengl
            || settings.use_zero_copy_texture != hw.settings.use_zero_copy_texture
        {
            hw.presenter
                .teardown(hw.display.as_mut(), hw.window.as_mut());
            let opengl = settings.render_via_opengl && Presenter::verify_direct(hw.window.as_mut());
            let drawable = hw.presenter.drawable();
            hw.presenter = Presenter::new(drawable, opengl, settings.use_zero_copy_texture);
            hw.scaler.force_redraw();
        }

        info!(
            reinit = settings.reinit_on_format_change,
            deinterlace = settings.deinterlace_mode.level(),
            poll_surface_ready = hw.poll_surface_ready,
            "settings updated"
        );
        hw.settings = settings;
    }

    /// Release every hardware resource and close the display. Safe to repeat.
    pub fn dispose(&self) {
        let mut hw = self.shared.lock();
        if hw.disposed {
            return;
        }

        hw.close();
        hw.display.terminate();
        hw.disposed = true;

        let stats = self.shared.stats.snapshot();
        info!(
            displayed = stats.frames_displayed,
            released = stats.frames_released,
            rebuilds = stats.context_rebuilds,
            "video output disposed"
        );
    }

    /// The accelerator frames carry, for decoders that negotiate up front.
    #[must_use]
    pub fn accelerator(&self) -> Arc<dyn Accelerator> {
        self.shared.clone()
    }

    #[must_use]
    pub fn context_info(&self) -> ContextInfo {
        self.shared.get_context()
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.shared.lock().presenter.backend()
    }

    #[must_use]
    pub fn stats(&self) -> DriverStats {
        self.shared.stats.snapshot()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.dispose();
    }
}
