// SPDX-License-Identifier: MPL-2.0

//! Presentation backends.
//!
//! | Backend               | Per pass                                              |
//! |-----------------------|-------------------------------------------------------|
//! | `DirectBlit`          | put surface on the drawable at the output rectangle   |
//! | `GlTextureFromPixmap` | put surface on a pixmap bound to a texture, draw quad  |
//! | `GlSurfaceCopy`       | copy surface into a GL surface over a texture, draw quad |
//!
//! GL setup walks the table bottom-up from the preferred entry: texture from
//! pixmap when zero copy is enabled and supported, then surface copy, then
//! the direct blit which always works.

use tracing::{debug, info, warn};
use vaapi_vo_config::DeinterlaceMode;

use crate::error::{Result, VoError};
use crate::va::{
    Drawable, FieldFlags, GlSurfaceId, GlxPixmapId, PixmapId, PutTarget, Rect, SurfaceId,
    TextureId, VaDisplay,
};
use crate::window::{Capabilities, WindowSystem};

/// Depth of the pixmap shared with GL.
const PIXMAP_DEPTH: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    DirectBlit,
    GlTextureFromPixmap {
        pixmap: PixmapId,
        glx_pixmap: GlxPixmapId,
        texture: TextureId,
    },
    GlSurfaceCopy {
        texture: TextureId,
        gl_surface: GlSurfaceId,
    },
}

impl Backend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::DirectBlit => "direct-blit",
            Backend::GlTextureFromPixmap { .. } => "gl-texture-from-pixmap",
            Backend::GlSurfaceCopy { .. } => "gl-surface-copy",
        }
    }

    #[must_use]
    pub fn is_gl(&self) -> bool {
        !matches!(self, Backend::DirectBlit)
    }
}

/// Field structure of every presentation pass of one frame.
///
/// Bob issues two passes for an interlaced frame, the first field first.
/// Any other mode issues one.
#[must_use]
pub fn field_passes(
    mode: DeinterlaceMode,
    interlaced: bool,
    top_field_first: bool,
) -> Vec<FieldFlags> {
    let count = 1 + usize::from(mode == DeinterlaceMode::Bob && interlaced);
    (0..count)
        .map(|pass| {
            if mode != DeinterlaceMode::Off && interlaced {
                if (u8::from(top_field_first) ^ pass as u8) == 0 {
                    FieldFlags::BottomField
                } else {
                    FieldFlags::TopField
                }
            } else {
                FieldFlags::Frame
            }
        })
        .collect()
}

/// Sizes of one presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentGeometry {
    pub context_width: u32,
    pub context_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub output: Rect,
}

impl PresentGeometry {
    fn context_rect(&self) -> Rect {
        Rect::sized(self.context_width, self.context_height)
    }

    fn tex_extent(&self) -> (f32, f32) {
        if self.context_width == 0 || self.context_height == 0 {
            return (1.0, 1.0);
        }
        (
            self.frame_width as f32 / self.context_width as f32,
            self.frame_height as f32 / self.context_height as f32,
        )
    }
}

#[derive(Debug)]
pub struct Presenter {
    drawable: Drawable,
    /// GL requested and a direct context verified at open.
    opengl: bool,
    zero_copy: bool,
    backend: Backend,
    gl_init: bool,
    gl_context: bool,
    caps: Option<Capabilities>,
}

impl Presenter {
    #[must_use]
    pub fn new(drawable: Drawable, opengl: bool, zero_copy: bool) -> Self {
        Self {
            drawable,
            opengl,
            zero_copy,
            backend: Backend::DirectBlit,
            gl_init: false,
            gl_context: false,
            caps: None,
        }
    }

    /// Check for a direct, hardware-rendering GL context.
    pub fn verify_direct(window: &mut dyn WindowSystem) -> bool {
        match window.probe_renderer() {
            Some(renderer) if renderer.is_accelerated() => {
                debug!(renderer = %renderer.renderer, "direct rendering verified");
                true
            }
            Some(renderer) => {
                info!(
                    renderer = %renderer.renderer,
                    direct = renderer.direct,
                    "no direct hardware rendering, OpenGL disabled"
                );
                false
            }
            None => {
                info!("no GL visual, OpenGL disabled");
                false
            }
        }
    }

    /// GL resources must be (re)created before the next frame.
    #[must_use]
    pub fn needs_setup(&self) -> bool {
        self.opengl && !self.gl_init
    }

    /// Build the GL backend for a `width`x`height` context.
    ///
    /// Never fails: the direct blit is used when no GL backend can be set up.
    pub fn setup(
        &mut self,
        display: &mut dyn VaDisplay,
        window: &mut dyn WindowSystem,
        width: u32,
        height: u32,
    ) -> Backend {
        self.teardown(display, window);
        self.gl_init = true;

        self.backend = match self.setup_gl(display, window, width, height) {
            Ok(backend) => backend,
            Err(why) => {
                warn!(%why, "GL setup failed, using direct blit");
                if self.gl_context {
                    window.destroy_gl_context();
                    self.gl_context = false;
                }
                Backend::DirectBlit
            }
        };

        info!(backend = self.backend.name(), width, height, "presentation backend ready");
        self.backend
    }

    fn setup_gl(
        &mut self,
        display: &mut dyn VaDisplay,
        window: &mut dyn WindowSystem,
        width: u32,
        height: u32,
    ) -> Result<Backend> {
        window.create_gl_context(self.drawable)?;
        self.gl_context = true;

        let caps = Capabilities::probe(window);
        let bind_texture = caps.bind_texture;
        let tfp = caps.texture_from_pixmap();
        self.caps = Some(caps);
        if !bind_texture {
            return Err(VoError::Unsupported("no texture binding"));
        }

        if self.zero_copy && tfp {
            match self.setup_tfp(window, width, height) {
                Ok(backend) => return Ok(backend),
                Err(why) => warn!(%why, "texture from pixmap unavailable"),
            }
        }

        setup_surface_copy(display, window, width, height)
    }

    fn setup_tfp(
        &mut self,
        window: &mut dyn WindowSystem,
        width: u32,
        height: u32,
    ) -> Result<Backend> {
        let config = window
            .framebuffer_config(PIXMAP_DEPTH)
            .ok_or(VoError::Unsupported("no framebuffer config for 24-bit pixmap"))?;

        let pixmap = window.create_pixmap(self.drawable, width, height, PIXMAP_DEPTH)?;
        let glx_pixmap = match window.create_glx_pixmap(config, pixmap) {
            Ok(glx_pixmap) => glx_pixmap,
            Err(why) => {
                window.free_pixmap(pixmap);
                return Err(why);
            }
        };

        match window.create_texture(width, height, false) {
            Ok(texture) => Ok(Backend::GlTextureFromPixmap {
                pixmap,
                glx_pixmap,
                texture,
            }),
            Err(why) => {
                if let Err(why) = window.destroy_glx_pixmap(glx_pixmap) {
                    debug!(%why, "GL pixmap already gone");
                }
                window.free_pixmap(pixmap);
                Err(why)
            }
        }
    }

    /// Drop every GL resource. Safe to repeat.
    pub fn teardown(&mut self, display: &mut dyn VaDisplay, window: &mut dyn WindowSystem) {
        match self.backend {
            Backend::DirectBlit => {}
            Backend::GlTextureFromPixmap {
                pixmap,
                glx_pixmap,
                texture,
            } => {
                if let Err(why) = window.destroy_glx_pixmap(glx_pixmap) {
                    debug!(%why, "GL pixmap already gone");
                }
                window.free_pixmap(pixmap);
                window.delete_texture(texture);
            }
            Backend::GlSurfaceCopy {
                texture,
                gl_surface,
            } => {
                display.destroy_surface_glx(gl_surface);
                window.delete_texture(texture);
            }
        }
        self.backend = Backend::DirectBlit;

        if self.gl_context {
            window.destroy_gl_context();
            self.gl_context = false;
        }
        self.gl_init = false;
    }

    /// Switch to a new drawable; GL is rebuilt on the next frame.
    pub fn set_drawable(&mut self, drawable: Drawable) {
        self.drawable = drawable;
        self.gl_init = false;
    }

    pub fn update_viewport(&self, window: &mut dyn WindowSystem, width: u32, height: u32) {
        if self.backend.is_gl() {
            window.set_viewport(width, height);
        }
    }

    /// Run every pass for `surface`. Returns the passes that completed.
    pub fn present(
        &mut self,
        display: &mut dyn VaDisplay,
        window: &mut dyn WindowSystem,
        surface: SurfaceId,
        geometry: &PresentGeometry,
        passes: &[FieldFlags],
    ) -> usize {
        let mut done = 0;
        for field in passes {
            if let Err(why) = self.present_pass(display, window, surface, geometry, *field) {
                warn!(
                    %why,
                    surface = surface.0,
                    field = field.bits(),
                    backend = self.backend.name(),
                    "presentation pass failed"
                );
                break;
            }
            done += 1;
        }
        done
    }

    fn present_pass(
        &mut self,
        display: &mut dyn VaDisplay,
        window: &mut dyn WindowSystem,
        surface: SurfaceId,
        geometry: &PresentGeometry,
        field: FieldFlags,
    ) -> Result<()> {
        match self.backend {
            Backend::DirectBlit => display.put_surface(
                surface,
                PutTarget::Drawable(self.drawable),
                geometry.context_rect(),
                geometry.output,
                field,
            ),
            Backend::GlTextureFromPixmap {
                pixmap,
                glx_pixmap,
                texture,
            } => {
                display.put_surface(
                    surface,
                    PutTarget::Pixmap(pixmap),
                    geometry.context_rect(),
                    geometry.context_rect(),
                    field,
                )?;
                self.flip(window, texture, Some(glx_pixmap), geometry);
                Ok(())
            }
            Backend::GlSurfaceCopy {
                texture,
                gl_surface,
            } => {
                display.copy_surface_glx(gl_surface, surface, field)?;
                self.flip(window, texture, None, geometry);
                Ok(())
            }
        }
    }

    fn flip(
        &self,
        window: &mut dyn WindowSystem,
        texture: TextureId,
        glx_pixmap: Option<GlxPixmapId>,
        geometry: &PresentGeometry,
    ) {
        window.clear();

        if let Some(glx_pixmap) = glx_pixmap {
            if let Err(why) = window.bind_tex_image(glx_pixmap) {
                warn!(%why, "updating the pixmap texture failed");
            }
        }

        window.draw_textured_quad(texture, geometry.output, geometry.tex_extent());

        if let Some(glx_pixmap) = glx_pixmap {
            if let Err(why) = window.release_tex_image(glx_pixmap) {
                warn!(%why, "releasing the pixmap texture failed");
            }
        }

        window.swap_buffers(self.drawable);
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    #[must_use]
    pub fn drawable(&self) -> Drawable {
        self.drawable
    }

    #[must_use]
    pub fn is_opengl(&self) -> bool {
        self.opengl
    }

    #[must_use]
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.caps.as_ref()
    }
}

fn setup_surface_copy(
    display: &mut dyn VaDisplay,
    window: &mut dyn WindowSystem,
    width: u32,
    height: u32,
) -> Result<Backend> {
    let texture = window.create_texture(width, height, true)?;
    match display.create_surface_glx(texture) {
        Ok(gl_surface) => Ok(Backend::GlSurfaceCopy {
            texture,
            gl_surface,
        }),
        Err(why) => {
            window.delete_texture(texture);
            Err(why)
        }
    }
}
