// SPDX-License-Identifier: MPL-2.0

//! Window-system and GL side of presentation.
//!
//! The acceleration driver renders into surfaces; getting those onto the
//! screen through GL needs a handful of window-system calls, some of which
//! exist only behind optional extensions. [`Capabilities::probe`] resolves
//! the optional entry points once after the GL context is current:
//!
//! | Capability             | Extension                      | Entry points                                        |
//! |------------------------|--------------------------------|-----------------------------------------------------|
//! | texture generation     | core                           | `glGenTextures`                                     |
//! | texture binding        | core                           | `glBindTexture`, `glBindTextureARB`, `glBindTextureEXT` |
//! | texture from pixmap    | `GLX_EXT_texture_from_pixmap`  | `glXBindTexImageEXT`, `glXReleaseTexImageEXT`, `glXCreatePixmap`, `glXDestroyPixmap` |
//! | fragment programs      | `_program`                     | `glGenProgramsARB`                                  |
//!
//! Calls marked as trapped in [`WindowSystem`] run with the window-system
//! error handler swapped out and report asynchronous protocol errors as
//! `DisplayProtocolError`.

use tracing::{debug, info};

use crate::error::Result;
use crate::va::{Drawable, GlxPixmapId, PixmapId, Rect, TextureId};

/// Renderer reported by a freshly created GL context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlRenderer {
    pub renderer: String,
    pub direct: bool,
}

impl GlRenderer {
    /// Direct rendering on real hardware.
    #[must_use]
    pub fn is_accelerated(&self) -> bool {
        self.direct && !self.renderer.contains("Software") && !self.renderer.contains("Indirect")
    }
}

/// Framebuffer configuration able to back a GL pixmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbConfig {
    pub id: u32,
    pub depth: u32,
}

/// Window system connection the video output draws through.
pub trait WindowSystem: Send {
    fn drawable_size(&self, drawable: Drawable) -> (u32, u32);
    /// Flush and wait for the server.
    fn sync(&mut self);

    /// Create a throwaway context on a scratch window and report its renderer.
    fn probe_renderer(&mut self) -> Option<GlRenderer>;

    fn create_gl_context(&mut self, drawable: Drawable) -> Result<()>;
    fn destroy_gl_context(&mut self);
    fn gl_extensions(&self) -> String;
    fn glx_extensions(&self) -> String;
    fn has_entry_point(&self, name: &str) -> bool;

    fn framebuffer_config(&mut self, depth: u32) -> Option<FbConfig>;
    fn create_pixmap(&mut self, drawable: Drawable, width: u32, height: u32, depth: u32)
    -> Result<PixmapId>;
    fn free_pixmap(&mut self, pixmap: PixmapId);
    /// Trapped.
    fn create_glx_pixmap(&mut self, config: FbConfig, pixmap: PixmapId) -> Result<GlxPixmapId>;
    /// Trapped.
    fn destroy_glx_pixmap(&mut self, pixmap: GlxPixmapId) -> Result<()>;

    /// Create a texture; with `allocate` its storage is sized for BGRA upload.
    fn create_texture(&mut self, width: u32, height: u32, allocate: bool) -> Result<TextureId>;
    fn delete_texture(&mut self, texture: TextureId);
    /// Trapped.
    fn bind_tex_image(&mut self, pixmap: GlxPixmapId) -> Result<()>;
    /// Trapped.
    fn release_tex_image(&mut self, pixmap: GlxPixmapId) -> Result<()>;

    fn set_viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    /// Draw `texture` over `dst`, sampling `(0,0)..tex_extent`.
    fn draw_textured_quad(&mut self, texture: TextureId, dst: Rect, tex_extent: (f32, f32));
    fn swap_buffers(&mut self, drawable: Drawable);
}

struct ExtFunc {
    extension: Option<&'static str>,
    entry_points: &'static [&'static str],
    always_available: bool,
}

const GEN_TEXTURES: ExtFunc = ExtFunc {
    extension: None,
    entry_points: &["glGenTextures"],
    always_available: true,
};
const BIND_TEXTURE: ExtFunc = ExtFunc {
    extension: None,
    entry_points: &["glBindTexture", "glBindTextureARB", "glBindTextureEXT"],
    always_available: false,
};
const BIND_TEX_IMAGE: ExtFunc = ExtFunc {
    extension: Some("GLX_EXT_texture_from_pixmap"),
    entry_points: &["glXBindTexImageEXT"],
    always_available: false,
};
const RELEASE_TEX_IMAGE: ExtFunc = ExtFunc {
    extension: Some("GLX_EXT_texture_from_pixmap"),
    entry_points: &["glXReleaseTexImageEXT"],
    always_available: false,
};
const CREATE_PIXMAP: ExtFunc = ExtFunc {
    extension: Some("GLX_EXT_texture_from_pixmap"),
    entry_points: &["glXCreatePixmap"],
    always_available: false,
};
const DESTROY_PIXMAP: ExtFunc = ExtFunc {
    extension: Some("GLX_EXT_texture_from_pixmap"),
    entry_points: &["glXDestroyPixmap"],
    always_available: false,
};
const GEN_PROGRAMS: ExtFunc = ExtFunc {
    extension: Some("_program"),
    entry_points: &["glGenProgramsARB"],
    always_available: false,
};

impl ExtFunc {
    fn resolve(&self, extensions: &str, ws: &dyn WindowSystem) -> bool {
        let advertised = self.extension.is_none_or(|ext| extensions.contains(ext));
        let found = advertised && self.entry_points.iter().any(|name| ws.has_entry_point(name));
        found || self.always_available
    }
}

/// Optional GL functionality available on the current context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub gen_textures: bool,
    pub bind_texture: bool,
    pub bind_tex_image: bool,
    pub release_tex_image: bool,
    pub create_pixmap: bool,
    pub destroy_pixmap: bool,
    pub gen_programs: bool,
}

impl Capabilities {
    /// Resolve the optional entry points of the current context.
    pub fn probe(ws: &dyn WindowSystem) -> Self {
        let extensions = format!("{} {}", ws.gl_extensions(), ws.glx_extensions());
        debug!(%extensions, "GL extensions");

        let caps = Self {
            gen_textures: GEN_TEXTURES.resolve(&extensions, ws),
            bind_texture: BIND_TEXTURE.resolve(&extensions, ws),
            bind_tex_image: BIND_TEX_IMAGE.resolve(&extensions, ws),
            release_tex_image: RELEASE_TEX_IMAGE.resolve(&extensions, ws),
            create_pixmap: CREATE_PIXMAP.resolve(&extensions, ws),
            destroy_pixmap: DESTROY_PIXMAP.resolve(&extensions, ws),
            gen_programs: GEN_PROGRAMS.resolve(&extensions, ws),
        };

        info!(
            texture_from_pixmap = caps.texture_from_pixmap(),
            bind_texture = caps.bind_texture,
            programs = caps.gen_programs,
            "GL capabilities probed"
        );

        caps
    }

    /// Zero-copy texture sharing is usable.
    #[must_use]
    pub fn texture_from_pixmap(&self) -> bool {
        self.bind_tex_image && self.release_tex_image && self.create_pixmap && self.destroy_pixmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWindow;

    #[test]
    fn test_renderer_classification() {
        let hw = GlRenderer {
            renderer: "Mesa Intel(R) UHD Graphics".into(),
            direct: true,
        };
        assert!(hw.is_accelerated());

        let sw = GlRenderer {
            renderer: "Software Rasterizer".into(),
            direct: true,
        };
        assert!(!sw.is_accelerated());

        let indirect = GlRenderer {
            renderer: "Mesa Intel(R) UHD Graphics".into(),
            direct: false,
        };
        assert!(!indirect.is_accelerated());
    }

    #[test]
    fn test_probe_with_tfp() {
        let window = SimWindow::new();
        let caps = Capabilities::probe(&window);
        assert!(caps.bind_texture);
        assert!(caps.texture_from_pixmap());
    }

    #[test]
    fn test_probe_without_extension_string() {
        let window = SimWindow::new();
        window.state().glx_extensions = "GLX_ARB_multisample".into();
        let caps = Capabilities::probe(&window);
        // entry points alone are not enough without the advertised extension
        assert!(!caps.texture_from_pixmap());
        assert!(caps.gen_textures);
    }
}
