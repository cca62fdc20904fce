// SPDX-License-Identifier: MPL-2.0

//! Subtitle and OSD compositing.
//!
//! Every overlay batch goes through three steps:
//!
//! ```text
//! begin(changed) ──► blend(layer) x N ──► end(frame, gui)
//!                                            │ merge into one ARGB bitmap
//!                                            ▼
//!                          associate(has_overlay) ──► subpicture on surfaces
//! ```
//!
//! Layers are either run-length encoded with a palette (DVD/DVB
//! subtitles) or pre-rendered ARGB buffers shared with their producer. The
//! composite bitmap only ever grows; a smaller batch reuses the allocation
//! after zero-filling it.

use std::sync::{Arc, Mutex, PoisonError};

use drm_fourcc::DrmFourcc;
use tracing::{debug, warn};

use crate::context::HardwareContext;
use crate::error::{Result, VoError};
use crate::va::{Rect, VaDisplay, with_mapped};

/// Maximum number of layers in one batch.
pub const MAX_LAYERS: usize = 16;

/// Far edge limit for a layer on either axis.
pub const MAX_EXTENT: i32 = 16384;

/// Pixel format of the composite bitmap as the driver sees it (BGRA bytes).
pub const SUBPICTURE_FORMAT: DrmFourcc = DrmFourcc::Argb8888;

/// One run of the RLE image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleElem {
    pub len: u16,
    pub color: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ycbcr {
    pub y: u8,
    pub cb: u8,
    pub cr: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Ycbcr> for Rgb {
    /// BT.601 studio swing.
    fn from(c: Ycbcr) -> Self {
        let y = 298 * (i32::from(c.y) - 16);
        let d = i32::from(c.cb) - 128;
        let e = i32::from(c.cr) - 128;
        let clamp = |v: i32| ((v + 128) >> 8).clamp(0, 255) as u8;
        Rgb {
            r: clamp(y + 409 * e),
            g: clamp(y - 100 * d - 208 * e),
            b: clamp(y + 516 * d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Palette {
    Ycbcr(Vec<Ycbcr>),
    Rgb(Vec<Rgb>),
}

impl Palette {
    fn convert_to_rgb(&mut self) {
        if let Palette::Ycbcr(colors) = self {
            *self = Palette::Rgb(colors.iter().copied().map(Rgb::from).collect());
        }
    }

    fn rgb(&self, index: u8) -> Rgb {
        match self {
            Palette::Rgb(colors) => colors.get(usize::from(index)).copied().unwrap_or_default(),
            Palette::Ycbcr(colors) => colors
                .get(usize::from(index))
                .copied()
                .map(Rgb::from)
                .unwrap_or_default(),
        }
    }
}

/// Inclusive highlight rectangle in layer coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Highlight {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Highlight {
    fn contains(&self, x: i32, y: i32) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }
}

/// Run-length encoded layer content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleImage {
    pub rle: Vec<RleElem>,
    pub colors: Palette,
    /// 4-bit transparency per palette index.
    pub trans: Vec<u8>,
    pub hili_colors: Palette,
    pub hili_trans: Vec<u8>,
    pub hili: Highlight,
}

impl RleImage {
    /// Decode into a `width * height` ARGB buffer. Runs past the end are cut.
    fn decode(&self, width: usize, height: usize) -> Vec<u32> {
        let total = width * height;
        let mut out = Vec::with_capacity(total);

        for run in &self.rle {
            if out.len() >= total {
                break;
            }

            let normal = argb(&self.colors, &self.trans, run.color);
            let highlighted = argb(&self.hili_colors, &self.hili_trans, run.color);

            let pos = out.len();
            let n = usize::from(run.len).min(total - pos);
            out.extend((pos..pos + n).map(|i| {
                let (x, y) = ((i % width) as i32, (i / width) as i32);
                if self.hili.contains(x, y) {
                    highlighted
                } else {
                    normal
                }
            }));
        }

        out.resize(total, 0);
        out
    }
}

fn argb(colors: &Palette, trans: &[u8], index: u8) -> u32 {
    let alpha = u32::from(trans.get(usize::from(index)).copied().unwrap_or(0));
    if alpha == 0 {
        return 0;
    }
    let Rgb { r, g, b } = colors.rgb(index);
    ((alpha * 255 / 15) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Pre-rendered ARGB layer written by another thread.
#[derive(Debug, Default)]
pub struct ArgbLayer {
    pub buffer: Mutex<Vec<u32>>,
    /// Region the producer last touched, `x1, y1, x2, y2`.
    pub dirty: Mutex<(i32, i32, i32, i32)>,
}

impl ArgbLayer {
    #[must_use]
    pub fn new(buffer: Vec<u32>) -> Self {
        Self {
            buffer: Mutex::new(buffer),
            dirty: Mutex::new((0, 0, 0, 0)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LayerContent {
    Rle(RleImage),
    Argb(Arc<ArgbLayer>),
}

/// One overlay handed to [`OverlayCompositor::blend`].
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Placed in screen space rather than video space.
    pub unscaled: bool,
    pub content: LayerContent,
}

impl OverlayLayer {
    fn has_pixels(&self) -> bool {
        match &self.content {
            LayerContent::Rle(image) => !image.rle.is_empty(),
            LayerContent::Argb(layer) => !layer
                .buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty(),
        }
    }

    fn in_range(&self) -> bool {
        let far = |origin: i32, len: i32| {
            origin
                .checked_add(len)
                .is_some_and(|edge| edge <= MAX_EXTENT)
        };
        far(self.x, self.width) && far(self.y, self.height)
    }

    fn bounds(&self) -> DirtyRect {
        DirtyRect {
            x1: self.x,
            y1: self.y,
            x2: self.x.saturating_add(self.width),
            y2: self.y.saturating_add(self.height),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl DirtyRect {
    fn union(self, other: DirtyRect) -> DirtyRect {
        DirtyRect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

/// What [`OverlayCompositor::end`] did with the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No batch was open.
    Idle,
    /// Batch was empty; the bitmap was cleared in place.
    Cleared,
    /// Layers were merged; the bitmap must be associated.
    Merged { has_overlay: bool },
}

#[derive(Debug, Default)]
pub struct OverlayCompositor {
    batch_open: bool,
    layers: Vec<OverlayLayer>,
    bitmap: Vec<u32>,
    bitmap_width: u32,
    bitmap_height: u32,
    allocations: usize,
    output_size: (u32, u32),
    unscaled_size: (u32, u32),
    dirty: Option<DirtyRect>,
    unscaled_dirty: Option<DirtyRect>,
    has_overlay: bool,
    osd_displayed: bool,
    /// Fixed OSD size requested by external sources, `0` when unset.
    pub min_size: (u32, u32),
}

impl OverlayCompositor {
    #[must_use]
    pub fn new(min_size: (u32, u32)) -> Self {
        Self {
            min_size,
            ..Self::default()
        }
    }

    /// Open a batch when the overlay changed.
    ///
    /// Returns `true` when the caller has to hide the current subpicture.
    pub fn begin(&mut self, changed: bool) -> bool {
        if !changed {
            return false;
        }

        self.has_overlay = false;
        self.batch_open = true;
        self.layers.clear();
        self.osd_displayed = false;
        true
    }

    /// Queue a layer for the open batch.
    pub fn blend(&mut self, mut layer: OverlayLayer) -> bool {
        if !self.batch_open || self.layers.len() >= MAX_LAYERS {
            return false;
        }
        if layer.width <= 0 || layer.height <= 0 || !layer.has_pixels() {
            return false;
        }
        if !layer.in_range() {
            warn!(
                x = layer.x,
                y = layer.y,
                width = layer.width,
                height = layer.height,
                "overlay layer out of range"
            );
            return false;
        }

        if let LayerContent::Rle(image) = &mut layer.content {
            image.colors.convert_to_rgb();
            image.hili_colors.convert_to_rgb();
        }

        debug!(
            index = self.layers.len(),
            x = layer.x,
            y = layer.y,
            width = layer.width,
            height = layer.height,
            unscaled = layer.unscaled,
            "overlay layer queued"
        );
        self.layers.push(layer);
        true
    }

    /// Merge the queued layers into the composite bitmap.
    pub fn end(&mut self, frame_size: (u32, u32), gui_size: (u32, u32)) -> MergeOutcome {
        if !self.batch_open {
            return MergeOutcome::Idle;
        }
        self.batch_open = false;

        if self.layers.is_empty() {
            self.bitmap.fill(0);
            return MergeOutcome::Cleared;
        }

        let (mut output_w, mut output_h) = frame_size;
        let mut unscaled = (0u32, 0u32);
        let mut scaled_dirty: Option<DirtyRect> = None;
        let mut unscaled_dirty: Option<DirtyRect> = None;
        let mut has_rle = false;

        for layer in &self.layers {
            has_rle |= matches!(layer.content, LayerContent::Rle(_));
            let bounds = layer.bounds();

            if layer.unscaled {
                let union = unscaled_dirty.map_or(bounds, |d| d.union(bounds));
                unscaled_dirty = Some(union);
                unscaled = (clamp_u32(union.x2), clamp_u32(union.y2));
            } else {
                let union = scaled_dirty.map_or(bounds, |d| d.union(bounds));
                scaled_dirty = Some(union);
                output_w = output_w.max(clamp_u32(union.x2));
                output_h = output_h.max(clamp_u32(union.y2));
            }
        }

        // Any layer of a group forces that group's re-init.
        let need_init = scaled_dirty.is_some();
        let need_unscaled_init = unscaled_dirty.is_some();

        if need_init {
            self.output_size = (output_w, output_h);
            self.dirty = scaled_dirty;
        }
        if need_unscaled_init {
            self.unscaled_size = unscaled;
            self.unscaled_dirty = unscaled_dirty;
        }

        if has_rle || need_init || need_unscaled_init {
            if need_init {
                self.bitmap_width = output_w;
                self.bitmap_height = output_h;
            }
            if need_unscaled_init {
                (self.bitmap_width, self.bitmap_height) = self.target_size(unscaled, gui_size);
            } else if need_init {
                (self.bitmap_width, self.bitmap_height) =
                    self.target_size((output_w, output_h), gui_size);
            }
        }

        let needed = self.bitmap_width as usize * self.bitmap_height as usize;
        if needed > self.bitmap.len() {
            self.bitmap = vec![0; needed];
            self.allocations += 1;
            debug!(
                width = self.bitmap_width,
                height = self.bitmap_height,
                "overlay bitmap grown"
            );
        } else {
            self.bitmap.fill(0);
        }

        let layers = std::mem::take(&mut self.layers);
        for layer in &layers {
            self.blit(layer);
        }

        self.has_overlay = need_init || need_unscaled_init;
        MergeOutcome::Merged {
            has_overlay: self.has_overlay,
        }
    }

    /// Bitmap size for a union, honoring the fixed OSD size and the window.
    fn target_size(&self, union: (u32, u32), gui: (u32, u32)) -> (u32, u32) {
        let pick = |forced: u32, computed: u32, gui: u32| {
            if forced != 0 {
                forced.max(gui)
            } else {
                computed.max(gui)
            }
        };
        (
            pick(self.min_size.0, union.0, gui.0),
            pick(self.min_size.1, union.1, gui.1),
        )
    }

    fn blit(&mut self, layer: &OverlayLayer) {
        let (width, height) = (layer.width as usize, layer.height as usize);
        match &layer.content {
            LayerContent::Rle(image) => {
                let pixels = image.decode(width, height);
                self.copy_rows(layer, &pixels);
            }
            LayerContent::Argb(argb) => {
                let pixels = argb.buffer.lock().unwrap_or_else(PoisonError::into_inner);
                self.copy_rows(layer, &pixels);
            }
        }
    }

    fn copy_rows(&mut self, layer: &OverlayLayer, src: &[u32]) {
        let bw = self.bitmap_width as i64;
        let bh = self.bitmap_height as i64;
        let lw = i64::from(layer.width);

        // Horizontal clip, shared by every row.
        let x0 = i64::from(layer.x).max(0);
        let x1 = (i64::from(layer.x) + lw).min(bw);
        if x0 >= x1 {
            return;
        }
        let skip = (x0 - i64::from(layer.x)) as usize;
        let n = (x1 - x0) as usize;

        for row in 0..i64::from(layer.height) {
            let y = i64::from(layer.y) + row;
            if y >= bh {
                break;
            }
            if y < 0 {
                continue;
            }

            let src_start = row as usize * layer.width as usize + skip;
            let dst_start = (y * bw + x0) as usize;
            let (Some(s), Some(d)) = (
                src.get(src_start..src_start + n),
                self.bitmap.get_mut(dst_start..dst_start + n),
            ) else {
                break;
            };
            d.copy_from_slice(s);
        }
    }

    /// Show or hide the composite bitmap on the context's surfaces.
    ///
    /// Returns `Ok(false)` when nothing was done.
    ///
    /// # Errors
    ///
    /// `AssociationFailure` when the subpicture could not be attached; the
    /// OSD stays hidden until the next batch.
    pub fn associate(
        &mut self,
        display: &mut dyn VaDisplay,
        context: &mut HardwareContext,
        show: bool,
    ) -> Result<bool> {
        if !context.is_ready() {
            return Ok(false);
        }

        if !show {
            if context.osd_associated() {
                context.destroy_subpicture(display);
            }
            return Ok(true);
        }

        if self.osd_displayed {
            return Ok(false);
        }

        context.destroy_subpicture(display);
        let (subpicture, image) =
            match context.create_subpicture(display, self.bitmap_width, self.bitmap_height) {
                Ok(created) => created,
                Err(why) => {
                    warn!(%why, "overlay subpicture unavailable");
                    return Ok(true);
                }
            };

        let row = self.bitmap_width as usize;
        let pitch = image.pitches[0] as usize;
        let bitmap = &self.bitmap;
        let upload = with_mapped(display, image.buf, |bytes| {
            for (src, dst) in bitmap
                .chunks(row)
                .take(image.height as usize)
                .zip(bytes.chunks_mut(pitch))
            {
                for (pixel, out) in src.iter().zip(dst.chunks_exact_mut(4)) {
                    out.copy_from_slice(&pixel.to_le_bytes());
                }
            }
        });
        if let Err(why) = upload {
            warn!(%why, "overlay upload skipped");
        }

        let targets = context.osd_targets();
        let result = display.associate_subpicture(
            subpicture,
            &targets,
            Rect::sized(image.width, image.height),
            Rect::sized(context.width(), context.height()),
        );

        match result {
            Ok(()) => {
                self.osd_displayed = true;
                context.set_osd_associated(true);
                debug!(
                    width = image.width,
                    height = image.height,
                    surfaces = targets.len(),
                    "overlay associated"
                );
                Ok(true)
            }
            Err(why) => {
                self.osd_displayed = false;
                context.set_osd_associated(false);
                warn!(%why, "overlay association failed");
                Err(VoError::AssociationFailure {
                    call: "vaAssociateSubpicture",
                })
            }
        }
    }

    /// Forget the association state after the context was closed.
    pub fn reset_association(&mut self) {
        self.osd_displayed = false;
    }

    #[must_use]
    pub fn has_overlay(&self) -> bool {
        self.has_overlay
    }

    #[must_use]
    pub fn bitmap_size(&self) -> (u32, u32) {
        (self.bitmap_width, self.bitmap_height)
    }

    /// Visible part of the composite bitmap.
    #[must_use]
    pub fn bitmap(&self) -> &[u32] {
        let len = (self.bitmap_width as usize * self.bitmap_height as usize).min(self.bitmap.len());
        &self.bitmap[..len]
    }

    /// Allocated pixel count of the composite bitmap.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bitmap.len()
    }

    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    #[must_use]
    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    #[must_use]
    pub fn unscaled_size(&self) -> (u32, u32) {
        self.unscaled_size
    }

    #[must_use]
    pub fn dirty(&self) -> Option<DirtyRect> {
        self.dirty
    }

    #[must_use]
    pub fn unscaled_dirty(&self) -> Option<DirtyRect> {
        self.unscaled_dirty
    }
}

fn clamp_u32(v: i32) -> u32 {
    v.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[(u8, u8, u8)]) -> Palette {
        Palette::Rgb(colors.iter().map(|&(r, g, b)| Rgb { r, g, b }).collect())
    }

    fn rle_layer(x: i32, y: i32, width: i32, height: i32, runs: &[(u16, u8)]) -> OverlayLayer {
        OverlayLayer {
            x,
            y,
            width,
            height,
            unscaled: false,
            content: LayerContent::Rle(RleImage {
                rle: runs
                    .iter()
                    .map(|&(len, color)| RleElem { len, color })
                    .collect(),
                colors: palette(&[(0, 0, 0), (255, 0, 0), (0, 0, 255)]),
                trans: vec![0, 15, 8],
                hili_colors: palette(&[(0, 0, 0), (0, 255, 0), (0, 255, 0)]),
                hili_trans: vec![0, 15, 15],
                hili: Highlight {
                    left: -1,
                    top: -1,
                    right: -1,
                    bottom: -1,
                },
            }),
        }
    }

    fn argb_layer(x: i32, y: i32, width: i32, height: i32, fill: u32) -> OverlayLayer {
        OverlayLayer {
            x,
            y,
            width,
            height,
            unscaled: false,
            content: LayerContent::Argb(Arc::new(ArgbLayer::new(vec![
                fill;
                (width * height) as usize
            ]))),
        }
    }

    #[test]
    fn test_ycbcr_to_rgb() {
        let white = Rgb::from(Ycbcr {
            y: 235,
            cb: 128,
            cr: 128,
        });
        assert_eq!(white, Rgb { r: 255, g: 255, b: 255 });

        let black = Rgb::from(Ycbcr {
            y: 16,
            cb: 128,
            cr: 128,
        });
        assert_eq!(black, Rgb { r: 0, g: 0, b: 0 });
    }

    #[test]
    fn test_rle_layer_is_resolved_pixel_for_pixel() {
        let mut ovl = OverlayCompositor::new((0, 0));
        assert!(ovl.begin(true));
        // 4x2 layer: row 0 = red, red, blue, blue; row 1 = clear, clear, red, red
        assert!(ovl.blend(rle_layer(2, 1, 4, 2, &[(2, 1), (2, 2), (2, 0), (2, 1)])));
        let outcome = ovl.end((8, 4), (0, 0));
        assert_eq!(outcome, MergeOutcome::Merged { has_overlay: true });
        assert_eq!(ovl.bitmap_size(), (8, 4));

        let red: u32 = 0xff_ff_00_00;
        let blue: u32 = ((8 * 255 / 15) << 24) | 0xff;
        let bitmap = ovl.bitmap();
        for y in 0..4 {
            for x in 0..8 {
                let expected = match (x, y) {
                    (2 | 3, 1) => red,
                    (4 | 5, 1) => blue,
                    (4 | 5, 2) => red,
                    _ => 0,
                };
                assert_eq!(bitmap[y * 8 + x], expected, "pixel {x},{y}");
            }
        }
    }

    #[test]
    fn test_highlight_palette_applies_inside_rect() {
        let mut layer = rle_layer(0, 0, 4, 1, &[(2, 1), (2, 1)]);
        if let LayerContent::Rle(image) = &mut layer.content {
            image.hili = Highlight {
                left: 2,
                top: 0,
                right: 3,
                bottom: 0,
            };
        }

        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        ovl.blend(layer);
        ovl.end((4, 1), (0, 0));
        assert_eq!(ovl.bitmap()[..4], [0xffff_0000_u32, 0xffff_0000, 0xff00_ff00, 0xff00_ff00]);
    }

    #[test]
    fn test_highlight_splits_run_at_rect_edge() {
        let mut layer = rle_layer(0, 0, 4, 2, &[(6, 1)]);
        if let LayerContent::Rle(image) = &mut layer.content {
            image.hili = Highlight {
                left: 2,
                top: 0,
                right: 3,
                bottom: 0,
            };
        }

        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        ovl.blend(layer);
        ovl.end((4, 2), (0, 0));
        let (red, green) = (0xffff_0000_u32, 0xff00_ff00_u32);
        assert_eq!(ovl.bitmap()[..4], [red, red, green, green]);
        // second row is outside the rectangle
        assert_eq!(ovl.bitmap()[4..8], [red, red, 0, 0]);
    }

    #[test]
    fn test_layer_past_max_extent_is_rejected() {
        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        assert!(!ovl.blend(argb_layer(i32::MAX - 1, 0, 4, 1, 0xffffffff)));
        assert!(!ovl.blend(argb_layer(0, MAX_EXTENT, 4, 1, 0xffffffff)));
        assert!(ovl.blend(argb_layer(0, 0, 4, 1, 0xffffffff)));
        assert_eq!(ovl.end((8, 8), (0, 0)), MergeOutcome::Merged { has_overlay: true });
        assert_eq!(ovl.bitmap_size(), (8, 8));
    }

    #[test]
    fn test_empty_batch_clears_previous_bitmap() {
        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        ovl.blend(argb_layer(0, 0, 4, 4, 0xffffffff));
        ovl.end((16, 8), (0, 0));
        assert!(ovl.has_overlay());

        ovl.begin(true);
        assert_eq!(ovl.end((16, 8), (0, 0)), MergeOutcome::Cleared);
        assert!(!ovl.has_overlay());
        assert_eq!(ovl.bitmap_size(), (16, 8));
        assert!(ovl.bitmap().iter().all(|p| *p == 0));
    }

    #[test]
    fn test_end_without_batch_is_idle() {
        let mut ovl = OverlayCompositor::new((0, 0));
        assert!(!ovl.begin(false));
        assert!(!ovl.blend(argb_layer(0, 0, 2, 2, 1)));
        assert_eq!(ovl.end((4, 4), (0, 0)), MergeOutcome::Idle);
    }

    #[test]
    fn test_bitmap_grows_but_never_shrinks() {
        let mut ovl = OverlayCompositor::new((0, 0));
        let mut last = 0;
        for size in [8, 32, 64] {
            ovl.begin(true);
            ovl.blend(argb_layer(0, 0, size, size, 1));
            ovl.end((4, 4), (0, 0));
            assert!(ovl.capacity() >= last);
            last = ovl.capacity();
        }
        assert_eq!(ovl.allocations(), 3);

        ovl.begin(true);
        ovl.blend(argb_layer(0, 0, 4, 4, 1));
        ovl.end((4, 4), (0, 0));
        assert_eq!(ovl.capacity(), last);
        assert_eq!(ovl.allocations(), 3);
        assert_eq!(ovl.bitmap_size(), (4, 4));
    }

    #[test]
    fn test_invalid_layers_ignored() {
        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        assert!(!ovl.blend(argb_layer(0, 0, 0, 4, 1)));
        assert!(!ovl.blend(rle_layer(0, 0, 4, 4, &[])));
        for _ in 0..MAX_LAYERS {
            assert!(ovl.blend(argb_layer(0, 0, 1, 1, 1)));
        }
        assert!(!ovl.blend(argb_layer(0, 0, 1, 1, 1)));
    }

    #[test]
    fn test_unscaled_sizing_uses_override_and_gui() {
        let mut ovl = OverlayCompositor::new((720, 0));
        ovl.begin(true);
        let mut layer = argb_layer(10, 10, 100, 50, 1);
        layer.unscaled = true;
        ovl.blend(layer);
        ovl.end((320, 240), (640, 40));

        assert_eq!(ovl.bitmap_size(), (720, 60));
        assert_eq!(ovl.unscaled_size(), (110, 60));
    }

    #[test]
    fn test_layers_clip_to_bitmap() {
        let mut ovl = OverlayCompositor::new((0, 0));
        ovl.begin(true);
        ovl.blend(argb_layer(0, 0, 4, 4, 1));
        // straddles the left and top edges
        ovl.blend(argb_layer(-2, -2, 4, 4, 2));
        ovl.end((4, 4), (0, 0));

        let bitmap = ovl.bitmap();
        assert_eq!(bitmap[0], 2);
        assert_eq!(bitmap[1], 2);
        assert_eq!(bitmap[2], 1);
        assert_eq!(bitmap[4 * 2], 1);
    }
}
