// SPDX-License-Identifier: MPL-2.0

//! Output geometry: fit the cropped video into the window.

use crate::frame::Crop;
use crate::va::Rect;

/// Zoom accepted by the zoom properties, in percent.
pub const ZOOM_MIN: i32 = -85;
pub const ZOOM_MAX: i32 = 400;
/// Zoom value meaning 1.0x.
pub const ZOOM_STEP: i32 = 100;

/// Smallest effective zoom factor.
const MIN_ZOOM_FACTOR: f64 = 0.01;

/// Display aspect ratio selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum AspectRatio {
    /// Use the ratio carried by the frame.
    #[default]
    Auto = 0,
    Square = 1,
    FourThree = 2,
    Anamorphic = 3,
    Dvb = 4,
}

impl AspectRatio {
    /// Out-of-range values fall back to `Auto`.
    #[must_use]
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => AspectRatio::Square,
            2 => AspectRatio::FourThree,
            3 => AspectRatio::Anamorphic,
            4 => AspectRatio::Dvb,
            _ => AspectRatio::Auto,
        }
    }

    fn ratio(self) -> Option<f64> {
        match self {
            AspectRatio::Auto | AspectRatio::Square => None,
            AspectRatio::FourThree => Some(4.0 / 3.0),
            AspectRatio::Anamorphic => Some(16.0 / 9.0),
            AspectRatio::Dvb => Some(2.11),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoScaler {
    gui_width: u32,
    gui_height: u32,

    delivered_width: u32,
    delivered_height: u32,
    delivered_ratio: f64,
    crop: Crop,

    user_ratio: AspectRatio,
    zoom_x: i32,
    zoom_y: i32,

    output: Rect,
    /// Part of the delivered frame visible in `output`, in video pixels.
    displayed: (f64, f64, f64, f64),
    force_redraw: bool,
}

impl Default for VideoScaler {
    fn default() -> Self {
        Self {
            gui_width: 0,
            gui_height: 0,
            delivered_width: 0,
            delivered_height: 0,
            delivered_ratio: 0.0,
            crop: Crop::default(),
            user_ratio: AspectRatio::Auto,
            zoom_x: ZOOM_STEP,
            zoom_y: ZOOM_STEP,
            output: Rect::default(),
            displayed: (0.0, 0.0, 0.0, 0.0),
            force_redraw: true,
        }
    }
}

impl VideoScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the geometry of the frame about to be shown.
    ///
    /// Returns `true` when any of size, ratio or crop differs from the
    /// previous frame; a redraw is forced in that case.
    pub fn update_frame(&mut self, width: u32, height: u32, ratio: f64, crop: Crop) -> bool {
        #[allow(clippy::float_cmp)]
        let changed = width != self.delivered_width
            || height != self.delivered_height
            || ratio != self.delivered_ratio
            || crop != self.crop;

        self.delivered_width = width;
        self.delivered_height = height;
        self.delivered_ratio = ratio;
        self.crop = crop;

        if changed {
            self.force_redraw = true;
        }
        changed
    }

    pub fn set_gui_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.gui_width, self.gui_height) {
            self.gui_width = width;
            self.gui_height = height;
            self.force_redraw = true;
        }
    }

    pub fn force_redraw(&mut self) {
        self.force_redraw = true;
    }

    /// Consume a pending redraw, recomputing the output rectangle.
    pub fn redraw_needed(&mut self) -> bool {
        if !self.force_redraw {
            return false;
        }
        self.force_redraw = false;
        self.compute_output_size();
        true
    }

    pub fn set_user_ratio(&mut self, ratio: AspectRatio) {
        self.user_ratio = ratio;
        self.force_redraw = true;
    }

    /// Returns `false` for a value outside the zoom range.
    pub fn set_zoom_x(&mut self, value: i32) -> bool {
        if !(ZOOM_MIN..=ZOOM_MAX).contains(&value) {
            return false;
        }
        self.zoom_x = value;
        self.force_redraw = true;
        true
    }

    /// Returns `false` for a value outside the zoom range.
    pub fn set_zoom_y(&mut self, value: i32) -> bool {
        if !(ZOOM_MIN..=ZOOM_MAX).contains(&value) {
            return false;
        }
        self.zoom_y = value;
        self.force_redraw = true;
        true
    }

    fn cropped_size(&self) -> (f64, f64) {
        let w = self
            .delivered_width
            .saturating_sub(self.crop.left + self.crop.right);
        let h = self
            .delivered_height
            .saturating_sub(self.crop.top + self.crop.bottom);
        (f64::from(w), f64::from(h))
    }

    /// Display aspect of the cropped picture.
    fn display_aspect(&self) -> f64 {
        let (w, h) = self.cropped_size();
        let image = w / h;

        match self.user_ratio {
            AspectRatio::Square => image,
            AspectRatio::Auto => {
                if self.delivered_ratio > 0.0 {
                    // the frame ratio describes the uncropped picture
                    let full = f64::from(self.delivered_width) / f64::from(self.delivered_height);
                    self.delivered_ratio * image / full
                } else {
                    image
                }
            }
            fixed => fixed.ratio().unwrap_or(image),
        }
    }

    fn compute_output_size(&mut self) {
        let (w, h) = self.cropped_size();
        if w <= 0.0 || h <= 0.0 || self.gui_width == 0 || self.gui_height == 0 {
            self.output = Rect::default();
            self.displayed = (0.0, 0.0, 0.0, 0.0);
            return;
        }

        let gui_w = f64::from(self.gui_width);
        let gui_h = f64::from(self.gui_height);
        let (fit_w, fit_h) = fit(self.display_aspect(), gui_w, gui_h);

        let out_w = fit_w * zoom_factor(self.zoom_x);
        let out_h = fit_h * zoom_factor(self.zoom_y);
        let vis_w = out_w.min(gui_w);
        let vis_h = out_h.min(gui_h);

        let shown_w = w * vis_w / out_w;
        let shown_h = h * vis_h / out_h;
        self.displayed = (
            f64::from(self.crop.left) + (w - shown_w) / 2.0,
            f64::from(self.crop.top) + (h - shown_h) / 2.0,
            shown_w,
            shown_h,
        );

        let width = vis_w.round() as u32;
        let height = vis_h.round() as u32;
        self.output = Rect::new(
            ((self.gui_width - width.min(self.gui_width)) / 2) as i32,
            ((self.gui_height - height.min(self.gui_height)) / 2) as i32,
            width,
            height,
        );
    }

    /// Map a window point to a point of the delivered frame.
    #[must_use]
    pub fn translate_gui_to_video(&self, x: i32, y: i32) -> (i32, i32) {
        let (dx, dy, dw, dh) = self.displayed;
        if self.output.width == 0 || self.output.height == 0 {
            return (x, y);
        }

        let vx = dx + f64::from(x - self.output.x) * dw / f64::from(self.output.width);
        let vy = dy + f64::from(y - self.output.y) * dh / f64::from(self.output.height);
        (vx.round() as i32, vy.round() as i32)
    }

    /// Translate a window rectangle in place.
    pub fn translate_rect(&self, rect: &mut Rect) {
        let (x1, y1) = self.translate_gui_to_video(rect.x, rect.y);
        let (x2, y2) = self.translate_gui_to_video(
            rect.x.saturating_add(rect.width as i32),
            rect.y.saturating_add(rect.height as i32),
        );
        *rect = Rect::new(
            x1,
            y1,
            x2.saturating_sub(x1).max(0) as u32,
            y2.saturating_sub(y1).max(0) as u32,
        );
    }

    #[must_use]
    pub fn output(&self) -> Rect {
        self.output
    }

    #[must_use]
    pub fn gui_size(&self) -> (u32, u32) {
        (self.gui_width, self.gui_height)
    }

    #[must_use]
    pub fn user_ratio(&self) -> AspectRatio {
        self.user_ratio
    }

    #[must_use]
    pub fn zoom(&self) -> (i32, i32) {
        (self.zoom_x, self.zoom_y)
    }
}

/// Largest `aspect`-shaped box inside the layer.
fn fit(aspect: f64, layer_width: f64, layer_height: f64) -> (f64, f64) {
    if layer_width / layer_height > aspect {
        (layer_height * aspect, layer_height)
    } else {
        (layer_width, layer_width / aspect)
    }
}

fn zoom_factor(value: i32) -> f64 {
    (f64::from(value) / f64::from(ZOOM_STEP)).max(MIN_ZOOM_FACTOR)
}
