//! Per-panel crop computation.
//!
//! Every reframe mode reduces to the same operation: slide a crop window
//! horizontally across a source frame, positioned by a percentage of the
//! usable travel. There is exactly one implementation of that operation,
//! parameterized per panel; modes differ only in how many panels they ask
//! for and what each panel's target dimensions are.

/// A crop region inside a source frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// Left edge of the crop.
    pub x: u32,
    /// Top edge of the crop.
    pub y: u32,
    /// Crop width.
    pub width: u32,
    /// Crop height.
    pub height: u32,
}

impl CropWindow {
    /// Render as FFmpeg `crop=` filter arguments.
    pub fn to_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Compute the crop window for one panel.
///
/// `crop_width_percent` fixes the crop width as a share of the source
/// width; when absent the width is derived from the panel's aspect ratio
/// (a full-height crop, as in auto-center). The window always matches the
/// panel aspect so the later scale never distorts. Horizontal travel is
/// `source width - crop width`; `crop_position` in [0, 100] selects a
/// point along it. All inputs are clamped, never rejected: these values
/// come from user-adjustable sliders.
pub fn panel_crop(
    src_width: u32,
    src_height: u32,
    panel_width: u32,
    panel_height: u32,
    crop_width_percent: Option<f64>,
    crop_position: f64,
) -> CropWindow {
    let src_w = src_width.max(2) as f64;
    let src_h = src_height.max(2) as f64;
    let panel_aspect = panel_width.max(1) as f64 / panel_height.max(1) as f64;

    let mut width = match crop_width_percent {
        Some(percent) => (percent.clamp(1.0, 100.0) / 100.0) * src_w,
        None => src_h * panel_aspect,
    };
    width = width.min(src_w);

    let mut height = width / panel_aspect;
    if height > src_h {
        // Source too short for the requested width at this aspect.
        height = src_h;
        width = (src_h * panel_aspect).min(src_w);
    }

    // Even dimensions for 4:2:0 chroma subsampling.
    let width = even_floor(width).max(2).min(even_floor(src_w).max(2));
    let height = even_floor(height).max(2).min(even_floor(src_h).max(2));

    let travel = src_w - width as f64;
    let position = crop_position.clamp(0.0, 100.0);
    let x = ((position / 100.0) * travel).round().max(0.0) as u32;
    let x = x.min((src_w as u32).saturating_sub(width));
    let y = ((src_h - height as f64) / 2.0).floor().max(0.0) as u32;
    let y = y.min((src_h as u32).saturating_sub(height));

    CropWindow {
        x,
        y,
        width,
        height,
    }
}

fn even_floor(v: f64) -> u32 {
    (v.max(0.0) as u32) & !1
}
