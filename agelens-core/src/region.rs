//! Face region geometry and bounds clamping.

/// A face region requested directly by the caller, in raw (unvalidated)
/// image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualRegion {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Axis-aligned face rectangle in image pixel coordinates.
///
/// Invariant: the rectangle is fully contained within the image it was
/// produced for (`x + width <= image width`, `y + height <= image height`)
/// and has non-zero area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    /// The x-coordinate of the top-left corner.
    pub x: u32,
    /// The y-coordinate of the top-left corner.
    pub y: u32,
    /// The width of the region.
    pub width: u32,
    /// The height of the region.
    pub height: u32,
    /// Locator certainty in `[0, 1]`.
    pub confidence: f32,
    /// Whether the region was supplied by the caller rather than detected.
    pub is_manual: bool,
}

impl FaceRegion {
    /// Pixel area of the region.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Build a region from raw detector output, clamping it to image bounds.
    ///
    /// Returns `None` when the clamped rectangle would be degenerate (zero
    /// width or height), which callers treat as "discard this detection".
    pub fn from_detection(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        confidence: f32,
        bounds: (u32, u32),
    ) -> Option<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }
        let clamped = clamp_rect(
            x.floor() as i64,
            y.floor() as i64,
            width.round() as i64,
            height.round() as i64,
            bounds,
        )?;
        Some(Self {
            x: clamped.0,
            y: clamped.1,
            width: clamped.2,
            height: clamped.3,
            confidence: confidence.clamp(0.0, 1.0),
            is_manual: false,
        })
    }

    /// Validate a caller-supplied region and clamp it to image bounds.
    ///
    /// A region with no overlap with the image at all is rejected (returns
    /// `None`) so the locator can fall through to automatic detection.
    /// Accepted regions carry `confidence = 1.0` and `is_manual = true`.
    pub fn from_manual(region: &ManualRegion, bounds: (u32, u32)) -> Option<Self> {
        let clamped = clamp_rect(region.x, region.y, region.width, region.height, bounds)?;
        Some(Self {
            x: clamped.0,
            y: clamped.1,
            width: clamped.2,
            height: clamped.3,
            confidence: 1.0,
            is_manual: true,
        })
    }

    /// Returns `true` when the region is fully contained in `bounds`.
    pub fn contained_in(&self, bounds: (u32, u32)) -> bool {
        let (w, h) = bounds;
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= w)
            && self.y.checked_add(self.height).is_some_and(|b| b <= h)
    }
}

/// Clamp a raw rectangle into image bounds.
///
/// Rejects rectangles with non-positive size, rectangles starting past the
/// image edges, and rectangles that end before the image origin. Surviving
/// rectangles are trimmed so that `x + w <= W` and `y + h <= H`.
fn clamp_rect(x: i64, y: i64, w: i64, h: i64, bounds: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let (img_w, img_h) = (bounds.0 as i64, bounds.1 as i64);
    if img_w == 0 || img_h == 0 || w <= 0 || h <= 0 {
        return None;
    }
    // Entirely outside the image in either axis.
    if x >= img_w || y >= img_h || x + w <= 0 || y + h <= 0 {
        return None;
    }

    let cx = x.clamp(0, img_w - 1);
    let cy = y.clamp(0, img_h - 1);
    // Shrink by whatever was cut off on the left/top, then fit to the edge.
    let cw = (w - (cx - x)).clamp(1, img_w - cx);
    let ch = (h - (cy - y)).clamp(1, img_h - cy);

    Some((cx as u32, cy as u32, cw as u32, ch as u32))
}
