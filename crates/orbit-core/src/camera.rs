//! Camera framing around the tracked body.

use rapier2d::prelude::Vector;
use serde::{Deserialize, Serialize};

/// Space kept between the tracked body and the edge of the view.
pub const CAMERA_MARGIN: f32 = 2.0;

pub const MIN_VIEW_WIDTH: f32 = 150.0;
pub const MIN_VIEW_HEIGHT: f32 = 75.0;
pub const MAX_VIEW_WIDTH: f32 = 300.0;
pub const MAX_VIEW_HEIGHT: f32 = 150.0;

/// Window size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[allow(clippy::cast_precision_loss)]
    fn size(self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }

    fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// World-space origin of the bottom-left window corner plus zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vector,
    pub pixels_per_meter: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector::new(-50.0, -50.0),
            pixels_per_meter: 10.0,
        }
    }
}

impl Camera {
    /// Width and height of the visible world area.
    pub fn view_size(&self, viewport: Viewport) -> Vector {
        let (w, h) = viewport.size();
        Vector::new(w, h) / self.pixels_per_meter
    }

    /// World coordinates of the top-right window corner.
    pub fn upper_corner(&self, viewport: Viewport) -> Vector {
        self.position + self.view_size(viewport)
    }

    /// Converts a window pixel (origin top-left, y down) to world coordinates.
    #[allow(clippy::cast_precision_loss)]
    pub fn point_to_world(&self, viewport: Viewport, x: i32, y: i32) -> Vector {
        let (_, h) = viewport.size();
        Vector::new(
            self.position.x + x as f32 / self.pixels_per_meter,
            self.position.y + (h - y as f32) / self.pixels_per_meter,
        )
    }

    /// Derives a view centered on the origin that keeps a body of `radius`
    /// at `center` framed, preserving the window's aspect ratio.
    ///
    /// When the body has left the current view the required bounds grow to
    /// cover both; otherwise they shrink to their overlap. The resulting
    /// size is clamped to the view limits, max width first, then min width,
    /// max height, min height. A zero-sized viewport leaves the camera as is.
    #[must_use]
    pub fn fit(&self, viewport: Viewport, center: Vector, radius: f32) -> Camera {
        if viewport.is_empty() {
            return *self;
        }
        let (win_w, win_h) = viewport.size();
        let ratio = win_w / win_h;

        let lower = self.position;
        let upper = self.upper_corner(viewport);
        let reach = radius + CAMERA_MARGIN;
        let body_max = center + Vector::new(reach, reach);
        let body_min = center - Vector::new(reach, reach);

        let outside = body_max.x > upper.x
            || body_max.y > upper.y
            || body_min.x < lower.x
            || body_min.y < lower.y;

        let (max, min) = if outside {
            (
                Vector::new(body_max.x.max(upper.x), body_max.y.max(upper.y)),
                Vector::new(body_min.x.min(lower.x), body_min.y.min(lower.y)),
            )
        } else {
            (
                Vector::new(body_max.x.min(upper.x), body_max.y.min(upper.y)),
                Vector::new(body_min.x.max(lower.x), body_min.y.max(lower.y)),
            )
        };

        let half_x = max.x.abs().max(min.x.abs());
        let half_y = max.y.abs().max(min.y.abs());

        let (width_from_x, height_from_x) = (2.0 * half_x, 2.0 * half_x / ratio);
        let (width_from_y, height_from_y) = (2.0 * half_y * ratio, 2.0 * half_y);
        let (mut width, mut height) = if width_from_x > width_from_y {
            (width_from_x, height_from_x)
        } else {
            (width_from_y, height_from_y)
        };

        if width > MAX_VIEW_WIDTH {
            width = MAX_VIEW_WIDTH;
            height = width / ratio;
        }
        if width < MIN_VIEW_WIDTH {
            width = MIN_VIEW_WIDTH;
            height = width / ratio;
        }
        if height > MAX_VIEW_HEIGHT {
            height = MAX_VIEW_HEIGHT;
            width = height * ratio;
        }
        if height < MIN_VIEW_HEIGHT {
            height = MIN_VIEW_HEIGHT;
            width = height * ratio;
        }

        tracing::debug!(width, height, outside, "camera refit");
        Camera {
            position: Vector::new(-width / 2.0, -height / 2.0),
            pixels_per_meter: win_w / width,
        }
    }
}
