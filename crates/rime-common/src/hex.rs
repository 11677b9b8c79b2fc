//! Axial hex coordinates and the pixel layout used to display them.
//!
//! Cells are addressed by axial `(q, r)` with the implicit cube coordinate
//! `s = -q - r`. The ring of a cell is its hex distance from the origin.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axial hex coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Axial {
    /// Column axis
    pub q: i32,
    /// Row axis
    pub r: i32,
}

impl Axial {
    /// The seed cell at the centre of the domain.
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Creates a new axial coordinate.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Implicit third cube coordinate.
    #[must_use]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Hex distance from the origin: `max(|q|, |r|, |s|)`.
    #[must_use]
    pub fn ring(self) -> u32 {
        self.q
            .unsigned_abs()
            .max(self.r.unsigned_abs())
            .max(self.s().unsigned_abs())
    }

    /// Row-major index inside the square window of side `2 * radius + 1`.
    ///
    /// Returns `None` when the coordinate lies outside the window. Cells
    /// inside the window but beyond `radius` still get an index; they are
    /// the zero-padded corners of the window.
    #[must_use]
    pub fn window_index(self, radius: u32) -> Option<usize> {
        let radius = radius as i32;
        let side = 2 * radius + 1;
        let column = self.q + radius;
        let row = self.r + radius;
        if column < 0 || row < 0 || column >= side || row >= side {
            return None;
        }
        Some((row * side + column) as usize)
    }
}

/// Rounds fractional axial coordinates to the containing hex.
#[must_use]
pub fn round_axial(q: f32, r: f32) -> Axial {
    let s = -q - r;
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }

    Axial::new(rq as i32, rr as i32)
}

/// Pointy-top layout that fits a domain of the given radius into a viewport.
///
/// The raster shader applies the same transform, so a pixel resolved here
/// names the cell drawn under it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexLayout {
    /// Viewport size in pixels
    pub viewport: Vec2,
    /// Distance from a hex centre to a corner, in pixels
    pub hex_size: f32,
}

impl HexLayout {
    /// Creates the layout for a `width` x `height` viewport and domain radius.
    #[must_use]
    pub fn fit(width: u32, height: u32, radius: u32) -> Self {
        let viewport = Vec2::new(width as f32, height as f32);
        let extent = viewport.min_element();
        let hex_size = extent / (3.0_f32.sqrt() * (2 * radius + 1) as f32);
        Self { viewport, hex_size }
    }

    /// Maps a pixel position (origin top-left, y down) to the hex under it.
    #[must_use]
    pub fn pixel_to_axial(&self, pixel: Vec2) -> Axial {
        if self.hex_size <= 0.0 {
            return Axial::ORIGIN;
        }
        let p = (pixel - self.viewport * 0.5) / self.hex_size;
        let q = 3.0_f32.sqrt() / 3.0 * p.x - p.y / 3.0;
        let r = 2.0 / 3.0 * p.y;
        round_axial(q, r)
    }

    /// Pixel position of a hex centre.
    #[must_use]
    pub fn axial_to_pixel(&self, coord: Axial) -> Vec2 {
        let q = coord.q as f32;
        let r = coord.r as f32;
        let x = self.hex_size * 3.0_f32.sqrt() * (q + r / 2.0);
        let y = self.hex_size * 1.5 * r;
        Vec2::new(x, y) + self.viewport * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_index_row_major() {
        assert_eq!(Axial::new(-2, -2).window_index(2), Some(0));
        assert_eq!(Axial::new(-1, -2).window_index(2), Some(1));
        assert_eq!(Axial::new(-2, -1).window_index(2), Some(5));
        assert_eq!(Axial::ORIGIN.window_index(2), Some(12));
        assert_eq!(Axial::new(3, 0).window_index(2), None);
    }

    #[test]
    fn test_layout_centre_is_origin() {
        let layout = HexLayout::fit(800, 600, 50);
        assert_eq!(layout.pixel_to_axial(Vec2::new(400.0, 300.0)), Axial::ORIGIN);
    }

    #[test]
    fn test_layout_domain_fits_shorter_side() {
        let radius = 40;
        let layout = HexLayout::fit(1024, 512, radius);
        let edge = layout.axial_to_pixel(Axial::new(radius as i32, 0));
        assert!(edge.x < 1024.0);
        let corner = layout.axial_to_pixel(Axial::new(0, radius as i32));
        assert!(corner.y < 512.0);
    }

    proptest! {
        #[test]
        fn prop_hex_centre_round_trips(q in -60i32..60, r in -60i32..60) {
            let layout = HexLayout::fit(1920, 1080, 64);
            let coord = Axial::new(q, r);
            prop_assert_eq!(layout.pixel_to_axial(layout.axial_to_pixel(coord)), coord);
        }
    }
}
