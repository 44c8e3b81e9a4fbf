//! Off-screen pixel store and the primitive rasterizer the engine draws with.
//!
//! One contiguous RGB565 buffer, allocated once and never resized. Every
//! primitive clips against the buffer bounds itself: the engine's projection
//! math routinely lands a pixel or two outside the screen and that must stay
//! a silent no-op, never memory corruption and never an aborted frame.

use alloc::vec::Vec;
use embedded_graphics::{
    draw_target::DrawTarget,
    pixelcolor::{
        raw::{RawData, RawU16},
        Rgb565,
    },
    prelude::*,
};

pub struct FrameBuffer {
    pixels: Vec<u16>,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    /// Fallible allocation of `width * height` RGB565 pixels. `None` means
    /// rendering stays disabled; callers decide whether that is fatal.
    pub fn allocate(width: usize, height: usize) -> Option<Self> {
        let len = width.checked_mul(height)?;
        let mut pixels: Vec<u16> = Vec::new();
        if pixels.try_reserve_exact(len).is_err() {
            return None;
        }
        pixels.resize(len, 0);
        Some(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw pixel view for the display transport's bulk transfer.
    pub fn as_pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    #[inline]
    pub fn draw_pixel(&mut self, x: i32, y: i32, color: u16) {
        if x < 0 || x >= self.width as i32 || y < 0 || y >= self.height as i32 {
            return;
        }
        self.pixels[y as usize * self.width + x as usize] = color;
    }

    pub fn draw_hline(&mut self, x: i32, y: i32, w: i32, color: u16) {
        if y < 0 || y >= self.height as i32 || w <= 0 {
            return;
        }
        let x0 = x.max(0) as usize;
        let x1 = x.saturating_add(w).min(self.width as i32);
        if x1 <= x0 as i32 {
            return;
        }
        let row = y as usize * self.width;
        self.pixels[row + x0..row + x1 as usize].fill(color);
    }

    pub fn draw_vline(&mut self, x: i32, y: i32, h: i32, color: u16) {
        if x < 0 || x >= self.width as i32 || h <= 0 {
            return;
        }
        let y0 = y.max(0);
        let y1 = y.saturating_add(h).min(self.height as i32);
        for py in y0..y1 {
            self.pixels[py as usize * self.width + x as usize] = color;
        }
    }

    /// Outline as two hlines plus two vlines; the corners fall out of the
    /// shared spans, no special-casing.
    pub fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u16) {
        if w <= 0 || h <= 0 {
            return;
        }
        self.draw_hline(x, y, w, color);
        self.draw_hline(x, y.saturating_add(h - 1), w, color);
        self.draw_vline(x, y, h, color);
        self.draw_vline(x.saturating_add(w - 1), y, h, color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u16) {
        if w <= 0 || h <= 0 {
            return;
        }
        let y0 = y.max(0);
        let y1 = y.saturating_add(h).min(self.height as i32);
        for py in y0..y1 {
            self.draw_hline(x, py, w, color);
        }
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.draw_pixel(coord.x, coord.y, RawU16::from(color).into_inner());
        }
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(fb: &FrameBuffer) -> usize {
        fb.as_pixels().iter().filter(|&&p| p != 0).count()
    }

    #[test]
    fn out_of_range_pixel_is_ignored() {
        let mut fb = FrameBuffer::allocate(16, 8).unwrap();
        fb.draw_pixel(-1, 0, 0xffff);
        fb.draw_pixel(0, -1, 0xffff);
        fb.draw_pixel(16, 0, 0xffff);
        fb.draw_pixel(0, 8, 0xffff);
        fb.draw_pixel(i32::MAX, i32::MIN, 0xffff);
        assert_eq!(lit_pixels(&fb), 0);
    }

    #[test]
    fn partial_rect_writes_only_the_intersection() {
        let mut fb = FrameBuffer::allocate(16, 8).unwrap();
        fb.fill_rect(12, 4, 10, 10, 0x1);
        // Intersection is 4 wide (12..16) by 4 tall (4..8).
        assert_eq!(lit_pixels(&fb), 16);
        for y in 4..8 {
            for x in 12..16 {
                assert_eq!(fb.as_pixels()[y * 16 + x], 0x1);
            }
        }
    }

    #[test]
    fn clear_is_idempotent() {
        let mut fb = FrameBuffer::allocate(8, 8).unwrap();
        fb.fill_rect(0, 0, 8, 8, 0xbeef);
        fb.clear();
        assert_eq!(lit_pixels(&fb), 0);
        fb.clear();
        assert_eq!(lit_pixels(&fb), 0);
    }

    #[test]
    fn rect_outline_touches_each_corner_once() {
        let mut fb = FrameBuffer::allocate(16, 16).unwrap();
        fb.draw_rect(2, 3, 6, 4, 0x7);
        // Perimeter of a 6x4 outline: 2*6 + 2*4 - 4 corners shared.
        assert_eq!(lit_pixels(&fb), 16);
        assert_eq!(fb.as_pixels()[3 * 16 + 2], 0x7);
        assert_eq!(fb.as_pixels()[3 * 16 + 7], 0x7);
        assert_eq!(fb.as_pixels()[6 * 16 + 2], 0x7);
        assert_eq!(fb.as_pixels()[6 * 16 + 7], 0x7);
    }

    #[test]
    fn hline_and_vline_clip_at_the_edges() {
        let mut fb = FrameBuffer::allocate(8, 8).unwrap();
        fb.draw_hline(-3, 2, 20, 0x2);
        assert_eq!(lit_pixels(&fb), 8);
        fb.clear();
        fb.draw_vline(5, -4, 20, 0x2);
        assert_eq!(lit_pixels(&fb), 8);
        fb.clear();
        fb.draw_hline(0, 9, 8, 0x2);
        fb.draw_vline(9, 0, 8, 0x2);
        assert_eq!(lit_pixels(&fb), 0);
    }

    #[test]
    fn extreme_coordinates_never_wrap_into_range() {
        let mut fb = FrameBuffer::allocate(8, 8).unwrap();
        fb.draw_hline(i32::MAX - 1, 2, 4, 0x5);
        fb.draw_vline(2, i32::MAX - 1, 4, 0x5);
        fb.fill_rect(i32::MAX - 1, i32::MAX - 1, 4, 4, 0x5);
        fb.draw_rect(i32::MAX - 2, 1, i32::MAX, i32::MAX, 0x5);
        fb.fill_rect(i32::MIN, i32::MIN, i32::MAX, i32::MAX, 0x5);
        fb.draw_pixel(i32::MIN, i32::MAX, 0x5);
        assert_eq!(lit_pixels(&fb), 0);
    }

    #[test]
    fn negative_extent_draws_nothing() {
        let mut fb = FrameBuffer::allocate(8, 8).unwrap();
        fb.fill_rect(2, 2, -1, 4, 0x3);
        fb.draw_hline(2, 2, 0, 0x3);
        fb.draw_vline(2, 2, -5, 0x3);
        assert_eq!(lit_pixels(&fb), 0);
    }
}
