//=========================================================================
// Framebuffer
//=========================================================================
//
// CPU-side `Surface` implementation over a row-major RGBA8 buffer.
// `present` is a no-op; the pixel buffer itself is the product and the
// host copies it out whenever it wants a frame.
//
//=========================================================================

use image::RgbaImage;
use log::trace;

use super::{Color, Surface};

/// A software render target.
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Framebuffer {
    //--- Construction -----------------------------------------------------

    /// Creates a zeroed framebuffer.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Self {
        assert!(
            width > 0 && height > 0,
            "Framebuffer dimensions must be positive, got {}x{}",
            width,
            height
        );
        let pixels = vec![0; width as usize * height as usize * 4];
        Self { width, height, pixels }
    }

    //--- Pixel Access -----------------------------------------------------

    /// The raw RGBA8 buffer, rows top to bottom.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reads one pixel. `None` outside the target.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Color::rgba(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    //--- Internal Helpers -------------------------------------------------

    /// Source-over blend of one pixel. Coordinates must be in bounds.
    fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        if color.a == 255 {
            self.pixels[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, 255]);
            return;
        }
        if color.a == 0 {
            return;
        }
        let a = color.a as u16;
        let inv = 255 - a;
        let dst = &mut self.pixels[i..i + 4];
        dst[0] = ((color.r as u16 * a + dst[0] as u16 * inv) / 255) as u8;
        dst[1] = ((color.g as u16 * a + dst[1] as u16 * inv) / 255) as u8;
        dst[2] = ((color.b as u16 * a + dst[2] as u16 * inv) / 255) as u8;
        dst[3] = (a + dst[3] as u16 * inv / 255) as u8;
    }

    /// Clips a rectangle against the target. Returns half-open pixel
    /// bounds (x0, y0, x1, y1), or `None` when nothing remains.
    fn clip(&self, x: i32, y: i32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = (x.max(0) as u32).min(self.width);
        let y0 = (y.max(0) as u32).min(self.height);
        let x1 = (x as i64 + width as i64).clamp(0, self.width as i64) as u32;
        let y1 = (y as i64 + height as i64).clamp(0, self.height as i64) as u32;
        if x0 >= x1 || y0 >= y1 {
            None
        } else {
            Some((x0, y0, x1, y1))
        }
    }
}

//--- Trait Implementations -----------------------------------------------

impl Surface for Framebuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Color) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color);
            }
        }
    }

    fn blit(&mut self, image: &RgbaImage, x: i32, y: i32) {
        let (w, h) = image.dimensions();
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let sx = (px as i64 - x as i64) as u32;
                let sy = (py as i64 - y as i64) as u32;
                let p = image.get_pixel(sx, sy);
                self.blend_pixel(px, py, Color::rgba(p[0], p[1], p[2], p[3]));
            }
        }
    }

    fn present(&mut self) {
        trace!(target: "surface", "frame presented");
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
