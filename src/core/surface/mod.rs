//=========================================================================
// Drawing Surface
//=========================================================================
//
// The engine draws through the `Surface` trait: a clear/draw/present
// cycle over an RGBA8 pixel target. `Framebuffer` is the bundled
// software implementation; hosts present its pixels however they see
// fit, and tests substitute recording doubles.
//
//=========================================================================

//=== External Dependencies ===============================================

use image::RgbaImage;

//=== Module Declarations =================================================

mod framebuffer;

//=== Public API ==========================================================

pub use framebuffer::Framebuffer;

//=== Color ===============================================================

/// An RGBA color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a color with an explicit alpha channel.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

//=== Surface Trait =======================================================

/// A 2D render target with immediate-mode drawing operations.
///
/// One frame is: `clear`, any number of draws, `present`. Draw calls
/// blend source-over by the color's alpha and clip silently at the
/// target's edges, so callers never pre-clamp coordinates.
pub trait Surface {
    /// Target dimensions in pixels (width, height).
    fn size(&self) -> (u32, u32);

    /// Fills the whole target, replacing previous contents.
    fn clear(&mut self, color: Color);

    /// Fills an axis-aligned rectangle.
    fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Color);

    /// Copies an image onto the target with its top-left at (x, y).
    fn blit(&mut self, image: &RgbaImage, x: i32, y: i32);

    /// Marks the frame complete so the host can show it.
    fn present(&mut self);
}
