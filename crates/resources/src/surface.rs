use crate::error::ResourceError;

/// A single RGBA8 pixel.
pub type Rgba = [u8; 4];

/// A mutable raster surface: RGBA8 pixels in row-major order.
///
/// Equality is pixel-for-pixel, which is what the codec round-trip law and
/// fork isolation are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// Create a surface with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap an existing RGBA8 buffer. Fails if the length does not match.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ResourceError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if expected != Some(pixels.len()) {
            return Err(ResourceError::SizeMismatch {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major.
    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw RGBA8 bytes, row-major.
    pub fn as_rgba_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.pixels
    }

    /// Read a pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let i = self.offset(x, y)?;
        let mut out = [0; 4];
        out.copy_from_slice(&self.pixels[i..i + 4]);
        Some(out)
    }

    /// Write a pixel. Out-of-bounds writes are ignored and return false.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) -> bool {
        match self.offset(x, y) {
            Some(i) => {
                self.pixels[i..i + 4].copy_from_slice(&color);
                true
            }
            None => false,
        }
    }

    /// Fill a rectangle, clipped to the surface bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y.min(y_end)..y_end {
            for px in x.min(x_end)..x_end {
                self.set_pixel(px, py, color);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_transparent() {
        let s = Surface::new(3, 2);
        assert_eq!(s.as_rgba().len(), 3 * 2 * 4);
        assert!(s.as_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        let err = Surface::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::SizeMismatch {
                width: 2,
                height: 2,
                actual: 15
            }
        ));
    }

    #[test]
    fn set_and_read_pixel() {
        let mut s = Surface::new(4, 4);
        assert!(s.set_pixel(1, 2, [10, 20, 30, 255]));
        assert_eq!(s.pixel(1, 2), Some([10, 20, 30, 255]));
        assert_eq!(s.pixel(2, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut s = Surface::new(2, 2);
        assert!(!s.set_pixel(2, 0, [1, 1, 1, 1]));
        assert_eq!(s.pixel(0, 2), None);
        assert_eq!(s, Surface::new(2, 2));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut s = Surface::new(4, 4);
        s.fill_rect(2, 2, 10, 10, [255, 0, 0, 255]);
        assert_eq!(s.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(s.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(s.pixel(1, 1), Some([0, 0, 0, 0]));

        // Fully outside: nothing changes.
        let before = s.clone();
        s.fill_rect(8, 8, 2, 2, [0, 255, 0, 255]);
        assert_eq!(s, before);
    }
}
