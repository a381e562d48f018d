use crate::Error;

/// A row-major 2D image stored in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image<T> {
    width: u32,
    height: u32,
    pixels: Vec<T>,
}

/// Scene color, `Rgba8Unorm` texels.
pub type ColorImage = Image<[u8; 4]>;
/// Edge flags per pixel.
pub type EdgeMaskImage = Image<u8>;
/// Packed horizontal and vertical runs per pixel.
pub type EdgeLengthImage = Image<[u8; 2]>;
/// Stencil values per pixel.
pub type StencilBuffer = Image<u8>;

impl<T: Copy + Default> Image<T> {
    /// An image with every pixel set to `T::default()`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, T::default())
    }

    /// An image with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// Build an image by calling `f(x, y)` for every pixel, in row-major order.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap row-major pixel data.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<T>) -> Result<Self, Error> {
        if pixels.len() != width as usize * height as usize {
            return Err(Error::InvalidResolution { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// The pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the image.
    pub fn get(&self, x: u32, y: u32) -> T {
        self.pixels[self.index(x, y)]
    }

    /// The pixel at a signed position, or `None` outside the image.
    pub fn get_signed(&self, x: i64, y: i64) -> Option<T> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.get(x as u32, y as u32))
    }

    /// Overwrite the pixel at `(x, y)`. Panics outside the image, like [`get`](Self::get).
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let index = self.index(x, y);
        self.pixels[index] = value;
    }

    /// Reset every pixel to `T::default()`.
    pub fn clear(&mut self) {
        self.pixels.fill(T::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_layout() {
        let image = Image::from_fn(3, 2, |x, y| (y * 3 + x) as u8);
        assert_eq!(image.pixels(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(image.get(2, 1), 5);
        assert_eq!(image.get_signed(-1, 0), None);
        assert_eq!(image.get_signed(0, 2), None);
    }

    #[test]
    fn pixel_count_must_match() {
        assert!(Image::from_pixels(2, 2, vec![0u8; 3]).is_err());
        assert!(Image::from_pixels(2, 2, vec![0u8; 4]).is_ok());
    }
}
