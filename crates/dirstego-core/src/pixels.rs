//! Image bit I/O (C3): a linear pixel cursor that yields/consumes one LSB
//! per RGB channel sample, in row-major, channel-major order.

use image::{Rgb, RgbImage};

use crate::error::{Result, StegoError};

/// Walks an image's channel samples in canonical order: for each row
/// (`h = 0..H`), for each column (`w = 0..W`), the channels `R, G, B`.
pub struct PixelCursor<'a> {
    image: &'a mut RgbImage,
    w: u32,
    h: u32,
    /// Channel samples consumed so far; `i % 3` selects R/G/B.
    i: u64,
}

impl<'a> PixelCursor<'a> {
    pub fn new(image: &'a mut RgbImage) -> Self {
        Self { image, w: 0, h: 0, i: 0 }
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    /// Advances the cursor by `n` samples without touching pixel data.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.advance_one()?;
        }
        Ok(())
    }

    /// Reads the parity of the next `n` samples as bits.
    pub fn read_bits(&mut self, n: u64) -> Result<Vec<bool>> {
        let mut bits = Vec::with_capacity(n as usize);
        for _ in 0..n {
            self.ensure_in_bounds("invalid image")?;
            let channel = (self.i % 3) as usize;
            let sample = self.image.get_pixel(self.w, self.h).0[channel];
            bits.push(sample % 2 == 1);
            self.advance_one()?;
        }
        Ok(bits)
    }

    /// Writes `bits`, adjusting a channel sample by ±1 only when its
    /// current parity differs from the target bit.
    ///
    /// Matches the reference's boundary-safe rule: unconditionally `-1`
    /// when the target is 0, `+1` when the target is 1, applied only on a
    /// parity mismatch, so a sample already at the right parity (including
    /// 0 and 255) is left untouched.
    pub fn write_bits(&mut self, bits: &[bool]) -> Result<()> {
        for &bit in bits {
            self.ensure_in_bounds("too small")?;
            let channel = (self.i % 3) as usize;
            let pixel = self.image.get_pixel_mut(self.w, self.h);
            let sample = pixel.0[channel];
            let target_parity = bit as u8;
            if sample % 2 != target_parity {
                pixel.0[channel] = if bit { sample + 1 } else { sample - 1 };
            }
            self.advance_one()?;
        }
        Ok(())
    }

    fn ensure_in_bounds(&self, context: &str) -> Result<()> {
        if self.h >= self.height() {
            return Err(StegoError::ImageTooSmall(context.to_string()));
        }
        Ok(())
    }

    fn advance_one(&mut self) -> Result<()> {
        self.i += 1;
        if self.i % 3 == 0 {
            self.w += 1;
            if self.w >= self.width() {
                self.w = 0;
                self.h += 1;
            }
        }
        Ok(())
    }
}

/// Total channel-sample capacity of an image of the given dimensions.
pub fn sample_capacity(width: u32, height: u32) -> u64 {
    3 * width as u64 * height as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(w: u32, h: u32, px: Rgb<u8>) -> RgbImage {
        RgbImage::from_pixel(w, h, px)
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut image = uniform_image(4, 4, Rgb([128, 128, 128]));
        let bits = vec![true, false, true, true, false, false, true, false];
        {
            let mut cursor = PixelCursor::new(&mut image);
            cursor.write_bits(&bits).unwrap();
        }
        let mut cursor = PixelCursor::new(&mut image);
        let read = cursor.read_bits(bits.len() as u64).unwrap();
        assert_eq!(read, bits);
    }

    #[test]
    fn boundary_values_are_not_wrapped() {
        // value 0: target 0 leaves it untouched, target 1 adds 1.
        let mut image = uniform_image(1, 1, Rgb([0, 0, 255]));
        {
            let mut cursor = PixelCursor::new(&mut image);
            cursor.write_bits(&[false, true, true]).unwrap();
        }
        let px = image.get_pixel(0, 0);
        assert_eq!(px.0[0], 0); // 0 target 0: untouched
        assert_eq!(px.0[1], 1); // 0 target 1: +1
        assert_eq!(px.0[2], 255); // 255 target 1: untouched (already odd)
    }

    #[test]
    fn boundary_255_decrements_for_target_zero() {
        let mut image = uniform_image(1, 1, Rgb([255, 0, 0]));
        {
            let mut cursor = PixelCursor::new(&mut image);
            cursor.write_bits(&[false]).unwrap();
        }
        assert_eq!(image.get_pixel(0, 0).0[0], 254);
    }

    #[test]
    fn exhausted_image_on_write_is_fatal() {
        let mut image = uniform_image(1, 1, Rgb([0, 0, 0]));
        let mut cursor = PixelCursor::new(&mut image);
        let bits = vec![true; 4]; // only 3 samples available
        assert!(cursor.write_bits(&bits).is_err());
    }

    #[test]
    fn exhausted_image_on_read_is_fatal() {
        let mut image = uniform_image(1, 1, Rgb([0, 0, 0]));
        let mut cursor = PixelCursor::new(&mut image);
        assert!(cursor.read_bits(4).is_err());
    }

    #[test]
    fn skip_advances_without_mutation() {
        let mut image = uniform_image(2, 1, Rgb([10, 10, 10]));
        let before = image.clone();
        {
            let mut cursor = PixelCursor::new(&mut image);
            cursor.skip(3).unwrap();
        }
        assert_eq!(image, before);
    }
}
