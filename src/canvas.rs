//! 1-bit canvas and BMP serialization
//!
//! The canvas is a packed monochrome buffer in device convention: a set bit
//! is paper (white), a cleared bit is ink (black). Rows are packed MSB-first,
//! which is also the pixel order of a 1-bpp BMP, so serialization only has to
//! pad rows and flip them bottom-up.
//!
//! [`BinaryColor::On`] is ink and [`BinaryColor::Off`] is paper when drawing
//! through embedded-graphics.

use core::convert::Infallible;
use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};

/// File header (14) + BITMAPINFOHEADER (40) + two palette entries (8)
pub const BMP_HEADER_LEN: usize = 62;

/// Logical pixel colors of the 1-bit model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Background fill (bit = 1)
    White,
    /// Foreground ink (bit = 0)
    Black,
}

impl From<BinaryColor> for Color {
    fn from(color: BinaryColor) -> Self {
        match color {
            BinaryColor::On => Color::Black,
            BinaryColor::Off => Color::White,
        }
    }
}

/// Fixed-size monochrome pixel buffer for one render call
pub struct Canvas {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Canvas {
    /// Create a canvas filled with paper.
    pub fn new(width: u32, height: u32) -> Self {
        // Buffer size: each row has (width+7)/8 bytes, total height rows
        let bytes_per_row = width.div_ceil(8);
        let buffer_size = (bytes_per_row * height) as usize;
        Self {
            width,
            height,
            buffer: vec![0xFF; buffer_size], // White by default
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed rows, top row first.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Set a pixel; coordinates outside the canvas are clipped.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }

        let bytes_per_row = self.width.div_ceil(8); // Round up for partial bytes
        let byte_index = (y * bytes_per_row + x / 8) as usize;
        let bit_mask = 0x80 >> (x % 8);

        match color {
            Color::White => self.buffer[byte_index] |= bit_mask,
            Color::Black => self.buffer[byte_index] &= !bit_mask,
        }
    }

    /// Read a pixel; `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bytes_per_row = self.width.div_ceil(8);
        let byte = self.buffer[(y * bytes_per_row + x / 8) as usize];
        if byte & (0x80 >> (x % 8)) != 0 {
            Some(Color::White)
        } else {
            Some(Color::Black)
        }
    }

    /// Number of ink pixels.
    pub fn ink_count(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixel(x, y) == Some(Color::Black) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Serialize as an uncompressed 1-bpp BMP with a black/white palette.
    ///
    /// Palette index 0 is black and index 1 is white, so canvas bits map
    /// straight onto palette indices.
    pub fn to_bmp(&self) -> Vec<u8> {
        let src_stride = self.width.div_ceil(8) as usize;
        let dst_stride = bmp_row_stride(self.width);
        let image_size = dst_stride * self.height as usize;
        let file_size = BMP_HEADER_LEN + image_size;

        let mut out = Vec::with_capacity(file_size);

        // BITMAPFILEHEADER
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(file_size as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved
        out.extend_from_slice(&(BMP_HEADER_LEN as u32).to_le_bytes());

        // BITMAPINFOHEADER
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(self.width as i32).to_le_bytes());
        out.extend_from_slice(&(self.height as i32).to_le_bytes()); // positive: bottom-up
        out.extend_from_slice(&1u16.to_le_bytes()); // planes
        out.extend_from_slice(&1u16.to_le_bytes()); // bits per pixel
        out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
        out.extend_from_slice(&(image_size as u32).to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes()); // x pixels per meter
        out.extend_from_slice(&0i32.to_le_bytes()); // y pixels per meter
        out.extend_from_slice(&2u32.to_le_bytes()); // colors used
        out.extend_from_slice(&2u32.to_le_bytes()); // important colors

        // Palette (B, G, R, reserved)
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        out.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x00]);

        let last_byte_mask = match self.width % 8 {
            0 => 0xFF,
            bits => 0xFFu8 << (8 - bits),
        };
        for row in self.buffer.chunks_exact(src_stride.max(1)).rev() {
            let start = out.len();
            out.extend_from_slice(row);
            // Unused trailing bits are written as zero
            if let Some(last) = out.last_mut() {
                *last &= last_byte_mask;
            }
            out.resize(start + dst_stride, 0);
        }

        out
    }
}

/// Bytes per BMP row for a 1-bpp image, padded to a 4-byte boundary.
pub fn bmp_row_stride(width: u32) -> usize {
    (width.div_ceil(32) * 4) as usize
}

/// Total size of the BMP produced by [`Canvas::to_bmp`].
pub fn bmp_len(width: u32, height: u32) -> usize {
    BMP_HEADER_LEN + bmp_row_stride(width) * height as usize
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_new_canvas_is_white() {
        let canvas = Canvas::new(10, 3);
        assert_eq!(canvas.buffer().len(), 2 * 3);
        assert_eq!(canvas.ink_count(), 0);
        assert_eq!(canvas.pixel(9, 2), Some(Color::White));
    }

    #[test]
    fn test_set_pixel_bit_layout() {
        let mut canvas = Canvas::new(16, 2);
        canvas.set_pixel(0, 0, Color::Black);
        canvas.set_pixel(9, 1, Color::Black);
        assert_eq!(canvas.buffer(), &[0x7F, 0xFF, 0xFF, 0xBF]);

        canvas.set_pixel(0, 0, Color::White);
        assert_eq!(canvas.buffer()[0], 0xFF);
    }

    #[test]
    fn test_out_of_bounds_is_clipped() {
        let mut canvas = Canvas::new(8, 8);
        canvas.set_pixel(8, 0, Color::Black);
        canvas.set_pixel(0, 8, Color::Black);
        assert_eq!(canvas.ink_count(), 0);
        assert_eq!(canvas.pixel(8, 0), None);

        Rectangle::new(Point::new(-4, -4), Size::new(8, 8))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut canvas)
            .unwrap();
        assert_eq!(canvas.ink_count(), 16);
    }

    #[test]
    fn test_bmp_header_and_size() {
        let canvas = Canvas::new(800, 480);
        let bmp = canvas.to_bmp();
        assert_eq!(bmp.len(), bmp_len(800, 480));
        assert_eq!(bmp.len(), 62 + 100 * 480);
        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(u32::from_le_bytes(bmp[2..6].try_into().unwrap()) as usize, bmp.len());
        assert_eq!(u32::from_le_bytes(bmp[10..14].try_into().unwrap()), 62);
        assert_eq!(i32::from_le_bytes(bmp[18..22].try_into().unwrap()), 800);
        assert_eq!(i32::from_le_bytes(bmp[22..26].try_into().unwrap()), 480);
        assert_eq!(u16::from_le_bytes(bmp[28..30].try_into().unwrap()), 1);
    }

    #[test]
    fn test_bmp_rows_are_bottom_up_and_padded() {
        let mut canvas = Canvas::new(10, 2);
        canvas.set_pixel(0, 0, Color::Black);
        let bmp = canvas.to_bmp();

        assert_eq!(bmp_row_stride(10), 4);
        assert_eq!(bmp.len(), 62 + 8);
        // Bottom row (y = 1) comes first, all white; padding bits zeroed
        assert_eq!(&bmp[62..66], &[0xFF, 0xC0, 0x00, 0x00]);
        // Top row carries the ink pixel
        assert_eq!(&bmp[66..70], &[0x7F, 0xC0, 0x00, 0x00]);
    }

    #[test]
    fn test_bmp_decodes() {
        use tinybmp::{Bpp, RawBmp};

        let mut canvas = Canvas::new(33, 17);
        canvas.set_pixel(5, 5, Color::Black);
        let bytes = canvas.to_bmp();
        let bmp = RawBmp::from_slice(&bytes).unwrap();
        assert_eq!(bmp.header().image_size, Size::new(33, 17));
        assert_eq!(bmp.header().bpp, Bpp::Bits1);
    }
}
