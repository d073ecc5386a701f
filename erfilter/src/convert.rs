//! Conversions between `image` crate buffers and [`Buffer2<u8>`].

use image::{DynamicImage, GrayImage};

use common::Buffer2;

use crate::error::InputError;

/// Copy an 8-bit luma image into a buffer. Other pixel formats are rejected;
/// convert with `DynamicImage::to_luma8` first if that is intended.
pub fn luma_from_dynamic(image: &DynamicImage) -> Result<Buffer2<u8>, InputError> {
    match image {
        DynamicImage::ImageLuma8(gray) => Ok(from_gray_image(gray)),
        other => Err(InputError::UnsupportedPixelFormat(format!(
            "{:?}",
            other.color()
        ))),
    }
}

pub fn from_gray_image(image: &GrayImage) -> Buffer2<u8> {
    Buffer2::new(
        image.width() as usize,
        image.height() as usize,
        image.as_raw().clone(),
    )
}

pub fn to_gray_image(buffer: &Buffer2<u8>) -> GrayImage {
    GrayImage::from_fn(buffer.width() as u32, buffer.height() as u32, |x, y| {
        image::Luma([buffer[(x as usize, y as usize)]])
    })
}

/// `255 - v` for every pixel, turning bright regions into dark ones.
pub fn inverted(buffer: &Buffer2<u8>) -> Buffer2<u8> {
    buffer.map(|&v| 255 - v)
}
