//! Frame to input tensor conversion

use crate::error::VisionError;
use image::imageops::{self, FilterType};
use robolink_core::{Frame, InputLayout, PixelRange};

/// Largest accepted square input side
const MAX_INPUT_SIDE: u32 = 2048;

/// Crop the largest centered square out of a frame.
pub fn center_square(frame: &Frame) -> Frame {
    let (width, height) = frame.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    imageops::crop_imm(frame, x, y, side, side).to_image()
}

/// Input shape for a square model input of `side` pixels
pub fn input_shape(side: u32, layout: InputLayout) -> [usize; 4] {
    let side = side as usize;
    match layout {
        InputLayout::Nhwc => [1, side, side, 3],
        InputLayout::Nchw => [1, 3, side, side],
    }
}

fn normalize(value: u8, range: PixelRange) -> f32 {
    match range {
        PixelRange::SignedUnit => value as f32 / 127.5 - 1.0,
        PixelRange::Unit => value as f32 / 255.0,
    }
}

/// Center-crop, resize to `side`x`side` and flatten into the given layout.
pub fn prepare_input(
    frame: &Frame,
    side: u32,
    layout: InputLayout,
    range: PixelRange,
) -> Result<Vec<f32>, VisionError> {
    if side == 0 || side > MAX_INPUT_SIDE {
        return Err(VisionError::Processing(format!(
            "Input side must be between 1 and {}, got {}",
            MAX_INPUT_SIDE, side
        )));
    }
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::Processing("Invalid image dimensions".to_string()));
    }

    let square = center_square(frame);
    let resized = if square.dimensions() == (side, side) {
        square
    } else {
        imageops::resize(&square, side, side, FilterType::Triangle)
    };

    let plane = (side as usize) * (side as usize);
    let mut tensor = vec![0.0f32; plane * 3];

    match layout {
        InputLayout::Nhwc => {
            for (i, pixel) in resized.pixels().enumerate() {
                for c in 0..3 {
                    tensor[i * 3 + c] = normalize(pixel.0[c], range);
                }
            }
        }
        InputLayout::Nchw => {
            for (i, pixel) in resized.pixels().enumerate() {
                for c in 0..3 {
                    tensor[c * plane + i] = normalize(pixel.0[c], range);
                }
            }
        }
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_center_square_landscape() {
        let mut frame = RgbImage::new(6, 4);
        frame.put_pixel(1, 0, Rgb([255, 0, 0]));
        let square = center_square(&frame);
        assert_eq!(square.dimensions(), (4, 4));
        // column 1 of the source becomes column 0 after cropping one column per side
        assert_eq!(square.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_input_shape() {
        assert_eq!(input_shape(224, InputLayout::Nhwc), [1, 224, 224, 3]);
        assert_eq!(input_shape(224, InputLayout::Nchw), [1, 3, 224, 224]);
    }

    #[test]
    fn test_prepare_input_signed_unit_nhwc() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let tensor = prepare_input(&frame, 2, InputLayout::Nhwc, PixelRange::SignedUnit).unwrap();
        assert_eq!(tensor.len(), 12);
        assert!((tensor[0] - 1.0).abs() < 1e-6);
        assert!((tensor[1] + 1.0).abs() < 1e-6);
        assert!((tensor[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_input_unit_nchw_planes() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([0, 255, 51]));
        let tensor = prepare_input(&frame, 2, InputLayout::Nchw, PixelRange::Unit).unwrap();
        assert_eq!(tensor.len(), 12);
        assert!(tensor[0..4].iter().all(|v| v.abs() < 1e-6));
        assert!(tensor[4..8].iter().all(|v| (v - 1.0).abs() < 1e-6));
        assert!(tensor[8..12].iter().all(|v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_prepare_input_resizes() {
        let frame = RgbImage::from_pixel(320, 240, Rgb([10, 20, 30]));
        let tensor = prepare_input(&frame, 224, InputLayout::Nhwc, PixelRange::Unit).unwrap();
        assert_eq!(tensor.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_prepare_input_rejects_bad_sizes() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        assert!(prepare_input(&frame, 0, InputLayout::Nhwc, PixelRange::Unit).is_err());
        assert!(prepare_input(&frame, 4096, InputLayout::Nhwc, PixelRange::Unit).is_err());

        let empty = RgbImage::new(0, 0);
        assert!(prepare_input(&empty, 4, InputLayout::Nhwc, PixelRange::Unit).is_err());
    }
}
