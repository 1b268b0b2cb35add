use super::iou::BoundingBox;
use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use thiserror::Error;

/// Mask probability above which a pixel belongs to the instance
pub const MASK_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    MaskShape {
        mask_width: usize,
        mask_height: usize,
        image_width: u32,
        image_height: u32,
    },
}

/// Crop `image` to `bbox` and zero every pixel outside the binarized mask
///
/// Box edges are clamped into the image. Returns `None` when the clamped
/// box has no area.
pub fn extract_region(
    image: &RgbImage,
    bbox: &BoundingBox,
    mask: ArrayView2<f32>,
) -> Result<Option<RgbImage>, ExtractError> {
    let (width, height) = image.dimensions();
    let (mask_height, mask_width) = mask.dim();
    if mask_width != width as usize || mask_height != height as usize {
        return Err(ExtractError::MaskShape {
            mask_width,
            mask_height,
            image_width: width,
            image_height: height,
        });
    }

    let left = bbox.left.clamp(0, width as i64) as u32;
    let right = bbox.right.clamp(0, width as i64) as u32;
    let top = bbox.top.clamp(0, height as i64) as u32;
    let bottom = bbox.bottom.clamp(0, height as i64) as u32;

    if right <= left || bottom <= top {
        return Ok(None);
    }

    let region = RgbImage::from_fn(right - left, bottom - top, |x, y| {
        let (sx, sy) = (left + x, top + y);
        if mask[[sy as usize, sx as usize]] > MASK_THRESHOLD {
            *image.get_pixel(sx, sy)
        } else {
            Rgb([0, 0, 0])
        }
    });

    Ok(Some(region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8 + 1, y as u8 + 1, 200]))
    }

    #[test]
    fn test_background_mask_gives_black_crop() {
        let image = gradient(20, 10);
        let mask = Array2::from_elem((10, 20), 0.5_f32);
        let bbox = BoundingBox::new(2, 3, 12, 8);

        let region = extract_region(&image, &bbox, mask.view()).unwrap().unwrap();
        assert_eq!(region.dimensions(), (10, 5));
        assert!(region.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_copies_foreground_only() {
        let image = gradient(8, 8);
        let mut mask = Array2::<f32>::zeros((8, 8));
        mask[[3, 4]] = 0.9;
        mask[[5, 6]] = 0.51;
        mask[[0, 0]] = 1.0; // outside the box

        let bbox = BoundingBox::new(2, 2, 7, 6);
        let region = extract_region(&image, &bbox, mask.view()).unwrap().unwrap();

        assert_eq!(region.dimensions(), (5, 4));
        assert_eq!(*region.get_pixel(2, 1), *image.get_pixel(4, 3));
        assert_eq!(*region.get_pixel(4, 3), *image.get_pixel(6, 5));
        let lit = region.pixels().filter(|p| **p != Rgb([0, 0, 0])).count();
        assert_eq!(lit, 2);
    }

    #[test]
    fn test_degenerate_box_is_none() {
        let image = gradient(8, 8);
        let mask = Array2::from_elem((8, 8), 1.0_f32);

        let flat = BoundingBox::new(3, 3, 3, 7);
        assert_eq!(extract_region(&image, &flat, mask.view()).unwrap(), None);

        let outside = BoundingBox::new(20, 20, 30, 30);
        assert_eq!(extract_region(&image, &outside, mask.view()).unwrap(), None);
    }

    #[test]
    fn test_single_pixel_box() {
        let image = gradient(8, 8);
        let mask = Array2::from_elem((8, 8), 1.0_f32);
        let bbox = BoundingBox::new(5, 6, 6, 7);

        let region = extract_region(&image, &bbox, mask.view()).unwrap().unwrap();
        assert_eq!(region.dimensions(), (1, 1));
        assert_eq!(*region.get_pixel(0, 0), *image.get_pixel(5, 6));
    }

    #[test]
    fn test_box_clamped_to_image() {
        let image = gradient(6, 4);
        let mask = Array2::from_elem((4, 6), 1.0_f32);
        let bbox = BoundingBox::new(-3, 1, 10, 9);

        let region = extract_region(&image, &bbox, mask.view()).unwrap().unwrap();
        assert_eq!(region.dimensions(), (6, 3));
        assert_eq!(*region.get_pixel(0, 0), *image.get_pixel(0, 1));
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let image = gradient(6, 4);
        let mask = Array2::<f32>::zeros((6, 4));
        let bbox = BoundingBox::new(0, 0, 2, 2);

        let err = extract_region(&image, &bbox, mask.view()).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MaskShape {
                mask_width: 4,
                mask_height: 6,
                image_width: 6,
                image_height: 4,
            }
        );
    }
}
