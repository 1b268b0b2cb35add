use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ndarray::{Array3, ArrayD, Axis, IxDyn};

/// Preprocessor for converting RGB images to model input tensors
pub struct Preprocessor {
    target_size: Option<(u32, u32)>,
    batched: bool,
}

impl Preprocessor {
    /// `target_size` of `None` feeds the image at its native resolution,
    /// which is what torchvision detection exports expect.
    pub fn new(target_size: Option<(u32, u32)>, batched: bool) -> Self {
        Self {
            target_size,
            batched,
        }
    }

    /// Dimensions the model will see for an image of the given size
    pub fn model_size(&self, width: u32, height: u32) -> (u32, u32) {
        self.target_size.unwrap_or((width, height))
    }

    /// Preprocess an RGB image into a normalized CHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions if one is configured
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to CHW, adding a leading batch axis if batched
    ///
    /// Returns: tensor with shape [3, height, width] or [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<ArrayD<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = self.model_size(image.width(), image.height());
        let resized;
        let source = if image.dimensions() != (width, height) {
            resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
            &resized
        } else {
            image
        };

        let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));
        for (x, y, pixel) in source.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[2, y, x]] = pixel[2] as f32 / 255.0;
        }

        let tensor = if self.batched {
            tensor.insert_axis(Axis(0)).into_dyn()
        } else {
            tensor.into_dyn()
        };

        Ok(tensor)
    }

    /// Map a box from model input space back to source image space
    pub fn rescale_box(
        &self,
        bbox: [f32; 4],
        source_width: u32,
        source_height: u32,
    ) -> [f32; 4] {
        let (width, height) = self.model_size(source_width, source_height);
        if (width, height) == (source_width, source_height) {
            return bbox;
        }

        let sx = source_width as f32 / width as f32;
        let sy = source_height as f32 / height as f32;
        [bbox[0] * sx, bbox[1] * sy, bbox[2] * sx, bbox[3] * sy]
    }

    /// Resize every mask in an [N, h, w] stack to the source dimensions
    ///
    /// Returns the input unchanged when the sizes already match.
    pub fn resize_masks(
        masks: Array3<f32>,
        target_width: u32,
        target_height: u32,
    ) -> Result<Array3<f32>> {
        let _span = tracing::debug_span!("resize_masks").entered();

        let (count, mask_height, mask_width) = masks.dim();
        if mask_width == target_width as usize && mask_height == target_height as usize {
            return Ok(masks);
        }

        let mut data = Vec::with_capacity(count * (target_width * target_height) as usize);
        for mask in masks.outer_iter() {
            // Resize in f32 so probabilities near the 0.5 cut survive
            let buffer: Vec<f32> = mask.iter().copied().collect();
            let gray = image::ImageBuffer::<image::Luma<f32>, Vec<f32>>::from_raw(
                mask_width as u32,
                mask_height as u32,
                buffer,
            )
            .context("Mask buffer does not match its shape")?;
            let resized = imageops::resize(
                &gray,
                target_width,
                target_height,
                imageops::FilterType::Triangle,
            );
            data.extend(resized.into_raw());
        }

        let resized = Array3::from_shape_vec(
            (count, target_height as usize, target_width as usize),
            data,
        )?;
        Ok(resized)
    }
}

/// Collapse a [N, 1, H, W] or [N, H, W] mask output into [N, H, W]
pub fn squeeze_masks(masks: ArrayD<f32>) -> Result<Array3<f32>> {
    let shape = masks.shape().to_vec();
    let squeezed = match shape.as_slice() {
        [n, 1, h, w] => masks.into_shape_with_order(IxDyn(&[*n, *h, *w]))?,
        [_, _, _] => masks,
        _ => anyhow::bail!("Unexpected mask output shape: {:?}", shape),
    };
    Ok(squeezed.into_dimensionality()?)
}
