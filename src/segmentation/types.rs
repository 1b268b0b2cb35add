use anyhow::Result;
use image::RgbImage;
use ndarray::Array3;

/// Raw per-instance model output for a single image
///
/// Index `i` of `scores`, `boxes` and the first axis of `masks` describes
/// the i-th detection, in the order the model emitted it.
#[derive(Debug, Clone, Default)]
pub struct Detections {
    /// Confidence scores in [0, 1]
    pub scores: Vec<f32>,
    /// Boxes as [left, top, right, bottom] in source image pixels
    pub boxes: Vec<[f32; 4]>,
    /// Per-pixel probabilities, shape [N, H, W] at source resolution
    pub masks: Array3<f32>,
}

impl Detections {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Trait for instance segmentation models
/// Allows swapping between different backends (Mask R-CNN, YOLO-seg, etc.)
pub trait InstanceSegmenter: Send {
    /// Run the model over one image
    ///
    /// # Arguments
    /// * `image` - Decoded RGB image
    ///
    /// # Returns
    /// * Scores, boxes and masks for every raw detection, with masks
    ///   matching the image dimensions
    fn detect(&mut self, image: &RgbImage) -> Result<Detections>;

    /// Short backend name for logging
    fn name(&self) -> &str;
}
