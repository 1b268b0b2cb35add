use crate::postprocess::{
    extract_region, select_instances, BoundingBox, ExtractError, SelectionConfig, SelectionError,
};
use crate::segmentation::InstanceSegmenter;
use image::RgbImage;
use ndarray::Axis;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Extraction(#[from] ExtractError),
}

/// One cropped, background-removed instance
#[derive(Debug, Clone)]
pub struct SegmentedRegion {
    /// Position of the source detection in the model's output
    pub index: usize,
    pub bbox: BoundingBox,
    pub image: RgbImage,
}

/// Decode → detect → select → extract, built once and shared by all requests
///
/// Model calls are serialized; everything else runs on the caller's thread.
pub struct SegmentationPipeline {
    model: Mutex<Box<dyn InstanceSegmenter>>,
    model_name: String,
    config: SelectionConfig,
}

impl SegmentationPipeline {
    pub fn new(model: Box<dyn InstanceSegmenter>, config: SelectionConfig) -> Self {
        Self {
            model_name: model.name().to_string(),
            model: Mutex::new(model),
            config,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Run the whole pipeline over encoded image bytes
    ///
    /// Degenerate crops are dropped, so the result may be shorter than the
    /// number of kept instances.
    pub fn run(&self, image_bytes: &[u8]) -> Result<Vec<SegmentedRegion>, PipelineError> {
        let started = Instant::now();

        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        tracing::debug!("Decoded {}x{} image", image.width(), image.height());

        let detections = {
            // The model keeps no state between calls, so a panic in an
            // earlier request leaves nothing to repair
            let mut model = self.model.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("Recovering model lock after a panic in an earlier request");
                PoisonError::into_inner(poisoned)
            });
            model.detect(&image).map_err(PipelineError::Inference)?
        };

        let kept = select_instances(&detections, &self.config)?;

        let _span = tracing::debug_span!("extract_regions").entered();
        let mut regions = Vec::with_capacity(kept.len());
        for instance in &kept {
            let mask = detections.masks.index_axis(Axis(0), instance.index);
            match extract_region(&image, &instance.bbox, mask)? {
                Some(region) => regions.push(SegmentedRegion {
                    index: instance.index,
                    bbox: instance.bbox,
                    image: region,
                }),
                None => tracing::debug!(
                    "Skipping detection {} with empty box {:?}",
                    instance.index,
                    instance.bbox
                ),
            }
        }

        if detections.is_empty() {
            tracing::debug!("Model returned no detections");
        }

        tracing::info!(
            "Segmented image: {} detections, {} kept, {} regions in {:.1}ms",
            detections.len(),
            kept.len(),
            regions.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(regions)
    }
}
