use super::preprocess::{squeeze_masks, Preprocessor};
use super::types::{Detections, InstanceSegmenter};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Ix2;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

/// Output positions of a torchvision Mask R-CNN ONNX export
const BOXES_OUTPUT: usize = 0;
const SCORES_OUTPUT: usize = 2;
const MASKS_OUTPUT: usize = 3;

/// Session options for [`MaskRcnn::new`]
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Fixed model input size, or `None` for native resolution
    pub input_size: Option<(u32, u32)>,
    /// Model expects a leading batch axis
    pub batched: bool,
    pub intra_threads: usize,
    pub cuda: bool,
}

/// Mask R-CNN instance segmentation model
///
/// Expects the torchvision export layout: a float image input in [0, 1]
/// and `boxes`, `labels`, `scores`, `masks` outputs, detections already
/// ordered by the model's own ranking.
pub struct MaskRcnn {
    session: Session,
    preprocessor: Preprocessor,
    input_name: String,
}

impl MaskRcnn {
    /// Create a new Mask R-CNN model from an ONNX file
    pub fn new<P: AsRef<Path>>(model_path: P, options: &ModelOptions) -> Result<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            anyhow::bail!("Segmentation model not found: {}", path.display());
        }

        tracing::info!("Loading Mask R-CNN model from {}", path.display());

        let mut providers = Vec::new();
        if options.cuda {
            providers.push(CUDAExecutionProvider::default().build());
        }
        providers.push(CPUExecutionProvider::default().build());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers(providers)
            .context("Failed to register execution providers")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(options.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Model declares no inputs")?;

        if session.outputs.len() <= MASKS_OUTPUT {
            anyhow::bail!(
                "Model has {} outputs, expected boxes, labels, scores and masks",
                session.outputs.len()
            );
        }

        tracing::debug!(
            "Model input: {}, outputs: {:?}",
            input_name,
            session.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>()
        );
        tracing::info!("Mask R-CNN model loaded successfully");

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(options.input_size, options.batched),
            input_name,
        })
    }
}

impl InstanceSegmenter for MaskRcnn {
    fn detect(&mut self, image: &RgbImage) -> Result<Detections> {
        let _span = tracing::debug_span!("maskrcnn_detect").entered();

        let (width, height) = image.dimensions();
        let input_tensor = self.preprocessor.preprocess(image)?;
        let input_value =
            Value::from_array(input_tensor).context("Failed to create input tensor")?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let boxes = outputs[BOXES_OUTPUT]
            .try_extract_array::<f32>()
            .context("Failed to extract boxes")?
            .to_owned()
            .into_dimensionality::<Ix2>()
            .context("Boxes output is not two-dimensional")?;
        let scores: Vec<f32> = outputs[SCORES_OUTPUT]
            .try_extract_array::<f32>()
            .context("Failed to extract scores")?
            .iter()
            .copied()
            .collect();
        let masks = outputs[MASKS_OUTPUT]
            .try_extract_array::<f32>()
            .context("Failed to extract masks")?
            .to_owned();
        drop(outputs);

        if boxes.ncols() != 4 {
            anyhow::bail!("Boxes output has {} columns, expected 4", boxes.ncols());
        }

        let boxes = boxes
            .outer_iter()
            .map(|row| {
                self.preprocessor
                    .rescale_box([row[0], row[1], row[2], row[3]], width, height)
            })
            .collect();
        let masks = Preprocessor::resize_masks(squeeze_masks(masks)?, width, height)?;

        tracing::debug!("Model returned {} raw detections", scores.len());

        Ok(Detections {
            scores,
            boxes,
            masks,
        })
    }

    fn name(&self) -> &str {
        "maskrcnn"
    }
}
