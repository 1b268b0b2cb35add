mod maskrcnn;
mod preprocess;
pub mod types;

pub use maskrcnn::{MaskRcnn, ModelOptions};
pub use types::{Detections, InstanceSegmenter};

use anyhow::Result;

/// Create the default instance segmentation model (Mask R-CNN)
pub fn create_default_model(
    model_path: &str,
    options: &ModelOptions,
) -> Result<Box<dyn InstanceSegmenter>> {
    let model = MaskRcnn::new(model_path, options)?;
    Ok(Box::new(model))
}
