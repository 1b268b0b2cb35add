//! Turns raw model detections into de-duplicated, masked crops

mod extract;
mod iou;
mod selector;

pub use extract::{extract_region, ExtractError};
pub use iou::BoundingBox;
pub use selector::{select_instances, SelectionConfig, SelectionError};
