use super::iou::{iou_against, BoundingBox};
use crate::segmentation::Detections;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Model output length mismatch: {scores} scores, {boxes} boxes, {masks} masks")]
    LengthMismatch {
        scores: usize,
        boxes: usize,
        masks: usize,
    },
}

/// Thresholds for [`select_instances`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionConfig {
    /// Scores must be strictly greater than this to be considered
    pub confidence_threshold: f32,
    /// A candidate is dropped once its IoU with any kept box reaches this
    pub iou_threshold: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.5,
        }
    }
}

/// A detection that survived the confidence and overlap filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeptInstance {
    /// Position in the model's output
    pub index: usize,
    pub bbox: BoundingBox,
}

/// Greedy overlap suppression over detections in model-emitted order
///
/// Candidates are walked in the order the model returned them, not sorted
/// by score, so an earlier detection wins over a later overlapping one even
/// if the later one is more confident.
pub fn select_instances(
    detections: &Detections,
    config: &SelectionConfig,
) -> Result<Vec<KeptInstance>, SelectionError> {
    let _span = tracing::debug_span!("select_instances").entered();

    let scores = detections.scores.len();
    let boxes = detections.boxes.len();
    let masks = detections.masks.len_of(ndarray::Axis(0));
    if scores != boxes || scores != masks {
        return Err(SelectionError::LengthMismatch {
            scores,
            boxes,
            masks,
        });
    }

    let mut kept: Vec<KeptInstance> = Vec::new();
    let mut saved_boxes: Vec<BoundingBox> = Vec::new();

    let candidates = detections
        .scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > config.confidence_threshold)
        .map(|(index, _)| index);

    for index in candidates {
        let bbox = BoundingBox::from_model_box(detections.boxes[index]);
        let ious = iou_against(&bbox, &saved_boxes);

        if ious.iter().all(|&iou| iou < config.iou_threshold) {
            saved_boxes.push(bbox);
            kept.push(KeptInstance { index, bbox });
        } else {
            tracing::debug!("Suppressed detection {} (max IoU {:.3})", index, max_iou(&ious));
        }
    }

    Ok(kept)
}

fn max_iou(ious: &[f32]) -> f32 {
    ious.iter().copied().fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn detections(scores: &[f32], boxes: &[[f32; 4]]) -> Detections {
        Detections {
            scores: scores.to_vec(),
            boxes: boxes.to_vec(),
            masks: Array3::zeros((boxes.len(), 1, 1)),
        }
    }

    fn kept_indices(kept: &[KeptInstance]) -> Vec<usize> {
        kept.iter().map(|k| k.index).collect()
    }

    #[test]
    fn test_overlap_and_confidence_scenario() {
        let input = detections(
            &[0.9, 0.4, 0.95],
            &[
                [0.0, 0.0, 10.0, 10.0],
                [100.0, 100.0, 110.0, 110.0],
                [0.0, 0.0, 10.0, 10.0],
            ],
        );

        let kept = select_instances(&input, &SelectionConfig::default()).unwrap();
        assert_eq!(kept_indices(&kept), vec![0]);
        assert_eq!(kept[0].bbox, BoundingBox::new(0, 0, 10, 10));
    }

    #[test]
    fn test_confidence_threshold_is_strict() {
        let input = detections(
            &[0.5, 0.500_001],
            &[[0.0, 0.0, 10.0, 10.0], [50.0, 50.0, 60.0, 60.0]],
        );

        let kept = select_instances(&input, &SelectionConfig::default()).unwrap();
        assert_eq!(kept_indices(&kept), vec![1]);
    }

    #[test]
    fn test_iou_threshold_is_strict() {
        // IoU of these two boxes is exactly 0.5
        let input = detections(
            &[0.9, 0.9],
            &[[0.0, 0.0, 10.0, 20.0], [0.0, 0.0, 10.0, 10.0]],
        );

        let kept = select_instances(&input, &SelectionConfig::default()).unwrap();
        assert_eq!(kept_indices(&kept), vec![0]);

        let loose = SelectionConfig {
            iou_threshold: 0.51,
            ..SelectionConfig::default()
        };
        let kept = select_instances(&input, &loose).unwrap();
        assert_eq!(kept_indices(&kept), vec![0, 1]);
    }

    #[test]
    fn test_emission_order_beats_confidence() {
        let input = detections(
            &[0.6, 0.99],
            &[[0.0, 0.0, 10.0, 10.0], [1.0, 1.0, 10.0, 10.0]],
        );

        let kept = select_instances(&input, &SelectionConfig::default()).unwrap();
        assert_eq!(kept_indices(&kept), vec![0]);
    }

    #[test]
    fn test_rejected_candidate_does_not_suppress() {
        // 1 overlaps 0 and is dropped; 2 overlaps only 1, so it is kept
        let input = detections(
            &[0.9, 0.9, 0.9],
            &[
                [0.0, 0.0, 10.0, 10.0],
                [2.0, 0.0, 12.0, 10.0],
                [8.0, 0.0, 18.0, 10.0],
            ],
        );

        let kept = select_instances(&input, &SelectionConfig::default()).unwrap();
        assert_eq!(kept_indices(&kept), vec![0, 2]);
    }

    #[test]
    fn test_kept_boxes_pairwise_below_threshold() {
        let mut scores = Vec::new();
        let mut boxes = Vec::new();
        for i in 0..40 {
            let offset = (i * 7 % 23) as f32;
            scores.push(0.55 + (i % 9) as f32 * 0.05);
            boxes.push([offset, offset / 2.0, offset + 12.0, offset / 2.0 + 15.0]);
        }
        let input = detections(&scores, &boxes);
        let config = SelectionConfig::default();

        let kept = select_instances(&input, &config).unwrap();
        assert!(!kept.is_empty());
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                assert!(a.bbox.iou(&b.bbox) < config.iou_threshold);
                assert!(a.index < b.index);
            }
        }

        // Same input, same answer
        assert_eq!(select_instances(&input, &config).unwrap(), kept);
    }

    #[test]
    fn test_empty_input() {
        let kept = select_instances(&Detections::default(), &SelectionConfig::default()).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let mut input = detections(&[0.9, 0.8], &[[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 1.0]]);
        input.boxes.pop();

        let err = select_instances(&input, &SelectionConfig::default()).unwrap_err();
        assert_eq!(
            err,
            SelectionError::LengthMismatch {
                scores: 2,
                boxes: 1,
                masks: 2
            }
        );
    }
}
