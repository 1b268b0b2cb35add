/// Coordinates are clamped to this magnitude so area arithmetic cannot overflow
const MAX_COORD: f32 = 268_435_456.0;

/// Axis-aligned box in integer pixel coordinates
///
/// Half-open on the right and bottom edges. Nothing enforces
/// `right >= left` or `bottom >= top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Truncate a real-valued model box `[left, top, right, bottom]` toward zero
    ///
    /// NaN becomes 0 and out-of-range values are clamped.
    pub fn from_model_box(bbox: [f32; 4]) -> Self {
        let coord = |v: f32| v.clamp(-MAX_COORD, MAX_COORD).trunc() as i64;
        Self::new(coord(bbox[0]), coord(bbox[1]), coord(bbox[2]), coord(bbox[3]))
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box, 0.0 when the union is empty
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right.min(other.right);
        let y2 = self.bottom.min(other.bottom);

        let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
        let union = self.area() + other.area() - intersection;

        if union > 0 {
            intersection as f32 / union as f32
        } else {
            0.0
        }
    }
}

/// IoU of `candidate` against each accepted box, in the accepted order
pub fn iou_against(candidate: &BoundingBox, accepted: &[BoundingBox]) -> Vec<f32> {
    accepted.iter().map(|saved| candidate.iou(saved)).collect()
}
