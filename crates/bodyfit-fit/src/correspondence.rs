//! Detector keypoint to body-model joint correspondence.

use nalgebra::Point2;

use bodyfit_core::{Keypoint, ViewObservation};

/// Keypoints that take part in the reprojection objective and the SMPL
/// joint each one is compared against. Face keypoints have no joint.
pub const KEYPOINT_JOINTS: [(Keypoint, usize); 12] = [
    (Keypoint::LeftShoulder, 16),
    (Keypoint::RightShoulder, 17),
    (Keypoint::LeftElbow, 18),
    (Keypoint::RightElbow, 19),
    (Keypoint::LeftWrist, 20),
    (Keypoint::RightWrist, 21),
    (Keypoint::LeftHip, 1),
    (Keypoint::RightHip, 2),
    (Keypoint::LeftKnee, 4),
    (Keypoint::RightKnee, 5),
    (Keypoint::LeftAnkle, 7),
    (Keypoint::RightAnkle, 8),
];

/// Smallest joint count a model needs to be fitted
pub fn required_joint_count() -> usize {
    KEYPOINT_JOINTS.iter().map(|&(_, j)| j).max().unwrap_or(0) + 1
}

/// Model joint indices in table order
pub fn joint_indices() -> impl Iterator<Item = usize> {
    KEYPOINT_JOINTS.iter().map(|&(_, j)| j)
}

/// Observed pixel targets in table order
pub fn targets(view: &ViewObservation) -> Vec<Point2<f64>> {
    KEYPOINT_JOINTS
        .iter()
        .map(|&(kp, _)| view.keypoint(kp))
        .collect()
}
