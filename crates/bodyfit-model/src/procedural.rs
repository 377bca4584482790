//! Procedural stand-in body model.
//!
//! Builds a coarse body in the SMPL joint layout (24 joints, 69 pose
//! scalars, 10 shape directions) out of elliptical tube rings, standing in
//! a T-pose with the feet at `y = 0` and the crown at [`HEIGHT`]. It lets
//! the fitter and extractors run end to end without a licensed model file.

use std::f64::consts::PI;

use bodyfit_core::Result;

use crate::description::ModelDescription;
use crate::model::BodyModel;

pub const JOINT_COUNT: usize = 24;
pub const BETA_COUNT: usize = 10;

/// Rest-pose height of the generated body in meters
pub const HEIGHT: f64 = 1.70;

/// Kinematic tree of the SMPL layout
pub const SMPL_PARENTS: [i32; JOINT_COUNT] = [
    -1, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19, 20, 21,
];

pub const JOINT_NAMES: [&str; JOINT_COUNT] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "spine1",
    "left_knee",
    "right_knee",
    "spine2",
    "left_ankle",
    "right_ankle",
    "spine3",
    "left_foot",
    "right_foot",
    "neck",
    "left_collar",
    "right_collar",
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hand",
    "right_hand",
];

const SEGMENTS: usize = 16;

/// Torso and head rings: (height, half width, half depth)
const TORSO_PROFILE: [(f64, f64, f64); 16] = [
    (0.78, 0.165, 0.110),
    (0.84, 0.175, 0.120),
    (0.92, 0.170, 0.115),
    (0.98, 0.150, 0.100),
    (1.02, 0.148, 0.100),
    (1.14, 0.155, 0.105),
    (1.22, 0.170, 0.120),
    (1.26, 0.172, 0.118),
    (1.34, 0.185, 0.110),
    (1.40, 0.200, 0.090),
    (1.46, 0.110, 0.070),
    (1.50, 0.055, 0.055),
    (1.56, 0.085, 0.100),
    (1.60, 0.090, 0.105),
    (1.66, 0.080, 0.090),
    (1.70, 0.020, 0.020),
];

const PELVIS_RING: usize = 2;
const SPINE1_RING: usize = 4;
const SPINE2_RING: usize = 5;
const SPINE3_RING: usize = 7;
const COLLAR_RING: usize = 10;
const NECK_RING: usize = 11;
const HEAD_RING: usize = 13;

/// Leg rings: (height, radius), hip to sole
const LEG_PROFILE: [(f64, f64); 4] = [(0.78, 0.075), (0.48, 0.050), (0.08, 0.038), (0.0, 0.045)];
const LEG_OFFSET_X: f64 = 0.09;
const CROTCH_HEIGHT: f64 = 0.78;

/// Arm rings: (lateral distance, radius), collar to hand
const ARM_PROFILE: [(f64, f64); 5] = [
    (0.12, 0.040),
    (0.18, 0.040),
    (0.44, 0.036),
    (0.68, 0.030),
    (0.76, 0.030),
];
const ARM_HEIGHT: f64 = 1.46;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Torso,
    Leg,
    Arm,
}

#[derive(Debug, Clone, Copy)]
struct VertexInfo {
    part: Part,
    position: [f64; 3],
    /// Offset from the ring center within the cross-section plane
    local: [f64; 3],
}

#[derive(Default)]
struct Builder {
    template: Vec<[f64; 3]>,
    faces: Vec<[u32; 3]>,
    skinning: Vec<Vec<(u32, f64)>>,
    info: Vec<VertexInfo>,
}

impl Builder {
    /// Append one ring of vertices and return the index of its first vertex
    fn ring(&mut self, center: [f64; 3], radii: (f64, f64), part: Part, weights: &[(u32, f64)]) -> u32 {
        let start = self.template.len() as u32;
        for k in 0..SEGMENTS {
            let phi = 2.0 * PI * k as f64 / SEGMENTS as f64;
            let (c, s) = (phi.cos(), phi.sin());
            let local = match part {
                Part::Arm => [0.0, radii.0 * c, radii.1 * s],
                Part::Torso | Part::Leg => [radii.0 * c, 0.0, radii.1 * s],
            };
            let position = [
                center[0] + local[0],
                center[1] + local[1],
                center[2] + local[2],
            ];
            self.template.push(position);
            self.skinning.push(weights.to_vec());
            self.info.push(VertexInfo {
                part,
                position,
                local,
            });
        }
        start
    }

    /// Stitch consecutive rings into a tube
    fn connect(&mut self, rings: &[u32]) {
        let n = SEGMENTS as u32;
        for pair in rings.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            for k in 0..n {
                let next = (k + 1) % n;
                self.faces.push([a + k, a + next, b + next]);
                self.faces.push([a + k, b + next, b + k]);
            }
        }
    }
}

/// Regressor entries placing a joint at `weight` times a ring centroid
fn centroid(ring: u32, weight: f64) -> impl Iterator<Item = (u32, f64)> {
    let share = weight / SEGMENTS as f64;
    (0..SEGMENTS as u32).map(move |k| (ring + k, share))
}

fn torso_weights(y: f64) -> [(u32, f64); 1] {
    let joint = match y {
        y if y < 0.98 => 0,
        y if y < 1.10 => 3,
        y if y < 1.24 => 6,
        y if y < 1.48 => 9,
        y if y < 1.55 => 12,
        _ => 15,
    };
    [(joint, 1.0)]
}

fn bump(y: f64, center: f64, width: f64) -> f64 {
    let t = (y - center) / width;
    (-t * t).exp()
}

fn scaled(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Offset field of shape direction `beta` at one vertex
fn shape_offset(beta: usize, v: &VertexInfo) -> [f64; 3] {
    let [x, y, _] = v.position;
    let torso = v.part == Part::Torso;
    let arm = v.part == Part::Arm;
    match beta {
        // stature
        0 => [0.0, 0.05 * y, 0.0],
        // overall girth
        1 => scaled(v.local, 0.08),
        // chest
        2 if torso => scaled(v.local, 0.12 * bump(y, 1.22, 0.08)),
        // waist
        3 if torso => scaled(v.local, 0.12 * bump(y, 0.98, 0.06)),
        // hips
        4 if torso => scaled(v.local, 0.12 * bump(y, 0.84, 0.06)),
        // leg length: legs stretch, everything above rides up
        5 => [0.0, 0.04 * y.min(CROTCH_HEIGHT) / CROTCH_HEIGHT, 0.0],
        // arm length
        6 if arm => {
            let reach = (x.abs() - ARM_PROFILE[1].0).max(0.0) / (ARM_PROFILE[4].0 - ARM_PROFILE[1].0);
            [0.05 * x.signum() * reach, 0.0, 0.0]
        }
        // shoulder breadth
        7 if torso => [0.12 * bump(y, 1.40, 0.05) * v.local[0], 0.0, 0.0],
        7 if arm => [0.02 * x.signum(), 0.0, 0.0],
        // torso depth
        8 if torso && y < 1.48 => [0.0, 0.0, 0.1 * v.local[2]],
        // head size
        9 if torso && y >= 1.52 => scaled(v.local, 0.1),
        _ => [0.0; 3],
    }
}

/// Generate the procedural model description
pub fn description() -> ModelDescription {
    let mut builder = Builder::default();
    let mut regressor: Vec<Vec<(u32, f64)>> = vec![Vec::new(); JOINT_COUNT];

    let torso: Vec<u32> = TORSO_PROFILE
        .iter()
        .map(|&(y, a, d)| builder.ring([0.0, y, 0.0], (a, d), Part::Torso, &torso_weights(y)))
        .collect();
    builder.connect(&torso);

    for (joint, ring) in [
        (0, PELVIS_RING),
        (3, SPINE1_RING),
        (6, SPINE2_RING),
        (9, SPINE3_RING),
        (12, NECK_RING),
        (15, HEAD_RING),
    ] {
        regressor[joint].extend(centroid(torso[ring], 1.0));
    }

    // Left side first (+x), matching the SMPL left/right joint order
    for (side, [hip, knee, ankle, foot]) in [(1.0, [1u32, 4, 7, 10]), (-1.0, [2, 5, 8, 11])] {
        let weights: [&[(u32, f64)]; 4] = [
            &[(hip, 1.0)],
            &[(hip, 0.5), (knee, 0.5)],
            &[(knee, 1.0)],
            &[(ankle, 1.0)],
        ];
        let rings: Vec<u32> = LEG_PROFILE
            .iter()
            .zip(weights)
            .map(|(&(y, r), w)| builder.ring([side * LEG_OFFSET_X, y, 0.0], (r, r), Part::Leg, w))
            .collect();
        builder.connect(&rings);

        for (joint, ring) in [hip, knee, ankle, foot].into_iter().zip(&rings) {
            regressor[joint as usize].extend(centroid(*ring, 1.0));
        }
    }

    for (side, [collar, shoulder, elbow, wrist, hand]) in
        [(1.0, [13u32, 16, 18, 20, 22]), (-1.0, [14, 17, 19, 21, 23])]
    {
        let weights: [&[(u32, f64)]; 5] = [
            &[(collar, 1.0)],
            &[(collar, 0.5), (shoulder, 0.5)],
            &[(shoulder, 0.5), (elbow, 0.5)],
            &[(elbow, 1.0)],
            &[(wrist, 1.0)],
        ];
        let rings: Vec<u32> = ARM_PROFILE
            .iter()
            .zip(weights)
            .map(|(&(x, r), w)| builder.ring([side * x, ARM_HEIGHT, 0.0], (r, r), Part::Arm, w))
            .collect();
        builder.connect(&rings);

        regressor[collar as usize].extend(centroid(rings[0], 0.5));
        regressor[collar as usize].extend(centroid(torso[COLLAR_RING], 0.5));
        for (joint, ring) in [shoulder, elbow, wrist, hand].into_iter().zip(&rings[1..]) {
            regressor[joint as usize].extend(centroid(*ring, 1.0));
        }
    }

    let shape_dirs = (0..BETA_COUNT)
        .map(|beta| builder.info.iter().map(|v| shape_offset(beta, v)).collect())
        .collect();

    ModelDescription {
        name: "PROCEDURAL_NEUTRAL".to_string(),
        template: builder.template,
        faces: builder.faces,
        parents: SMPL_PARENTS.to_vec(),
        shape_dirs,
        pose_dirs: Vec::new(),
        joint_regressor: regressor,
        skinning_weights: builder.skinning,
    }
}

impl BodyModel {
    /// Deterministic procedural body in the SMPL joint layout
    pub fn procedural() -> Result<Self> {
        Self::from_description(description())
    }
}
