//! Board symmetries.
//!
//! Ten transforms `k = 2 * i + j`: `i` quarter turns followed by a mirror
//! when `j == 1`, for `i` in `0..5`. Four quarter turns bring the board back,
//! so transforms 8 and 9 repeat 0 and 1. Each transform maps an old point to
//! a new point; boards, actions and policies are all moved with that single
//! map so they stay consistent with each other.

use crate::board::Phase;
use crate::codec::NUM_ACTIONS;
use crate::geometry::{point_at, GRID_SIZE, POINTS, POINT_COUNT};

/// Number of transforms in a table.
pub const NUM_SYMMETRIES: usize = 10;

/// Precomputed point and action permutations.
///
/// Built once and shared behind an `Arc`; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryTable {
    points: [[u8; POINT_COUNT]; NUM_SYMMETRIES],
    actions: Vec<Vec<u16>>,
}

impl Default for SymmetryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Quarter turn of grid coordinates.
fn rotate((x, y): (u8, u8)) -> (u8, u8) {
    (GRID_SIZE as u8 - 1 - y, x)
}

/// Top-bottom mirror of grid coordinates: `x` is kept, `y` is flipped.
fn mirror((x, y): (u8, u8)) -> (u8, u8) {
    (x, GRID_SIZE as u8 - 1 - y)
}

impl SymmetryTable {
    pub fn new() -> Self {
        let mut points = [[0u8; POINT_COUNT]; NUM_SYMMETRIES];
        for (k, perm) in points.iter_mut().enumerate() {
            let (turns, mirrored) = (k / 2, k % 2 == 1);
            for (p, slot) in perm.iter_mut().enumerate() {
                let mut xy = POINTS[p];
                for _ in 0..turns {
                    xy = rotate(xy);
                }
                if mirrored {
                    xy = mirror(xy);
                }
                // Rotations and mirrors of the grid map playable points onto
                // playable points.
                *slot = point_at(xy.0, xy.1).unwrap_or(p) as u8;
            }
        }

        let actions = points
            .iter()
            .map(|perm| {
                (0..NUM_ACTIONS)
                    .map(|a| {
                        let (from, to) = (a / POINT_COUNT, a % POINT_COUNT);
                        (perm[from] as usize * POINT_COUNT + perm[to] as usize) as u16
                    })
                    .collect()
            })
            .collect();

        Self { points, actions }
    }

    /// Image of `point` under transform `k`.
    #[inline]
    pub fn transform_point(&self, point: usize, k: usize) -> usize {
        self.points[k][point] as usize
    }

    /// Move every cell to its image under transform `k`.
    pub fn transform_points<T: Copy + Default>(
        &self,
        cells: &[T; POINT_COUNT],
        k: usize,
    ) -> [T; POINT_COUNT] {
        let mut out = [T::default(); POINT_COUNT];
        for (p, &value) in cells.iter().enumerate() {
            out[self.points[k][p] as usize] = value;
        }
        out
    }

    /// Image of a relocation action under transform `k`.
    #[inline]
    pub fn transform_action(&self, action: usize, k: usize) -> usize {
        self.actions[k][action] as usize
    }

    /// Move a policy vector under transform `k`.
    ///
    /// Placement and removal policies live in the first 24 slots and move
    /// with the point map; relocation policies move with the action map.
    pub fn transform_policy(&self, policy: &[f32], phase: Phase, k: usize) -> Vec<f32> {
        debug_assert_eq!(policy.len(), NUM_ACTIONS);
        let mut out = policy.to_vec();
        match phase {
            Phase::Placing | Phase::Capturing => {
                for (p, &value) in policy.iter().take(POINT_COUNT).enumerate() {
                    out[self.points[k][p] as usize] = value;
                }
            }
            Phase::Moving | Phase::Flying => {
                for (a, &value) in policy.iter().take(NUM_ACTIONS).enumerate() {
                    out[self.actions[k][a] as usize] = value;
                }
            }
        }
        out
    }

    /// Every (cells, policy) pair of a position under all transforms.
    pub fn augment<T: Copy + Default>(
        &self,
        cells: &[T; POINT_COUNT],
        policy: &[f32],
        phase: Phase,
    ) -> Vec<([T; POINT_COUNT], Vec<f32>)> {
        (0..NUM_SYMMETRIES)
            .map(|k| (self.transform_points(cells, k), self.transform_policy(policy, phase, k)))
            .collect()
    }
}
