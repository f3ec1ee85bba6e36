//! 6-connectivity and cubic neighborhoods.
//!
//! Every cell has exactly 6 face neighbors. Bridges additionally look at a
//! cube of cells around themselves; cube iteration follows the position
//! ordering so scans are deterministic.

use crate::{Face, GridPosition};

/// Neighbor computations for a cell.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood;

impl Neighborhood {
    /// The face neighbors of `pos`, paired with the face that leads to them.
    ///
    /// Neighbors that would leave the `i32` range are omitted.
    pub fn of(pos: GridPosition) -> impl Iterator<Item = (Face, GridPosition)> {
        Face::ALL
            .into_iter()
            .filter_map(move |face| pos.checked_add(face.offset()).map(|n| (face, n)))
    }

    /// Every cell within Chebyshev distance `radius` of `center`, center
    /// included, ordered by `(x, y, z)`.
    pub fn cube(center: GridPosition, radius: u32) -> CubeIter {
        CubeIter::new(center, radius)
    }
}

/// Iterator over the cells of a cube, clipped to the `i32` range.
#[derive(Debug, Clone)]
pub struct CubeIter {
    center: GridPosition,
    lo: [i64; 3],
    hi: [i64; 3],
    cursor: [i64; 3],
    done: bool,
}

impl CubeIter {
    fn new(center: GridPosition, radius: u32) -> Self {
        let r = radius as i64;
        let clip = |v: i32| -> (i64, i64) {
            let v = v as i64;
            ((v - r).max(i32::MIN as i64), (v + r).min(i32::MAX as i64))
        };
        let (x0, x1) = clip(center.x);
        let (y0, y1) = clip(center.y);
        let (z0, z1) = clip(center.z);
        Self {
            center,
            lo: [x0, y0, z0],
            hi: [x1, y1, z1],
            cursor: [x0, y0, z0],
            done: false,
        }
    }
}

impl Iterator for CubeIter {
    type Item = GridPosition;

    fn next(&mut self) -> Option<GridPosition> {
        if self.done {
            return None;
        }
        let [x, y, z] = self.cursor;
        // Bounds were clipped to the i32 range, so the casts are lossless.
        let item = GridPosition::new(self.center.space, x as i32, y as i32, z as i32);

        // Advance z fastest, then y, then x.
        let mut axis = 2;
        loop {
            if self.cursor[axis] < self.hi[axis] {
                self.cursor[axis] += 1;
                break;
            }
            self.cursor[axis] = self.lo[axis];
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
        }

        Some(item)
    }
}
