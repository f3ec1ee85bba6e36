//! Grid positions and offsets.
//!
//! A position is an integer cell inside a space. Offsets are the difference
//! between two positions of the same space and are what bridges persist, so a
//! record stays valid when its origin is described relative to itself.

/// Opaque identifier of a space (dimension, world, shard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpaceId(pub u64);

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "space#{}", self.0)
    }
}

/// A cell in a 3D grid.
///
/// Ordering is lexicographic on `(space, x, y, z)`; routing relies on it for
/// deterministic slot numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPosition {
    /// Space this cell belongs to
    #[cfg_attr(feature = "serde", serde(default))]
    pub space: SpaceId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPosition {
    /// Create a new position.
    pub const fn new(space: SpaceId, x: i32, y: i32, z: i32) -> Self {
        Self { space, x, y, z }
    }

    /// Create a position in the default space.
    pub const fn at(x: i32, y: i32, z: i32) -> Self {
        Self { space: SpaceId(0), x, y, z }
    }

    /// Translate by an offset, or `None` if any axis leaves the `i32` range.
    pub fn checked_add(&self, offset: Offset) -> Option<Self> {
        Some(Self {
            space: self.space,
            x: self.x.checked_add(offset.dx)?,
            y: self.y.checked_add(offset.dy)?,
            z: self.z.checked_add(offset.dz)?,
        })
    }

    /// Offset from `origin` to `self`.
    ///
    /// `None` when the positions live in different spaces or the distance
    /// does not fit an offset.
    pub fn offset_from(&self, origin: &Self) -> Option<Offset> {
        if self.space != origin.space {
            return None;
        }
        Some(Offset {
            dx: self.x.checked_sub(origin.x)?,
            dy: self.y.checked_sub(origin.y)?,
            dz: self.z.checked_sub(origin.z)?,
        })
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {}, {})", self.space, self.x, self.y, self.z)
    }
}

/// A displacement between two cells of the same space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl Offset {
    /// Create a new offset.
    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:+}, {:+}, {:+}]", self.dx, self.dy, self.dz)
    }
}
