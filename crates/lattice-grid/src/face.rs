//! The six axis-aligned faces of a grid cell.

use crate::Offset;

/// One of the six faces of a cell.
///
/// Declaration order is the canonical iteration order used everywhere a
/// deterministic face order matters (neighbor discovery, slot numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    /// All faces in canonical order.
    pub const ALL: [Face; 6] = [
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    /// Unit offset pointing out of this face.
    pub const fn offset(self) -> Offset {
        match self {
            Face::Down => Offset { dx: 0, dy: -1, dz: 0 },
            Face::Up => Offset { dx: 0, dy: 1, dz: 0 },
            Face::North => Offset { dx: 0, dy: 0, dz: -1 },
            Face::South => Offset { dx: 0, dy: 0, dz: 1 },
            Face::West => Offset { dx: -1, dy: 0, dz: 0 },
            Face::East => Offset { dx: 1, dy: 0, dz: 0 },
        }
    }
}

impl std::fmt::Display for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Face::Down => "down",
            Face::Up => "up",
            Face::North => "north",
            Face::South => "south",
            Face::West => "west",
            Face::East => "east",
        };
        f.write_str(name)
    }
}
