//! Lattice Grid
//!
//! Identity types for segments placed in a discrete 3D grid.
//!
//! # Coordinates
//!
//! A [`GridPosition`] is an integer `(x, y, z)` cell inside one [`SpaceId`].
//! Positions in different spaces are never adjacent, never equal, and never
//! share a neighborhood.
//!
//! # Adjacency
//!
//! Segments connect through their six faces only (6-connectivity):
//! - 2 vertical neighbors (down/up)
//! - 4 horizontal neighbors (north/south/west/east)
//!
//! Diagonals never connect.
//!
//! # Endpoints
//!
//! An [`EndpointRef`] names a resource container reachable at a position,
//! optionally through one face. Bridges store the endpoints they discover as
//! [`RelativeEndpoint`]s so a record can be moved or persisted without
//! recomputing it.

mod position;
mod face;
mod endpoint;
mod neighbors;

pub use position::{GridPosition, Offset, SpaceId};
pub use face::Face;
pub use endpoint::{EndpointRef, RelativeEndpoint};
pub use neighbors::{CubeIter, Neighborhood};
