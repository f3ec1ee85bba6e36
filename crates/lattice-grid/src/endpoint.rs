//! Endpoint references, absolute and origin-relative.

use crate::{Face, GridPosition, Offset};

/// An addressable resource container at a position, optionally through a face.
///
/// Ordered by position, then face (`None` first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndpointRef {
    pub position: GridPosition,
    pub face: Option<Face>,
}

impl EndpointRef {
    /// Create a new endpoint reference.
    pub const fn new(position: GridPosition, face: Option<Face>) -> Self {
        Self { position, face }
    }

    /// Endpoint accessed through a specific face.
    pub const fn on_face(position: GridPosition, face: Face) -> Self {
        Self { position, face: Some(face) }
    }

    /// Express this endpoint relative to `origin`.
    ///
    /// `None` when the endpoint is in another space than `origin`.
    pub fn relative_to(&self, origin: &GridPosition) -> Option<RelativeEndpoint> {
        Some(RelativeEndpoint {
            offset: self.position.offset_from(origin)?,
            face: self.face,
        })
    }
}

impl std::fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.face {
            Some(face) => write!(f, "{}@{}", self.position, face),
            None => write!(f, "{}", self.position),
        }
    }
}

/// An endpoint stored relative to the bridge that discovered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelativeEndpoint {
    pub offset: Offset,
    pub face: Option<Face>,
}

impl RelativeEndpoint {
    /// Create a new relative endpoint.
    pub const fn new(offset: Offset, face: Option<Face>) -> Self {
        Self { offset, face }
    }

    /// Resolve against an origin.
    pub fn resolve(&self, origin: &GridPosition) -> Option<EndpointRef> {
        Some(EndpointRef {
            position: origin.checked_add(self.offset)?,
            face: self.face,
        })
    }
}

impl std::fmt::Display for RelativeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.face {
            Some(face) => write!(f, "{}@{}", self.offset, face),
            None => write!(f, "{}", self.offset),
        }
    }
}
