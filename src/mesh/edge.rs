//! Edge records.

use crate::mesh::bucket::PointBucket;
use crate::mesh::ids::{EdgeId, TriangleId, VertexId};
use crate::mesh::marks::Marks;

/// An edge of the triangulation.
///
/// `et[0]` is the triangle to the left of the directed edge
/// `ev[0] -> ev[1]`, `et[1]` the triangle to the right. A convex-hull edge
/// has exactly one of the two slots populated.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Identity of this edge.
    pub eid: EdgeId,
    /// Endpoints.
    pub ev: [VertexId; 2],
    /// Incident triangles, left/right of the directed edge.
    pub et: [Option<TriangleId>; 2],
    /// Transient and persistent marks.
    pub marks: Marks,
    /// Non-vertex points whose projection currently falls on this edge.
    pub points: PointBucket,
}

impl Edge {
    /// Creates a new, unattached edge between `v0` and `v1`.
    #[must_use]
    pub const fn new(eid: EdgeId, v0: VertexId, v1: VertexId) -> Self {
        Self {
            eid,
            ev: [v0, v1],
            et: [None, None],
            marks: Marks::empty(),
            points: PointBucket::new(),
        }
    }

    /// True if this edge lies on the convex hull (exactly one adjacent
    /// triangle).
    #[must_use]
    pub const fn is_hull_edge(&self) -> bool {
        self.et[0].is_none() != self.et[1].is_none()
    }

    /// The other endpoint, given one.
    #[must_use]
    pub fn other_endpoint(&self, v: VertexId) -> Option<VertexId> {
        if self.ev[0] == v {
            Some(self.ev[1])
        } else if self.ev[1] == v {
            Some(self.ev[0])
        } else {
            None
        }
    }

    /// The triangle on the other side of `t` across this edge, if any.
    #[must_use]
    pub const fn other_triangle(&self, t: TriangleId) -> Option<TriangleId> {
        match (self.et[0], self.et[1]) {
            (Some(a), _) if a.0 == t.0 => self.et[1],
            (_, Some(b)) if b.0 == t.0 => self.et[0],
            _ => None,
        }
    }

    /// Resets this edge to a clean, freshly allocated state at `eid`
    /// between `v0` and `v1`. Used when recycling a freed record.
    pub fn reset(&mut self, eid: EdgeId, v0: VertexId, v1: VertexId) {
        self.eid = eid;
        self.ev = [v0, v1];
        self.et = [None, None];
        self.marks = Marks::empty();
        self.points = PointBucket::new();
    }
}
