//! Dense arena indices for vertices, edges and triangles.
//!
//! Every topological cross-reference in the mesh (`VE`, `ET`, `TE`) is one
//! of these newtypes rather than a pointer: a stale id is a bounds/`None`
//! check away, never a use-after-free.

use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the raw index into the owning arena.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(VertexId, "Identifies a vertex in a [`crate::mesh::store::MeshStore`].");
define_id!(EdgeId, "Identifies an edge in a [`crate::mesh::store::MeshStore`].");
define_id!(
    TriangleId,
    "Identifies a triangle in a [`crate::mesh::store::MeshStore`]."
);
define_id!(PointId, "Identifies an input point, before or after insertion.");
