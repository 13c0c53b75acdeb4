//! Walk-in-triangulation point location.

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::mesh::{EdgeId, MeshStore, TriangleId, VertexId};

/// The outcome of locating a query point in the current triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// The point lies strictly inside `TriangleId`.
    Triangle(TriangleId),
    /// The point lies on `EdgeId`, strictly between its endpoints.
    Edge(EdgeId),
    /// The point coincides with an existing vertex.
    Vertex(VertexId),
    /// The point lies outside the convex hull; `EdgeId` is a hull edge
    /// visible from the query point.
    External(EdgeId),
}

/// Locates `(qx, qy)` in the triangulation rooted at `store`, starting the
/// walk from `seed` (typically `store.first_triangle`).
///
/// # Errors
///
/// Returns [`TerraError::LocateDidNotTerminate`] if more triangles are
/// visited than the triangulation contains, or
/// [`TerraError::InvariantViolation`] if the walk hits a stale record.
pub fn locate(
    store: &MeshStore,
    seed: TriangleId,
    qx: f64,
    qy: f64,
) -> TerraResult<Location> {
    let q = kernel::Xy::new(qx, qy);
    let eps = store.epsilon;
    let max_steps = store.triangle_count().max(1);

    let mut current = seed;
    for _ in 0..=max_steps {
        let (v0, v1, v2) = store.get_tv(current)?;
        let tri = store
            .triangle(current)
            .ok_or_else(|| TerraError::InvariantViolation("locate visited stale triangle".into()))?;
        let verts = [v0, v1, v2];
        let p = [
            store.vertex(v0).unwrap().xy(),
            store.vertex(v1).unwrap().xy(),
            store.vertex(v2).unwrap().xy(),
        ];

        for &v in &verts {
            let vp = store.vertex(v).unwrap();
            if (vp.x - qx).abs() <= eps && (vp.y - qy).abs() <= eps {
                return Ok(Location::Vertex(v));
            }
        }

        let turns = [
            kernel::turn(p[0], p[1], q, eps),
            kernel::turn(p[1], p[2], q, eps),
            kernel::turn(p[2], p[0], q, eps),
        ];

        if let Some(i) = turns.iter().position(|&t| t == Turn::Right) {
            // Outside this triangle across edge i; cross it.
            let e = tri.te[i];
            let edge = store
                .edge(e)
                .ok_or_else(|| TerraError::InvariantViolation("locate crossed stale edge".into()))?;
            match edge.other_triangle(current) {
                Some(next) => {
                    current = next;
                    continue;
                }
                None => return Ok(Location::External(e)),
            }
        }

        if let Some(i) = turns.iter().position(|&t| t == Turn::Aligned) {
            return Ok(Location::Edge(tri.te[i]));
        }

        return Ok(Location::Triangle(current));
    }
    Err(TerraError::LocateDidNotTerminate)
}
