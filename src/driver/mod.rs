//! Refinement and decimation drivers: the layer that
//! turns the influence-region engine into a sequence of MT updates.
//!
//! Both drivers share the same rhythm — pop a candidate, hand it to
//! [`crate::influence`], relocate whatever points the update spilled out of
//! deleted triangles/edges, and report the result to a
//! [`crate::history::HistoryTracer`] — so the point-relocation and
//! error-accounting helpers below live here rather than in either driver.

pub mod decimate;
pub mod refine;

use crate::errors::TerraResult;
use crate::geometry::kernel::{self, Xy};
use crate::history::CreatedTriangle;
use crate::locate::{locate, Location};
use crate::mesh::bucket::BucketedPoint;
use crate::mesh::ids::PointId;
use crate::mesh::{MeshStore, TriangleId, VertexId};

/// An input point before insertion: its identity plus raw coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPoint {
    /// Identity in the original input order.
    pub pid: PointId,
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
    /// Elevation.
    pub z: f64,
}

impl InputPoint {
    /// This point's planar position.
    #[must_use]
    pub const fn xy(&self) -> Xy {
        Xy::new(self.x, self.y)
    }
}

/// A constraint edge between two input points, by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSegment {
    /// First endpoint.
    pub a: PointId,
    /// Second endpoint.
    pub b: PointId,
}

pub(crate) fn vertex_pz(store: &MeshStore, v: VertexId) -> (Xy, f64) {
    let vertex = store.vertex(v).unwrap();
    (vertex.xy(), vertex.z)
}

/// Locates `bp` in the current mesh and adds it to whichever triangle's or
/// edge's bucket now owns it, returning the freshly computed error.
///
/// Returns `Ok(None)` if `bp` now coincides with a mesh vertex (typically
/// the point just promoted to one) or has drifted outside the hull; either
/// way it is dropped rather than re-bucketed.
pub(crate) fn relocate_point(store: &mut MeshStore, bp: BucketedPoint) -> TerraResult<Option<f64>> {
    let seed = store
        .first_triangle
        .expect("relocate_point called on an empty mesh");
    match locate(store, seed, bp.x, bp.y)? {
        Location::Triangle(t) => {
            let (v0, v1, v2) = store.get_tv(t)?;
            let z = kernel::triangle_z(
                vertex_pz(store, v0),
                vertex_pz(store, v1),
                vertex_pz(store, v2),
                Xy::new(bp.x, bp.y),
            );
            let error = (bp.z - z).abs();
            store.triangle_mut(t).unwrap().points.add(bp, error);
            Ok(Some(error))
        }
        Location::Edge(e) => {
            let edge = store.edge(e).unwrap();
            let (v0, v1) = (edge.ev[0], edge.ev[1]);
            let z = kernel::edge_z(vertex_pz(store, v0), vertex_pz(store, v1), Xy::new(bp.x, bp.y));
            let error = (bp.z - z).abs();
            store.edge_mut(e).unwrap().points.add(bp, error);
            Ok(Some(error))
        }
        Location::Vertex(_) | Location::External(_) => {
            log::warn!(
                "dropping bucketed point {} at ({}, {}): no longer strictly inside the hull",
                bp.pid,
                bp.x,
                bp.y
            );
            Ok(None)
        }
    }
}

/// Builds the `CreatedTriangle` record for each `id`: its vertices and its
/// error, the max of its own bucket's head and its three edges' heads
///.
pub(crate) fn created_triangle_records(store: &MeshStore, ids: &[TriangleId]) -> TerraResult<Vec<CreatedTriangle>> {
    ids.iter()
        .map(|&t| {
            let (v0, v1, v2) = store.get_tv(t)?;
            let tri = store.triangle(t).unwrap();
            let mut error = tri.own_error();
            for &e in &tri.te {
                error = error.max(store.edge(e).unwrap().points.error());
            }
            Ok(CreatedTriangle {
                vertices: [v0, v1, v2],
                error,
            })
        })
        .collect()
}
