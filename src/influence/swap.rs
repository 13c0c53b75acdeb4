//! Delaunay-optimization swap-edge loop.
//!
//! Shared by [`super::remove::remove_vertex`] and (eventually)
//! `crate::constraint`'s extended optimization: both build a triangulation
//! locally valid by construction (the ears algorithm only checks the
//! candidate ear itself) and then drain a worklist of newly created edges
//! here to restore global Delaunay-ness.

use std::collections::VecDeque;

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::influence::RegionUpdate;
use crate::mesh::marks::Marks;
use crate::mesh::{EdgeId, MeshStore, TriangleId, VertexId};

/// Drains `queue`, swapping every non-Delaunay diagonal it contains (and
/// whatever further edges each swap invalidates) into `update`.
///
/// # Errors
///
/// Returns [`TerraError::InvariantViolation`] if the queue does not drain
/// within a generous, mesh-size-derived step bound (a cycle of swaps would
/// otherwise spin forever).
pub fn optimize_swap_queue(
    store: &mut MeshStore,
    queue: &mut VecDeque<EdgeId>,
    update: &mut RegionUpdate,
) -> TerraResult<()> {
    let max_steps = store.edge_ids().count() * 8 + 64;
    let mut steps = 0usize;
    while let Some(e) = queue.pop_front() {
        steps += 1;
        if steps > max_steps {
            return Err(TerraError::InvariantViolation(
                "swap-edge queue did not drain".into(),
            ));
        }
        let Some(edge) = store.edge(e) else {
            continue;
        };
        if edge.marks.has(Marks::INFL_BORDER) || edge.marks.has(Marks::CONSTRAINED) || edge.is_hull_edge() {
            continue;
        }
        let (t0, t1) = match (edge.et[0], edge.et[1]) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        let (ev0, ev1) = (edge.ev[0], edge.ev[1]);
        let vo0 = opposite_vertex(store, t0, e)?;
        let vo1 = opposite_vertex(store, t1, e)?;

        let p_vo0 = store.vertex(vo0).unwrap().xy();
        let p_vo1 = store.vertex(vo1).unwrap().xy();
        let p_ev0 = store.vertex(ev0).unwrap().xy();
        let p_ev1 = store.vertex(ev1).unwrap().xy();

        let ta = kernel::turn(p_vo0, p_ev0, p_vo1, store.epsilon);
        let tb = kernel::turn(p_vo0, p_ev1, p_vo1, store.epsilon);
        let convex = ta != tb && ta != Turn::Aligned && tb != Turn::Aligned;
        if !convex {
            continue;
        }

        let tri0 = store.triangle(t0).unwrap();
        let tri1 = store.triangle(t1).unwrap();
        let needs_swap = kernel::in_circle(tri0.circumcenter, tri0.circumradius, p_vo1, store.epsilon)
            || kernel::in_circle(tri1.circumcenter, tri1.circumradius, p_vo0, store.epsilon);
        if !needs_swap {
            continue;
        }

        let edge_vo0_ev0 = edge_between(store, &tri0.te, vo0, ev0)?;
        let edge_vo0_ev1 = edge_between(store, &tri0.te, vo0, ev1)?;
        let edge_vo1_ev0 = edge_between(store, &tri1.te, vo1, ev0)?;
        let edge_vo1_ev1 = edge_between(store, &tri1.te, vo1, ev1)?;
        let err0 = tri0.own_error();
        let err1 = tri1.own_error();

        let mut detached = Vec::new();
        store.detach_triangle(t0, &mut detached);
        store.detach_triangle(t1, &mut detached);
        store.detach_edge(e);

        let diagonal = store.new_edge(vo0, vo1);
        let nt0 = store.new_triangle(edge_vo0_ev0, edge_vo1_ev0, diagonal)?;
        let nt1 = store.new_triangle(edge_vo0_ev1, edge_vo1_ev1, diagonal)?;

        update.deleted_triangles.push(t0);
        update.deleted_triangles.push(t1);
        update.deleted_errors.push(err0);
        update.deleted_errors.push(err1);
        update.created_triangles.push(nt0);
        update.created_triangles.push(nt1);
        update.detached_points.extend(detached);

        queue.push_back(edge_vo0_ev0);
        queue.push_back(edge_vo0_ev1);
        queue.push_back(edge_vo1_ev0);
        queue.push_back(edge_vo1_ev1);
    }
    Ok(())
}

fn opposite_vertex(store: &MeshStore, t: TriangleId, e: EdgeId) -> TerraResult<VertexId> {
    let (v0, v1, v2) = store.get_tv(t)?;
    let edge = store
        .edge(e)
        .ok_or_else(|| TerraError::InvariantViolation("opposite_vertex: stale edge".into()))?;
    [v0, v1, v2]
        .into_iter()
        .find(|v| !edge.ev.contains(v))
        .ok_or_else(|| TerraError::InvariantViolation("opposite_vertex: e not incident on t".into()))
}

fn edge_between(store: &MeshStore, candidates: &[EdgeId; 3], a: VertexId, b: VertexId) -> TerraResult<EdgeId> {
    candidates
        .iter()
        .copied()
        .find(|&e| {
            let ev = store.edge(e).unwrap().ev;
            (ev[0] == a && ev[1] == b) || (ev[0] == b && ev[1] == a)
        })
        .ok_or_else(|| TerraError::InvariantViolation("quad edge not found among triangle's TE".into()))
}

/// The midpoint of `e`'s circumcircle-containment test outcome, exposed for
/// `crate::constraint`'s extended optimization pass to reuse the same
/// convexity/empty-circle predicate without draining a queue.
#[must_use]
pub fn would_swap(store: &MeshStore, e: EdgeId) -> bool {
    let Some(edge) = store.edge(e) else { return false };
    if edge.marks.has(Marks::INFL_BORDER) || edge.marks.has(Marks::CONSTRAINED) || edge.is_hull_edge() {
        return false;
    }
    let (Some(t0), Some(t1)) = (edge.et[0], edge.et[1]) else {
        return false;
    };
    let Ok(vo0) = opposite_vertex(store, t0, e) else {
        return false;
    };
    let Ok(vo1) = opposite_vertex(store, t1, e) else {
        return false;
    };
    let p_vo0 = store.vertex(vo0).unwrap().xy();
    let p_vo1 = store.vertex(vo1).unwrap().xy();
    let tri0 = store.triangle(t0).unwrap();
    let tri1 = store.triangle(t1).unwrap();
    kernel::in_circle(tri0.circumcenter, tri0.circumradius, p_vo1, store.epsilon)
        || kernel::in_circle(tri1.circumcenter, tri1.circumradius, p_vo0, store.epsilon)
}
