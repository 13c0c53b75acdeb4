//! The influence-region engine — the heart of the system.
//!
//! [`insert`] grows the region of triangles whose circumcircle contains an
//! inserted point and fan-retriangulates it; [`remove`] does the symmetric
//! thing for a removed vertex via the ears algorithm; [`swap`] is the
//! Delaunay-optimization pass both [`remove::remove_vertex`] and
//! `crate::constraint` drain afterwards. All three report their mesh deltas
//! as a [`RegionUpdate`] rather than touching `crate::history` directly —
//! the caller redistributes detached points and only then knows each new
//! triangle's real error.

pub mod insert;
pub mod remove;
pub mod swap;

use std::collections::VecDeque;

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::index::dlist::{DList, DListCursor};
use crate::mesh::bucket::BucketedPoint;
use crate::mesh::triangle::Triangle;
use crate::mesh::{EdgeId, MeshStore, TriangleId, VertexId};

pub use insert::insert_point;
pub use remove::{remove_vertex, OkTriangleMode};
pub use swap::{optimize_swap_queue, would_swap};

/// The two edges of `tri` other than `e`, in CCW order starting right
/// after `e` in `tri.te`. Used whenever a triangle is absorbed into a
/// growing region and its far edges must replace `e` on the border in a
/// way that keeps the border's winding consistent.
pub(crate) fn other_two_edges_ccw(tri: &Triangle, e: EdgeId) -> (EdgeId, EdgeId) {
    let idx = tri
        .te
        .iter()
        .position(|&te| te == e)
        .expect("e must be one of tri's edges");
    (tri.te[(idx + 1) % 3], tri.te[(idx + 2) % 3])
}

/// The mesh-level delta of one atomic update, before the driver has
/// redistributed `detached_points` into the new triangles and can compute
/// their real errors for `crate::history::HistoryTracer`.
#[derive(Debug, Clone, Default)]
pub struct RegionUpdate {
    /// Triangles detached during this update, in the order they were
    /// removed.
    pub deleted_triangles: Vec<TriangleId>,
    /// `own_error()` of each entry in `deleted_triangles`, captured before
    /// detachment, same order.
    pub deleted_errors: Vec<f64>,
    /// Triangles created during this update.
    pub created_triangles: Vec<TriangleId>,
    /// Points spilled out of deleted triangles' and edges' buckets, still
    /// awaiting relocation.
    pub detached_points: Vec<BucketedPoint>,
}

impl RegionUpdate {
    /// An update that touched nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another update's deltas into this one, in sequence. Used when
    /// a later pass (the swap-edge optimization) extends an update already
    /// produced by insertion or removal.
    pub fn extend(&mut self, other: Self) {
        self.deleted_triangles.extend(other.deleted_triangles);
        self.deleted_errors.extend(other.deleted_errors);
        self.created_triangles.extend(other.created_triangles);
        self.detached_points.extend(other.detached_points);
    }
}

/// A vertex of a polygon border paired with the edge leading to the next
/// node, CCW. Shared by [`remove::remove_vertex`] and `crate::constraint`,
/// both of which reduce to "close a hole bounded by a ring of existing
/// edges with the ears algorithm" once their own setup is done.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RingNode {
    pub v: VertexId,
    pub e_next: EdgeId,
}

/// Walks a closed chain of `border` edges into an ordered ring of
/// [`RingNode`]s, starting from the vertex shared by the first and last
/// edge.
pub(crate) fn chain_to_ring(store: &MeshStore, border: &[EdgeId]) -> TerraResult<Vec<RingNode>> {
    let n = border.len();
    let first_edge = store
        .edge(border[0])
        .ok_or_else(|| TerraError::InvariantViolation("chain_to_ring: stale edge".into()))?
        .clone();
    let last_edge = store
        .edge(border[n - 1])
        .ok_or_else(|| TerraError::InvariantViolation("chain_to_ring: stale edge".into()))?
        .clone();
    let v0 = [first_edge.ev[0], first_edge.ev[1]]
        .into_iter()
        .find(|x| last_edge.ev.contains(x))
        .ok_or_else(|| TerraError::InvariantViolation("border chain does not close".into()))?;
    let mut nodes = Vec::with_capacity(n);
    let mut cur = v0;
    for &e in border {
        let next_v = store
            .edge(e)
            .unwrap()
            .other_endpoint(cur)
            .ok_or_else(|| TerraError::InvariantViolation("border is not a chain".into()))?;
        nodes.push(RingNode { v: cur, e_next: e });
        cur = next_v;
    }
    Ok(nodes)
}

/// Ear-clips a closed polygon ring (as produced by [`chain_to_ring`]) down
/// to triangles. Each accepted ear's closing edge is queued for
/// [`swap::optimize_swap_queue`] so the caller can restore global
/// Delaunay-ness once the hole is fully triangulated.
///
/// # Errors
///
/// Propagates a mesh-traversal failure, or returns
/// [`TerraError::InvariantViolation`] if no ear can be found within the
/// ring's size bound (malformed border).
pub(crate) fn ear_clip(
    store: &mut MeshStore,
    nodes_data: Vec<RingNode>,
    mode: OkTriangleMode,
) -> TerraResult<(Vec<TriangleId>, VecDeque<EdgeId>)> {
    let n = nodes_data.len();
    let mut ring: DList<RingNode> = DList::new();
    for node in nodes_data {
        ring.push_back(node);
    }

    let mut created_triangles = Vec::new();
    let mut swap_queue: VecDeque<EdgeId> = VecDeque::new();
    let max_steps = n * 4 + 16;
    let mut cursor = DListCursor::new(ring.first().unwrap());
    for _ in 0..max_steps {
        if ring.len() == 3 {
            break;
        }
        let cur_node = cursor.current();
        let Some(prev_node) = ring.prev(cur_node) else {
            cursor.go_next(&ring);
            continue;
        };
        let Some(next_node) = ring.next(cur_node) else {
            cursor = DListCursor::new(ring.first().unwrap());
            continue;
        };
        let n0 = *ring.get(prev_node)?;
        let n1 = *ring.get(cur_node)?;
        let n2 = *ring.get(next_node)?;
        let p0 = store.vertex(n0.v).unwrap().xy();
        let p1 = store.vertex(n1.v).unwrap().xy();
        let p2 = store.vertex(n2.v).unwrap().xy();

        let is_ear = kernel::turn(p0, p1, p2, store.epsilon) == Turn::Left
            && ok_triangle(store, &ring, [n0.v, n1.v, n2.v], p0, p1, p2, mode)?;

        if is_ear {
            let closing = store.new_edge(n2.v, n0.v);
            let t = store.new_triangle(n0.e_next, n1.e_next, closing)?;
            created_triangles.push(t);
            swap_queue.push_back(closing);

            let prev_val = RingNode { v: n0.v, e_next: closing };
            let new_prev = ring.insert_before(prev_node, prev_val)?;
            ring.remove(prev_node)?;
            ring.remove(cur_node)?;
            cursor = DListCursor::new(new_prev);
        } else {
            cursor.go_next(&ring);
        }
    }

    if ring.len() == 3 {
        let a = ring.first().unwrap();
        let b = ring.next(a).unwrap();
        let c = ring.next(b).unwrap();
        let na = *ring.get(a)?;
        let nb = *ring.get(b)?;
        let nc = *ring.get(c)?;
        let t = store.new_triangle(na.e_next, nb.e_next, nc.e_next)?;
        created_triangles.push(t);
    } else {
        return Err(TerraError::InvariantViolation(
            "ear_clip did not reduce the ring to a single triangle".into(),
        ));
    }

    Ok((created_triangles, swap_queue))
}

/// Tests whether the candidate ear `(p0, p1, p2)` is empty of every other
/// ring vertex, per `mode`'s emptiness criterion.
fn ok_triangle(
    store: &MeshStore,
    ring: &DList<RingNode>,
    exclude: [VertexId; 3],
    p0: kernel::Xy,
    p1: kernel::Xy,
    p2: kernel::Xy,
    mode: OkTriangleMode,
) -> TerraResult<bool> {
    let Some(mut node) = ring.first() else {
        return Ok(true);
    };
    loop {
        let candidate = *ring.get(node)?;
        if !exclude.contains(&candidate.v) {
            let p = store.vertex(candidate.v).unwrap().xy();
            let violates = match mode {
                OkTriangleMode::Refinement => kernel::in_triangle(p0, p1, p2, p, store.epsilon),
                OkTriangleMode::Decimation => match kernel::circumcircle(p0, p1, p2, store.epsilon) {
                    Some((c, r)) => kernel::in_circle(c, r, p, store.epsilon),
                    None => false,
                },
            };
            if violates {
                return Ok(false);
            }
        }
        match ring.next(node) {
            Some(next) => node = next,
            None => return Ok(true),
        }
    }
}
