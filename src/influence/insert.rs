//! Vertex insertion by influence-region growth.

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Xy};
use crate::index::dlist::{DList, DListCursor};
use crate::influence::{other_two_edges_ccw, RegionUpdate};
use crate::locate::{locate, Location};
use crate::mesh::marks::Marks;
use crate::mesh::{EdgeId, MeshStore, TriangleId, VertexId};
use std::collections::HashMap;

/// Inserts a new vertex at `(x, y, z)`, growing and re-triangulating the
/// influence region around it.
///
/// `seed` is the triangle the point locator starts walking from (typically
/// `store.first_triangle`).
///
/// # Errors
///
/// Returns [`TerraError::DuplicatePoint`] if `(x, y)` coincides with an
/// existing vertex, or propagates a locate/invariant failure.
pub fn insert_point(
    store: &mut MeshStore,
    seed: TriangleId,
    x: f64,
    y: f64,
    z: f64,
) -> TerraResult<(VertexId, RegionUpdate)> {
    let q = Xy::new(x, y);
    match locate(store, seed, x, y)? {
        Location::Vertex(_) => Err(TerraError::DuplicatePoint { x, y }),
        Location::Triangle(t) => {
            let border = grow_from_triangle(store, q, t)?;
            finish(store, border, x, y, z)
        }
        Location::Edge(e) => {
            let border = grow_from_edge(store, q, e)?;
            finish(store, border, x, y, z)
        }
        Location::External(e) => {
            let border = visible_hull_chain(store, q, e)?;
            finish(store, border, x, y, z)
        }
    }
}

/// A growth result: every interior triangle/edge absorbed into the region,
/// and the border (closed ring for an interior seed, open chain for an
/// external one) left to fan-triangulate.
struct GrowthResult {
    deleted_triangles: Vec<TriangleId>,
    deleted_errors: Vec<f64>,
    deleted_edges: Vec<EdgeId>,
    border: Vec<EdgeId>,
}

fn grow_from_triangle(store: &mut MeshStore, q: Xy, seed: TriangleId) -> TerraResult<GrowthResult> {
    let te = store.triangle(seed).unwrap().te;
    mark_to_delete(store, seed);
    let mut result = GrowthResult {
        deleted_errors: vec![store.triangle(seed).unwrap().own_error()],
        deleted_triangles: vec![seed],
        deleted_edges: Vec::new(),
        border: Vec::new(),
    };
    let mut list = DList::new();
    for e in te {
        list.push_back(e);
    }
    let start = list.first().unwrap();
    grow_border(store, q, &mut list, DListCursor::new(start), &mut result)?;
    result.border = list.to_vec();
    Ok(result)
}

fn grow_from_edge(store: &mut MeshStore, q: Xy, shared: EdgeId) -> TerraResult<GrowthResult> {
    let edge = store
        .edge(shared)
        .ok_or_else(|| TerraError::InvariantViolation("grow_from_edge: stale edge".into()))?
        .clone();
    let t0 = edge.et[0].ok_or_else(|| {
        TerraError::InvariantViolation("PL_EDGE seed edge has no triangle on side 0".into())
    })?;
    let t1 = edge.et[1].ok_or_else(|| {
        TerraError::InvariantViolation("PL_EDGE seed edge has no triangle on side 1".into())
    })?;
    let (a0, b0) = other_two_edges_ccw(store.triangle(t0).unwrap(), shared);
    let (a1, b1) = other_two_edges_ccw(store.triangle(t1).unwrap(), shared);

    let err0 = store.triangle(t0).unwrap().own_error();
    let err1 = store.triangle(t1).unwrap().own_error();
    mark_to_delete(store, t0);
    mark_to_delete(store, t1);

    let mut result = GrowthResult {
        deleted_triangles: vec![t0, t1],
        deleted_errors: vec![err0, err1],
        deleted_edges: vec![shared],
        border: Vec::new(),
    };

    let mut list = DList::new();
    list.push_back(a0);
    list.push_back(b0);
    list.push_back(a1);
    list.push_back(b1);
    let start = list.first().unwrap();
    grow_border(store, q, &mut list, DListCursor::new(start), &mut result)?;
    result.border = list.to_vec();
    Ok(result)
}

fn mark_to_delete(store: &mut MeshStore, t: TriangleId) {
    store.triangle_mut(t).unwrap().marks.set(Marks::TO_DELETE);
}

/// Grows a closed border ring in place. For each border edge, if the
/// triangle on the side not already absorbed has `q` in its circumcircle,
/// it is absorbed too: marked TO_DELETE, its far edge recorded as now
/// interior, and its other two edges replace the examined edge on the
/// border.
fn grow_border(
    store: &mut MeshStore,
    q: Xy,
    list: &mut DList<EdgeId>,
    mut cursor: DListCursor,
    result: &mut GrowthResult,
) -> TerraResult<()> {
    let max_steps = store.triangle_count() * 4 + 16;
    let mut stale_run = 0usize;
    for _ in 0..max_steps {
        if list.len() == 0 || stale_run >= list.len() {
            break;
        }
        let e = *list.get(cursor.current())?;
        let edge = store
            .edge(e)
            .ok_or_else(|| TerraError::InvariantViolation("growth border edge went stale".into()))?;
        let outside = [edge.et[0], edge.et[1]]
            .into_iter()
            .flatten()
            .find(|&t| !store.triangle(t).unwrap().marks.has(Marks::TO_DELETE));

        let grow = outside.is_some_and(|t| {
            let tri = store.triangle(t).unwrap();
            kernel::in_circle(tri.circumcenter, tri.circumradius, q, store.epsilon)
        });

        if let (true, Some(t)) = (grow, outside) {
            let (a, b) = other_two_edges_ccw(store.triangle(t).unwrap(), e);
            result.deleted_errors.push(store.triangle(t).unwrap().own_error());
            result.deleted_triangles.push(t);
            result.deleted_edges.push(e);
            mark_to_delete(store, t);

            let cur = cursor.current();
            let node_a = list.insert_before(cur, a)?;
            list.insert_after(cur, b)?;
            list.remove(cur)?;
            cursor = DListCursor::new(node_a);
            stale_run = 0;
        } else {
            cursor.go_next(list);
            stale_run += 1;
        }
    }
    Ok(())
}

/// Builds the open chain of hull edges visible from an externally-located
/// point `q`, starting from the hull edge the locator crossed last.
fn visible_hull_chain(store: &MeshStore, q: Xy, start: EdgeId) -> TerraResult<GrowthResult> {
    let mut chain = vec![start];
    walk_hull(store, q, start, true, &mut chain)?;
    walk_hull(store, q, start, false, &mut chain)?;
    Ok(GrowthResult {
        deleted_triangles: Vec::new(),
        deleted_errors: Vec::new(),
        deleted_edges: Vec::new(),
        border: chain,
    })
}

fn walk_hull(
    store: &MeshStore,
    q: Xy,
    start: EdgeId,
    forward: bool,
    chain: &mut Vec<EdgeId>,
) -> TerraResult<()> {
    let max_steps = store.edge_ids().count() + 4;
    let mut current = start;
    for _ in 0..max_steps {
        let edge = store
            .edge(current)
            .ok_or_else(|| TerraError::InvariantViolation("hull walk hit stale edge".into()))?;
        let pivot = if forward { edge.ev[1] } else { edge.ev[0] };
        let next = store
            .get_ve(pivot)?
            .into_iter()
            .find(|&cand| cand != current && store.edge(cand).is_some_and(|e| e.is_hull_edge()))
            .ok_or_else(|| TerraError::InvariantViolation("hull walk could not find next hull edge".into()))?;
        let next_edge = store.edge(next).unwrap();
        let far = next_edge.other_endpoint(pivot).unwrap();
        let far_xy = store.vertex(far).unwrap().xy();
        let pivot_xy = store.vertex(pivot).unwrap().xy();
        let visible = if forward {
            kernel::turn(q, pivot_xy, far_xy, store.epsilon) != kernel::Turn::Left
        } else {
            kernel::turn(q, far_xy, pivot_xy, store.epsilon) != kernel::Turn::Left
        };
        if !visible {
            break;
        }
        if forward {
            chain.push(next);
        } else {
            chain.insert(0, next);
        }
        current = next;
    }
    Ok(())
}

/// Detaches everything the growth phase marked TO_DELETE, allocates the new
/// vertex, and fan-triangulates the border over it.
fn finish(
    store: &mut MeshStore,
    growth: GrowthResult,
    x: f64,
    y: f64,
    z: f64,
) -> TerraResult<(VertexId, RegionUpdate)> {
    let mut detached_points = Vec::new();
    for &t in &growth.deleted_triangles {
        store.detach_triangle(t, &mut detached_points);
    }
    for &e in &growth.deleted_edges {
        store.detach_edge(e);
    }

    let q = store.new_vertex(x, y, z);
    let mut q_edge: HashMap<VertexId, EdgeId> = HashMap::new();
    let mut created_triangles = Vec::new();
    for &e in &growth.border {
        let (p, r) = {
            let edge = store
                .edge(e)
                .ok_or_else(|| TerraError::InvariantViolation("border edge missing at fan time".into()))?;
            (edge.ev[0], edge.ev[1])
        };
        let eqp = *q_edge.entry(p).or_insert_with(|| store.new_edge(q, p));
        let eqr = *q_edge.entry(r).or_insert_with(|| store.new_edge(q, r));
        let t = store.new_triangle(e, eqr, eqp)?;
        created_triangles.push(t);
    }

    Ok((
        q,
        RegionUpdate {
            deleted_triangles: growth.deleted_triangles,
            deleted_errors: growth.deleted_errors,
            created_triangles,
            detached_points,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangle_square() -> (MeshStore, TriangleId) {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let b = store.new_vertex(2.0, 0.0, 0.0);
        let c = store.new_vertex(2.0, 2.0, 0.0);
        let d = store.new_vertex(0.0, 2.0, 0.0);
        let ab = store.new_edge(a, b);
        let bc = store.new_edge(b, c);
        let ca = store.new_edge(c, a);
        let t0 = store.new_triangle(ab, bc, ca).unwrap();
        let cd = store.new_edge(c, d);
        let da = store.new_edge(d, a);
        store.new_triangle(ca, cd, da).unwrap();
        (store, t0)
    }

    #[test]
    fn inserting_interior_point_replaces_one_triangle_with_three() {
        let (mut store, seed) = two_triangle_square();
        let before = store.triangle_count();
        let (v, update) = insert_point(&mut store, seed, 1.4, 0.3, 0.0).unwrap();
        assert_eq!(update.deleted_triangles.len(), 1);
        assert_eq!(update.created_triangles.len(), 3);
        assert_eq!(store.triangle_count(), before - 1 + 3);
        store.debug_check_invariants().unwrap();
        assert!(store.vertex(v).is_some());
    }

    #[test]
    fn inserting_duplicate_point_is_rejected() {
        let (mut store, seed) = two_triangle_square();
        let err = insert_point(&mut store, seed, 0.0, 0.0, 0.0).unwrap_err();
        assert_eq!(err, TerraError::DuplicatePoint { x: 0.0, y: 0.0 });
    }

    #[test]
    fn inserting_on_shared_diagonal_replaces_two_triangles_with_four() {
        let (mut store, seed) = two_triangle_square();
        let (_, update) = insert_point(&mut store, seed, 1.0, 1.0, 0.0).unwrap();
        assert_eq!(update.deleted_triangles.len(), 2);
        assert_eq!(update.created_triangles.len(), 4);
        store.debug_check_invariants().unwrap();
    }

    #[test]
    fn inserting_outside_hull_extends_it_without_deleting() {
        let (mut store, seed) = two_triangle_square();
        let (_, update) = insert_point(&mut store, seed, 3.0, 0.5, 0.0).unwrap();
        assert!(update.deleted_triangles.is_empty());
        assert!(!update.created_triangles.is_empty());
        store.debug_check_invariants().unwrap();
    }
}
