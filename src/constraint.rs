//! CDT constraint-edge engine.
//!
//! Adding a constraint `c = (v0, v1)` either marks an already-existing edge
//! CONSTRAINED, or walks the strip of triangles `c` properly crosses,
//! deletes it, and re-triangulates the two resulting polygons (left/right
//! of `c`) by ear-clipping, same as [`crate::influence::remove`] does for a
//! vertex removal's hole. Both operations end in
//! [`crate::influence::swap::optimize_swap_queue`] to restore global
//! Delaunay-ness.

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, SegmentIntersection, Turn, Xy};
use crate::influence::swap::optimize_swap_queue;
use crate::influence::{chain_to_ring, ear_clip, OkTriangleMode, RegionUpdate};
use crate::mesh::marks::Marks;
use crate::mesh::{EdgeId, MeshStore, TriangleId, VertexId};

/// Adds a constraint edge between `v0` and `v1`.
///
/// If an edge already connects them, it is marked CONSTRAINED in place
/// and both
/// endpoints' `n_inc_constr` are bumped; no mesh triangle changes hands.
/// If instead `v0` and `v1` are joined by a chain of existing edges
/// collinear with (and overlapping) the requested segment, every edge of
/// that chain is marked CONSTRAINED in place, same as the direct-edge case
/// generalized to more than one hop. Otherwise the crossed strip is found,
/// deleted, and the two resulting polygons are ear-triangulated.
///
/// # Errors
///
/// Returns [`TerraError::ConstraintRejected`] if `v0 == v1`, the segment
/// passes through a third vertex it isn't collinear-chained through, or no
/// properly-crossed triangle can be found starting from either endpoint's
/// fan (the segment does not lie inside the current triangulation).
/// Propagates mesh-traversal failures.
pub fn add_constraint(store: &mut MeshStore, v0: VertexId, v1: VertexId) -> TerraResult<RegionUpdate> {
    if v0 == v1 {
        return Err(TerraError::ConstraintRejected {
            reason: "zero-area constraint".into(),
        });
    }
    if let Some(e) = find_edge_between(store, v0, v1)? {
        store.edge_mut(e).unwrap().marks.set(Marks::CONSTRAINED);
        store.vertex_mut(v0).unwrap().n_inc_constr += 1;
        store.vertex_mut(v1).unwrap().n_inc_constr += 1;
        return Ok(RegionUpdate::new());
    }

    let p0 = vertex_xy(store, v0)?;
    let p1 = vertex_xy(store, v1)?;

    if let Some(chain) = find_collinear_chain(store, v0, v1, p0, p1)? {
        for e in chain {
            store.edge_mut(e).unwrap().marks.set(Marks::CONSTRAINED);
            let ev = store.edge(e).unwrap().ev;
            store.vertex_mut(ev[0]).unwrap().n_inc_constr += 1;
            store.vertex_mut(ev[1]).unwrap().n_inc_constr += 1;
        }
        return Ok(RegionUpdate::new());
    }

    let (t_start, entry0) = find_terminal_triangle(store, v0, p0, p1)?;
    let (t_end, entry1) = find_terminal_triangle(store, v1, p0, p1)?;

    let mut deleted_triangles = vec![t_start];
    let mut deleted_edges = Vec::new();
    let mut left_border = Vec::new();
    let mut right_border = Vec::new();

    mark_to_delete(store, t_start);
    terminal_border_edges(store, t_start, v0, entry0, p0, p1, &mut left_border, &mut right_border)?;

    let max_steps = store.triangle_count() + 4;
    let mut cur_tri = t_start;
    let mut cur_edge = entry0;
    let mut steps = 0usize;
    loop {
        steps += 1;
        if steps > max_steps {
            return Err(TerraError::InvariantViolation(
                "constraint strip walk did not terminate".into(),
            ));
        }
        deleted_edges.push(cur_edge);
        let next_tri = store.get_tt_across(cur_tri, cur_edge).ok_or_else(|| {
            TerraError::ConstraintRejected {
                reason: "constraint would cross the convex hull".into(),
            }
        })?;

        if next_tri == t_end {
            mark_to_delete(store, t_end);
            deleted_triangles.push(t_end);
            terminal_border_edges(store, t_end, v1, entry1, p0, p1, &mut left_border, &mut right_border)?;
            break;
        }

        mark_to_delete(store, next_tri);
        deleted_triangles.push(next_tri);

        let edge = store.edge(cur_edge).unwrap();
        let (ve0, ve1) = (edge.ev[0], edge.ev[1]);
        let (a, b, c) = store.get_tv(next_tri)?;
        let apex = [a, b, c]
            .into_iter()
            .find(|v| *v != ve0 && *v != ve1)
            .ok_or_else(|| TerraError::InvariantViolation("strip triangle does not bound cur_edge".into()))?;

        let s_e0 = side(store, p0, p1, ve0)?;
        let s_e1 = side(store, p0, p1, ve1)?;
        let s_apex = side(store, p0, p1, apex)?;
        let minority = if s_apex == s_e0 { ve1 } else { ve0 };
        let majority = if minority == ve0 { ve1 } else { ve0 };
        let majority_side = if minority == ve0 { s_e1 } else { s_e0 };

        let tri = store.triangle(next_tri).unwrap();
        let border_edge = edge_between(store, &tri.te, apex, majority)?;
        match majority_side {
            Turn::Left => left_border.push(border_edge),
            Turn::Right => right_border.push(border_edge),
            Turn::Aligned => unreachable!("majority_side is always Left or Right"),
        }

        cur_edge = edge_between(store, &tri.te, apex, minority)?;
        cur_tri = next_tri;
    }

    let mut detached_points = Vec::new();
    for &t in &deleted_triangles {
        store.detach_triangle(t, &mut detached_points);
    }
    for &e in &deleted_edges {
        store.detach_edge(e);
    }

    let closing = store.new_edge(v1, v0);
    left_border.push(closing);
    right_border.push(closing);

    let mut update = RegionUpdate {
        deleted_triangles,
        deleted_errors: Vec::new(),
        created_triangles: Vec::new(),
        detached_points,
    };

    for border in [left_border, right_border] {
        let ring = chain_to_ring(store, &border)?;
        let (created, mut swap_queue) = ear_clip(store, ring, OkTriangleMode::Refinement)?;
        update.created_triangles.extend(created);
        optimize_swap_queue(store, &mut swap_queue, &mut update)?;
    }

    store.edge_mut(closing).unwrap().marks.set(Marks::CONSTRAINED);
    store.vertex_mut(v0).unwrap().n_inc_constr += 1;
    store.vertex_mut(v1).unwrap().n_inc_constr += 1;

    Ok(update)
}

/// Whether `v` may be removed given the current extended-optimization
/// policy: unconstrained vertices are always removable;
/// `n_inc_constr == 1` needs `allow_features_del`; `n_inc_constr == 2`
/// needs `allow_chain_brk`; three or more is never removable by this
/// engine.
#[must_use]
pub fn can_remove_vertex(store: &MeshStore, v: VertexId, allow_features_del: bool, allow_chain_brk: bool) -> bool {
    let Some(vertex) = store.vertex(v) else { return false };
    match vertex.n_inc_constr {
        0 => true,
        1 => allow_features_del,
        2 => allow_chain_brk,
        _ => false,
    }
}

fn vertex_xy(store: &MeshStore, v: VertexId) -> TerraResult<Xy> {
    Ok(store
        .vertex(v)
        .ok_or_else(|| TerraError::InvariantViolation("constraint endpoint is stale".into()))?
        .xy())
}

fn mark_to_delete(store: &mut MeshStore, t: TriangleId) {
    store.triangle_mut(t).unwrap().marks.set(Marks::TO_DELETE);
}

fn side(store: &MeshStore, p0: Xy, p1: Xy, v: VertexId) -> TerraResult<Turn> {
    let p = vertex_xy(store, v)?;
    let t = kernel::turn(p0, p1, p, store.epsilon);
    if t == Turn::Aligned {
        return Err(TerraError::ConstraintRejected {
            reason: "constraint passes through an existing vertex".into(),
        });
    }
    Ok(t)
}

/// Finds the edge directly connecting `v0` and `v1`, if one already exists.
fn find_edge_between(store: &MeshStore, v0: VertexId, v1: VertexId) -> TerraResult<Option<EdgeId>> {
    Ok(store.get_ve(v0)?.into_iter().find(|&e| store.edge(e).unwrap().other_endpoint(v0) == Some(v1)))
}

/// Finds the triangle in `v`'s fan whose edge opposite `v` is properly
/// crossed by segment `(p0, p1)`, and that opposite edge.
fn find_terminal_triangle(store: &MeshStore, v: VertexId, p0: Xy, p1: Xy) -> TerraResult<(TriangleId, EdgeId)> {
    for t in store.get_vt(v)? {
        let tri = store.triangle(t).unwrap();
        let opp = tri
            .te
            .iter()
            .copied()
            .find(|&e| !store.edge(e).unwrap().ev.contains(&v))
            .ok_or_else(|| TerraError::InvariantViolation("triangle incident on v has no opposite edge".into()))?;
        let oe = store.edge(opp).unwrap();
        let (pa, pb) = (vertex_xy(store, oe.ev[0])?, vertex_xy(store, oe.ev[1])?);
        if kernel::segments_intersect(p0, p1, pa, pb, store.epsilon) == SegmentIntersection::ProperInter {
            return Ok((t, opp));
        }
    }
    Err(TerraError::ConstraintRejected {
        reason: "no triangle in the endpoint's fan is properly crossed by the constraint".into(),
    })
}

/// Finds a path of existing edges from `v0` to `v1`, each collinear with
/// and overlapping segment `(p0, p1)` and each strictly advancing toward
/// `p1`, if one connects the two endpoints. Lets a constraint that runs
/// along (rather than across) a run of already-triangulated edges mark
/// them CONSTRAINED in place instead of falling through to the
/// crossed-strip walk, which only handles a segment interior to the
/// triangulation's triangles, not one lying along their edges.
fn find_collinear_chain(store: &MeshStore, v0: VertexId, v1: VertexId, p0: Xy, p1: Xy) -> TerraResult<Option<Vec<EdgeId>>> {
    let dir = (p1.x - p0.x, p1.y - p0.y);
    let max_steps = store.vertex_ids().count() + 4;
    let mut chain = Vec::new();
    let mut cur = v0;
    for _ in 0..max_steps {
        if cur == v1 {
            return Ok(Some(chain));
        }
        let cur_xy = vertex_xy(store, cur)?;
        let mut step = None;
        for e in store.get_ve(cur)? {
            let Some(other) = store.edge(e).unwrap().other_endpoint(cur) else {
                continue;
            };
            let other_xy = vertex_xy(store, other)?;
            let progresses = dir.0 * (other_xy.x - cur_xy.x) + dir.1 * (other_xy.y - cur_xy.y) > store.epsilon;
            if !progresses {
                continue;
            }
            let class = kernel::segments_intersect(p0, p1, cur_xy, other_xy, store.epsilon);
            if matches!(
                class,
                SegmentIntersection::UponNoCv | SegmentIntersection::UponAnd1Cv | SegmentIntersection::UponAnd2Cv
            ) {
                step = Some((e, other));
                break;
            }
        }
        match step {
            Some((e, other)) => {
                chain.push(e);
                cur = other;
            }
            None => return Ok(None),
        }
    }
    Ok(None)
}

/// Assigns the two edges of terminal triangle `t` incident on `anchor`
/// (every edge but `opposite`) to the left/right border depending on which
/// side of `(p0, p1)` their far endpoint lies.
fn terminal_border_edges(
    store: &MeshStore,
    t: TriangleId,
    anchor: VertexId,
    opposite: EdgeId,
    p0: Xy,
    p1: Xy,
    left_border: &mut Vec<EdgeId>,
    right_border: &mut Vec<EdgeId>,
) -> TerraResult<()> {
    let tri = store.triangle(t).unwrap();
    for &e in &tri.te {
        if e == opposite {
            continue;
        }
        let far = store.edge(e).unwrap().other_endpoint(anchor).ok_or_else(|| {
            TerraError::InvariantViolation("terminal triangle edge is not incident on anchor".into())
        })?;
        match side(store, p0, p1, far)? {
            Turn::Left => left_border.push(e),
            Turn::Right => right_border.push(e),
            Turn::Aligned => unreachable!("side() never returns Aligned"),
        }
    }
    Ok(())
}

fn edge_between(store: &MeshStore, candidates: &[EdgeId; 3], a: VertexId, b: VertexId) -> TerraResult<EdgeId> {
    candidates
        .iter()
        .copied()
        .find(|&e| {
            let ev = store.edge(e).unwrap().ev;
            (ev[0] == a && ev[1] == b) || (ev[0] == b && ev[1] == a)
        })
        .ok_or_else(|| TerraError::InvariantViolation("triangle has no edge between the given vertices".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unit square split by the B-D diagonal: triangles ABD and BCD.
    /// Adding constraint A-C crosses BD directly (a one-triangle-deep
    /// strip on each side).
    fn square_split_by_bd() -> (MeshStore, VertexId, VertexId) {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let b = store.new_vertex(1.0, 0.0, 0.0);
        let c = store.new_vertex(1.0, 1.0, 0.0);
        let d = store.new_vertex(0.0, 1.0, 0.0);
        let ab = store.new_edge(a, b);
        let bd = store.new_edge(b, d);
        let da = store.new_edge(d, a);
        store.new_triangle(ab, bd, da).unwrap();
        let bc = store.new_edge(b, c);
        let cd = store.new_edge(c, d);
        store.new_triangle(bc, cd, bd).unwrap();
        (store, a, c)
    }

    #[test]
    fn adding_constraint_across_existing_diagonal_swaps_it() {
        let (mut store, a, c) = square_split_by_bd();
        let update = add_constraint(&mut store, a, c).unwrap();
        assert_eq!(update.deleted_triangles.len(), 2);
        assert_eq!(update.created_triangles.len(), 2);
        store.debug_check_invariants().unwrap();
        let ac = find_edge_between(&store, a, c).unwrap().unwrap();
        assert!(store.edge(ac).unwrap().marks.has(Marks::CONSTRAINED));
        assert_eq!(store.vertex(a).unwrap().n_inc_constr, 1);
        assert_eq!(store.vertex(c).unwrap().n_inc_constr, 1);
    }

    #[test]
    fn adding_constraint_on_existing_edge_marks_it_without_retriangulating() {
        let (mut store, a, c) = square_split_by_bd();
        let b = store
            .vertex_ids()
            .find(|&v| store.vertex(v).unwrap().xy() == Xy::new(1.0, 0.0))
            .unwrap();
        let before = store.triangle_count();
        let update = add_constraint(&mut store, a, b).unwrap();
        assert!(update.deleted_triangles.is_empty());
        assert_eq!(store.triangle_count(), before);
        let ab = find_edge_between(&store, a, b).unwrap().unwrap();
        assert!(store.edge(ab).unwrap().marks.has(Marks::CONSTRAINED));
        let _ = c;
    }

    /// Two triangles sharing a ridge, with `a`, `mid`, `far` collinear along
    /// the base: a constraint from `a` to `far` runs along the two existing
    /// base edges rather than crossing any triangle interior.
    fn ridge_with_collinear_base() -> (MeshStore, VertexId, VertexId, VertexId) {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let mid = store.new_vertex(1.0, 0.0, 0.0);
        let far = store.new_vertex(2.0, 0.0, 0.0);
        let top = store.new_vertex(1.0, 1.0, 0.0);
        let a_mid = store.new_edge(a, mid);
        let mid_top = store.new_edge(mid, top);
        let top_a = store.new_edge(top, a);
        let mid_far = store.new_edge(mid, far);
        let far_top = store.new_edge(far, top);
        store.new_triangle(a_mid, mid_top, top_a).unwrap();
        store.new_triangle(mid_far, far_top, mid_top).unwrap();
        (store, a, mid, far)
    }

    #[test]
    fn adding_constraint_along_collinear_chain_marks_both_edges() {
        let (mut store, a, mid, far) = ridge_with_collinear_base();
        let before = store.triangle_count();
        let update = add_constraint(&mut store, a, far).unwrap();
        assert!(update.deleted_triangles.is_empty());
        assert_eq!(store.triangle_count(), before);
        let a_mid = find_edge_between(&store, a, mid).unwrap().unwrap();
        let mid_far = find_edge_between(&store, mid, far).unwrap().unwrap();
        assert!(store.edge(a_mid).unwrap().marks.has(Marks::CONSTRAINED));
        assert!(store.edge(mid_far).unwrap().marks.has(Marks::CONSTRAINED));
        assert_eq!(store.vertex(a).unwrap().n_inc_constr, 1);
        assert_eq!(store.vertex(mid).unwrap().n_inc_constr, 2);
        assert_eq!(store.vertex(far).unwrap().n_inc_constr, 1);
        store.debug_check_invariants().unwrap();
    }

    #[test]
    fn zero_area_constraint_is_rejected() {
        let (mut store, a, _c) = square_split_by_bd();
        let err = add_constraint(&mut store, a, a).unwrap_err();
        assert!(matches!(err, TerraError::ConstraintRejected { .. }));
    }

    #[test]
    fn can_remove_vertex_respects_chain_and_feature_flags() {
        let (store, a, _c) = square_split_by_bd();
        assert!(can_remove_vertex(&store, a, false, false));
    }
}
