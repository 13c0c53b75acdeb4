//! Vertex removal by the ears algorithm.

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::influence::swap::optimize_swap_queue;
use crate::influence::{chain_to_ring, ear_clip, RegionUpdate};
use crate::mesh::edge::Edge;
use crate::mesh::marks::Marks;
use crate::mesh::{MeshStore, VertexId};

/// Which emptiness test `ok_triangle` applies to a candidate ear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OkTriangleMode {
    /// Refinement removal: reject the ear if another boundary vertex lies
    /// strictly inside it.
    Refinement,
    /// Error-driven decimation: reject the ear if another boundary vertex
    /// lies in its circumcircle, enforcing Delaunay-ness during the fan
    /// itself.
    Decimation,
}

/// Removes `v`, re-triangulating the hole with the ears algorithm and then
/// restoring Delaunay-ness with the swap-edge queue.
///
/// `v` incident on two CONSTRAINED edges first tries to synthesize the
/// replacement constraint between their far endpoints (demoting the problem
/// to at most one incident constraint, per [`crate::constraint`]'s
/// extended-optimization rule) before the vertex itself is removed. If no
/// such replacement is admissible, the removal proceeds only when
/// `allow_chain_brk` is set, breaking the constraint chain in two; a vertex
/// incident on exactly one constraint is removed normally, shortening the
/// feature it belonged to.
///
/// # Errors
///
/// Returns [`TerraError::InvariantViolation`] if `v` is not removable (not
/// interior, and not a hull vertex whose two hull-incident edges are
/// collinear), propagates a mesh-traversal failure, or (when `v` carries two
/// constraints and neither a replacement constraint nor `allow_chain_brk` is
/// available) returns the [`TerraError::ConstraintRejected`] that the failed
/// replacement attempt produced.
pub fn remove_vertex(
    store: &mut MeshStore,
    v: VertexId,
    mode: OkTriangleMode,
    allow_chain_brk: bool,
) -> TerraResult<RegionUpdate> {
    let n_inc_constr = store
        .vertex(v)
        .ok_or_else(|| TerraError::InvariantViolation("remove_vertex: stale vertex".into()))?
        .n_inc_constr;

    let mut update = RegionUpdate::new();
    if n_inc_constr == 2 {
        let (other0, other1) = constrained_neighbors(store, v)?;
        match crate::constraint::add_constraint(store, other0, other1) {
            Ok(synth) => update.extend(synth),
            Err(_) if allow_chain_brk => {}
            Err(e) => return Err(e),
        }
    }

    update.extend(remove_vertex_unconstrained(store, v, mode)?);
    Ok(update)
}

/// The far endpoints of `v`'s two CONSTRAINED incident edges.
fn constrained_neighbors(store: &MeshStore, v: VertexId) -> TerraResult<(VertexId, VertexId)> {
    let mut far_ends = store
        .get_ve(v)?
        .into_iter()
        .filter(|&e| store.edge(e).unwrap().marks.has(Marks::CONSTRAINED))
        .map(|e| store.edge(e).unwrap().other_endpoint(v).unwrap());
    let a = far_ends.next().ok_or_else(|| {
        TerraError::InvariantViolation("constrained_neighbors: expected two constrained spokes".into())
    })?;
    let b = far_ends.next().ok_or_else(|| {
        TerraError::InvariantViolation("constrained_neighbors: expected two constrained spokes".into())
    })?;
    Ok((a, b))
}

fn remove_vertex_unconstrained(store: &mut MeshStore, v: VertexId, mode: OkTriangleMode) -> TerraResult<RegionUpdate> {
    let tris = store.get_vt(v)?;
    let deleted_errors: Vec<f64> = tris
        .iter()
        .map(|&t| store.triangle(t).unwrap().own_error())
        .collect();

    let mut border = Vec::with_capacity(tris.len() + 1);
    for &t in &tris {
        let (v0, v1, v2) = store.get_tv(t)?;
        let verts = [v0, v1, v2];
        let idx_v = verts.iter().position(|&x| x == v).ok_or_else(|| {
            TerraError::InvariantViolation("get_vt returned a triangle not incident on v".into())
        })?;
        border.push(store.triangle(t).unwrap().te[(idx_v + 1) % 3]);
    }

    let spokes = store.get_ve(v)?;

    let vertex = store
        .vertex(v)
        .ok_or_else(|| TerraError::InvariantViolation("remove_vertex: stale vertex".into()))?;
    let on_hull = vertex
        .ve
        .iter()
        .all(|slot| slot.is_some_and(|e| store.edge(e).is_some_and(Edge::is_hull_edge)));

    if on_hull {
        let e0 = *spokes.first().unwrap();
        let e1 = *spokes.last().unwrap();
        let other0 = store.edge(e0).unwrap().other_endpoint(v).unwrap();
        let other1 = store.edge(e1).unwrap().other_endpoint(v).unwrap();
        let p0 = store.vertex(other0).unwrap().xy();
        let p1 = store.vertex(other1).unwrap().xy();
        let pv = store.vertex(v).unwrap().xy();
        if kernel::turn(p0, pv, p1, store.epsilon) != Turn::Aligned {
            return Err(TerraError::InvariantViolation(
                "vertex is not removable: hull-incident edges are not collinear".into(),
            ));
        }
        let bridge = store.new_edge(other1, other0);
        border.push(bridge);
    }

    for &t in &tris {
        store.triangle_mut(t).unwrap().marks.set(Marks::TO_DELETE);
    }

    let nodes_data = chain_to_ring(store, &border)?;

    let mut detached_points = Vec::new();
    for &t in &tris {
        store.detach_triangle(t, &mut detached_points);
    }
    for &e in &spokes {
        store.detach_edge(e);
    }

    let (created_triangles, mut swap_queue) = ear_clip(store, nodes_data, mode)?;

    let mut update = RegionUpdate {
        deleted_triangles: tris,
        deleted_errors,
        created_triangles,
        detached_points,
    };
    optimize_swap_queue(store, &mut swap_queue, &mut update)?;
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Diamond {
        store: MeshStore,
        center: VertexId,
        p0: VertexId,
        p1: VertexId,
        p2: VertexId,
        spoke0: crate::mesh::EdgeId,
        spoke1: crate::mesh::EdgeId,
        spoke2: crate::mesh::EdgeId,
    }

    fn fan_of_four() -> Diamond {
        // A central vertex with four triangles around it, interior.
        let mut store = MeshStore::new();
        let center = store.new_vertex(0.0, 0.0, 0.0);
        let p0 = store.new_vertex(1.0, 0.0, 0.0);
        let p1 = store.new_vertex(0.0, 1.0, 0.0);
        let p2 = store.new_vertex(-1.0, 0.0, 0.0);
        let p3 = store.new_vertex(0.0, -1.0, 0.0);

        let spoke0 = store.new_edge(center, p0);
        let spoke1 = store.new_edge(center, p1);
        let spoke2 = store.new_edge(center, p2);
        let spoke3 = store.new_edge(center, p3);
        let rim01 = store.new_edge(p0, p1);
        let rim12 = store.new_edge(p1, p2);
        let rim23 = store.new_edge(p2, p3);
        let rim30 = store.new_edge(p3, p0);

        store.new_triangle(spoke0, rim01, spoke1).unwrap();
        store.new_triangle(spoke1, rim12, spoke2).unwrap();
        store.new_triangle(spoke2, rim23, spoke3).unwrap();
        store.new_triangle(spoke3, rim30, spoke0).unwrap();
        Diamond { store, center, p0, p1, p2, spoke0, spoke1, spoke2 }
    }

    fn mark_constrained(store: &mut MeshStore, e: crate::mesh::EdgeId, v0: VertexId, v1: VertexId) {
        store.edge_mut(e).unwrap().marks.set(Marks::CONSTRAINED);
        store.vertex_mut(v0).unwrap().n_inc_constr += 1;
        store.vertex_mut(v1).unwrap().n_inc_constr += 1;
    }

    #[test]
    fn removing_interior_vertex_replaces_fan_with_two_triangles() {
        let mut d = fan_of_four();
        let update = remove_vertex(&mut d.store, d.center, OkTriangleMode::Refinement, false).unwrap();
        assert_eq!(update.deleted_triangles.len(), 4);
        assert!(d.store.triangle_count() >= 2);
        d.store.debug_check_invariants().unwrap();
        assert!(d.store.get_ve(d.center).is_err() || d.store.vertex(d.center).unwrap().ve == [None, None]);
    }

    #[test]
    fn removing_vertex_with_two_constraints_synthesizes_replacement() {
        let mut d = fan_of_four();
        // center carries two constrained spokes to p0 and p1, which already
        // share the edge p0-p1: the replacement constraint is admissible
        // without any re-triangulation beyond center's own hole.
        mark_constrained(&mut d.store, d.spoke0, d.center, d.p0);
        mark_constrained(&mut d.store, d.spoke1, d.center, d.p1);

        remove_vertex(&mut d.store, d.center, OkTriangleMode::Refinement, false).unwrap();
        d.store.debug_check_invariants().unwrap();

        let p0_p1 = d
            .store
            .get_ve(d.p0)
            .unwrap()
            .into_iter()
            .find(|&e| d.store.edge(e).unwrap().other_endpoint(d.p0) == Some(d.p1))
            .expect("p0-p1 edge survives");
        assert!(d.store.edge(p0_p1).unwrap().marks.has(Marks::CONSTRAINED));
        assert_eq!(d.store.vertex(d.p0).unwrap().n_inc_constr, 1);
        assert_eq!(d.store.vertex(d.p1).unwrap().n_inc_constr, 1);
    }

    #[test]
    fn removing_vertex_with_inadmissible_replacement_requires_chain_brk() {
        let mut d = fan_of_four();
        // center's two constrained spokes go to p0 and p2, which are
        // collinear through center: no replacement constraint is admissible.
        mark_constrained(&mut d.store, d.spoke0, d.center, d.p0);
        mark_constrained(&mut d.store, d.spoke2, d.center, d.p2);

        let mut rejected_store = d.store.clone();
        let err = remove_vertex(&mut rejected_store, d.center, OkTriangleMode::Refinement, false).unwrap_err();
        assert!(matches!(err, TerraError::ConstraintRejected { .. }));

        remove_vertex(&mut d.store, d.center, OkTriangleMode::Refinement, true).unwrap();
        d.store.debug_check_invariants().unwrap();
        assert_eq!(d.store.vertex(d.p0).unwrap().n_inc_constr, 0);
        assert_eq!(d.store.vertex(d.p2).unwrap().n_inc_constr, 0);
    }
}
