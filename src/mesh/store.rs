//! The mesh store: three arenas (vertices, edges, triangles) plus the
//! attach/detach protocol that keeps `VE`/`ET`/`TE` cross-references
//! consistent.

use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::mesh::edge::Edge;
use crate::mesh::ids::{EdgeId, TriangleId, VertexId};
use crate::mesh::marks::Marks;
use crate::mesh::triangle::Triangle;
use crate::mesh::vertex::Vertex;

/// Default capacity of the edge/triangle free lists.
pub const DEFAULT_FREE_LIST_CAPACITY: usize = 255;

/// Owns every vertex, edge and triangle of one triangulation.
#[derive(Debug, Clone)]
pub struct MeshStore {
    vertices: Vec<Option<Vertex>>,
    edges: Vec<Option<Edge>>,
    triangles: Vec<Option<Triangle>>,
    free_edges: Vec<EdgeId>,
    free_triangles: Vec<TriangleId>,
    free_list_capacity: usize,
    next_vid: u32,
    /// Most recently created triangle; used by the locator as a seed.
    pub first_triangle: Option<TriangleId>,
    /// Tolerance used by every geometric predicate issued through this
    /// store.
    pub epsilon: f64,
}

impl MeshStore {
    /// Creates an empty store with the default tolerance and free-list
    /// capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_free_list_capacity(DEFAULT_FREE_LIST_CAPACITY)
    }

    /// Creates an empty store with an explicit free-list capacity, useful
    /// for tuning allocator churn on meshes of a known rough size.
    #[must_use]
    pub fn with_free_list_capacity(free_list_capacity: usize) -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            triangles: Vec::new(),
            free_edges: Vec::new(),
            free_triangles: Vec::new(),
            free_list_capacity,
            next_vid: 0,
            first_triangle: None,
            epsilon: kernel::DEFAULT_EPSILON,
        }
    }

    // ---- accessors -----------------------------------------------------

    /// Borrows a vertex, or `None` if `v` is stale.
    #[must_use]
    pub fn vertex(&self, v: VertexId) -> Option<&Vertex> {
        self.vertices.get(v.index())?.as_ref()
    }

    /// Mutably borrows a vertex, or `None` if `v` is stale.
    pub fn vertex_mut(&mut self, v: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(v.index())?.as_mut()
    }

    /// Borrows an edge, or `None` if `e` is stale.
    #[must_use]
    pub fn edge(&self, e: EdgeId) -> Option<&Edge> {
        self.edges.get(e.index())?.as_ref()
    }

    /// Mutably borrows an edge, or `None` if `e` is stale.
    pub fn edge_mut(&mut self, e: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(e.index())?.as_mut()
    }

    /// Borrows a triangle, or `None` if `t` is stale.
    #[must_use]
    pub fn triangle(&self, t: TriangleId) -> Option<&Triangle> {
        self.triangles.get(t.index())?.as_ref()
    }

    /// Mutably borrows a triangle, or `None` if `t` is stale.
    pub fn triangle_mut(&mut self, t: TriangleId) -> Option<&mut Triangle> {
        self.triangles.get_mut(t.index())?.as_mut()
    }

    /// Iterates over every live vertex id.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|_| VertexId(i as u32)))
    }

    /// Iterates over every live triangle id.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|_| TriangleId(i as u32)))
    }

    /// Iterates over every live edge id.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| EdgeId(i as u32)))
    }

    /// Number of live vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_some()).count()
    }

    /// Number of live triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.iter().filter(|t| t.is_some()).count()
    }

    // ---- allocation ------------------------------------------------

    /// Allocates a new vertex at `(x, y, z)`. Vertex ids are never recycled
    ///.
    pub fn new_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexId {
        let vid = VertexId(self.next_vid);
        self.next_vid += 1;
        self.vertices.push(Some(Vertex::new(vid, x, y, z)));
        vid
    }

    /// Allocates (or recycles) an edge between `v0` and `v1`.
    pub fn new_edge(&mut self, v0: VertexId, v1: VertexId) -> EdgeId {
        if let Some(eid) = self.free_edges.pop() {
            let slot = &mut self.edges[eid.index()];
            let mut edge = Edge::new(eid, v0, v1);
            edge.reset(eid, v0, v1);
            *slot = Some(edge);
            eid
        } else {
            let eid = EdgeId(self.edges.len() as u32);
            self.edges.push(Some(Edge::new(eid, v0, v1)));
            eid
        }
    }

    /// Allocates (or recycles) a triangle spanning the three given edges.
    ///
    /// Internally derives the CCW vertex order via [`Self::order_triangle`]
    /// (re-orienting the edge array if the raw chain was CW), computes and
    /// caches the circumcircle, and performs the attach step linking `TE`, `ET`, and seeding `VE` where empty.
    ///
    /// # Errors
    ///
    /// Returns [`TerraError::InvariantViolation`] if the three edges do not
    /// form a consistent, non-degenerate triangle.
    pub fn new_triangle(
        &mut self,
        e0: EdgeId,
        e1: EdgeId,
        e2: EdgeId,
    ) -> TerraResult<TriangleId> {
        let (te, _verts) = self.order_triangle(e0, e1, e2)?;
        let (v0, v1, v2) = self.get_tv_from_te(&te)?;
        let p0 = self.vertex(v0).unwrap().xy();
        let p1 = self.vertex(v1).unwrap().xy();
        let p2 = self.vertex(v2).unwrap().xy();
        let (center, radius) = kernel::circumcircle(p0, p1, p2, self.epsilon).ok_or_else(|| {
            TerraError::InvariantViolation("degenerate triangle: collinear vertices".into())
        })?;

        let tid = if let Some(tid) = self.free_triangles.pop() {
            self.triangles[tid.index()] = Some(Triangle::new(tid, te, center, radius));
            tid
        } else {
            let tid = TriangleId(self.triangles.len() as u32);
            self.triangles.push(Some(Triangle::new(tid, te, center, radius)));
            tid
        };

        self.attach_triangle(tid)?;
        self.first_triangle = Some(tid);
        Ok(tid)
    }

    /// Determines the CCW edge order and vertex order for three edges that
    /// are claimed to bound one triangle.
    fn order_triangle(
        &self,
        e0: EdgeId,
        e1: EdgeId,
        e2: EdgeId,
    ) -> TerraResult<([EdgeId; 3], [VertexId; 3])> {
        let edges = [
            self.edge(e0)
                .ok_or_else(|| TerraError::InvariantViolation("stale edge in new_triangle".into()))?,
            self.edge(e1)
                .ok_or_else(|| TerraError::InvariantViolation("stale edge in new_triangle".into()))?,
            self.edge(e2)
                .ok_or_else(|| TerraError::InvariantViolation("stale edge in new_triangle".into()))?,
        ];
        let ids = [e0, e1, e2];

        // Walk the chain starting at an arbitrary endpoint of e0.
        let v0 = edges[0].ev[0];
        let idx_first = 0usize;
        let v1 = edges[idx_first].other_endpoint(v0).unwrap();
        let idx_second = (0..3)
            .find(|&i| i != idx_first && edges[i].ev.contains(&v1))
            .ok_or_else(|| TerraError::InvariantViolation("edges do not close a triangle".into()))?;
        let v2 = edges[idx_second].other_endpoint(v1).unwrap();
        let idx_third = (0..3)
            .find(|&i| i != idx_first && i != idx_second)
            .unwrap();
        // Sanity: the third edge must connect v2 back to v0.
        if !edges[idx_third].ev.contains(&v2) || !edges[idx_third].ev.contains(&v0) {
            return Err(TerraError::InvariantViolation(
                "edges do not close a triangle".into(),
            ));
        }

        let p0 = self.vertex(v0).unwrap().xy();
        let p1 = self.vertex(v1).unwrap().xy();
        let p2 = self.vertex(v2).unwrap().xy();
        let (verts, te) = if kernel::turn(p0, p1, p2, self.epsilon) == Turn::Right {
            // Reverse to CCW: (v0, v2, v1).
            (
                [v0, v2, v1],
                [ids[idx_third], ids[idx_second], ids[idx_first]],
            )
        } else {
            ([v0, v1, v2], [ids[idx_first], ids[idx_second], ids[idx_third]])
        };
        Ok((te, verts))
    }

    /// Derives `(v0, v1, v2)` for a triangle, in CCW order, from its `te`
    /// array directly (used internally before the `Triangle` record
    /// exists, and by [`Self::get_tv`]).
    fn get_tv_from_te(&self, te: &[EdgeId; 3]) -> TerraResult<(VertexId, VertexId, VertexId)> {
        let e0 = self
            .edge(te[0])
            .ok_or_else(|| TerraError::InvariantViolation("stale TE slot".into()))?;
        let e1 = self
            .edge(te[1])
            .ok_or_else(|| TerraError::InvariantViolation("stale TE slot".into()))?;
        // te[0] connects V0->V1, te[1] connects V1->V2.
        let v0 = e0.ev[0];
        let v1 = e0.ev[1];
        let v2 = e1
            .other_endpoint(v1)
            .ok_or_else(|| TerraError::InvariantViolation("TE chain broken".into()))?;
        Ok((v0, v1, v2))
    }

    /// Returns the three vertices of `t` in CCW order.
    ///
    /// # Errors
    /// Returns [`TerraError::InvariantViolation`] if `t` is stale.
    pub fn get_tv(&self, t: TriangleId) -> TerraResult<(VertexId, VertexId, VertexId)> {
        let tri = self
            .triangle(t)
            .ok_or_else(|| TerraError::InvariantViolation("stale triangle in get_tv".into()))?;
        self.get_tv_from_te(&tri.te)
    }

    /// Returns the (up to three) neighbouring triangles of `t`, `None`
    /// across hull edges.
    ///
    /// # Errors
    /// Returns [`TerraError::InvariantViolation`] if `t` is stale.
    pub fn get_tt(&self, t: TriangleId) -> TerraResult<[Option<TriangleId>; 3]> {
        let tri = self
            .triangle(t)
            .ok_or_else(|| TerraError::InvariantViolation("stale triangle in get_tt".into()))?;
        let mut out = [None; 3];
        for (i, &e) in tri.te.iter().enumerate() {
            let edge = self
                .edge(e)
                .ok_or_else(|| TerraError::InvariantViolation("stale TE slot".into()))?;
            out[i] = edge.other_triangle(t);
        }
        Ok(out)
    }

    /// Returns the triangle neighbouring `t` across `e`, if any.
    #[must_use]
    pub fn get_tt_across(&self, t: TriangleId, e: EdgeId) -> Option<TriangleId> {
        self.edge(e)?.other_triangle(t)
    }

    /// Returns every edge incident on `v`, in CCW order around `v`, by
    /// walking from `v.ve[0]` through successive triangle fans.
    ///
    /// # Errors
    /// Returns [`TerraError::InvariantViolation`] if `v` is stale, isolated,
    /// or the walk cannot close (broken topology).
    pub fn get_ve(&self, v: VertexId) -> TerraResult<Vec<EdgeId>> {
        let vertex = self
            .vertex(v)
            .ok_or_else(|| TerraError::InvariantViolation("stale vertex in get_ve".into()))?;
        let start = vertex.ve[0].ok_or_else(|| {
            TerraError::InvariantViolation("isolated vertex has no incident edge".into())
        })?;
        let start_edge = self
            .edge(start)
            .ok_or_else(|| TerraError::InvariantViolation("stale VE slot".into()))?;

        let mut forward = vec![start];
        let closed = self.walk_ve(v, start, start_edge.et[0], &mut forward)?;
        if closed {
            return Ok(forward);
        }
        // Hit the hull walking through `et[0]`; walk the other side and
        // prepend it so the result reads as one CCW chain around `v`.
        let mut backward = Vec::new();
        self.walk_ve(v, start, start_edge.et[1], &mut backward)?;
        backward.reverse();
        backward.extend(forward);
        Ok(backward)
    }

    /// Walks the triangle fan around `v` starting from `start_edge`'s side
    /// facing `tri`, appending each newly visited edge to `acc`. Returns
    /// `Ok(true)` if the walk closed back onto `start_edge` (interior
    /// vertex), `Ok(false)` if it ran off the hull.
    fn walk_ve(
        &self,
        v: VertexId,
        start_edge: EdgeId,
        mut tri: Option<TriangleId>,
        acc: &mut Vec<EdgeId>,
    ) -> TerraResult<bool> {
        let mut current = start_edge;
        loop {
            let Some(t) = tri else {
                return Ok(false);
            };
            let triangle = self
                .triangle(t)
                .ok_or_else(|| TerraError::InvariantViolation("stale triangle while walking VE".into()))?;
            let next = triangle
                .te
                .iter()
                .copied()
                .find(|&e| e != current && self.edge(e).is_some_and(|ed| ed.ev.contains(&v)))
                .ok_or_else(|| {
                    TerraError::InvariantViolation("vertex fan does not close".into())
                })?;
            if next == start_edge {
                return Ok(true);
            }
            acc.push(next);
            tri = self.edge(next).unwrap().other_triangle(t);
            current = next;
            if acc.len() > self.triangle_count() + 4 {
                return Err(TerraError::InvariantViolation(
                    "VE walk did not terminate".into(),
                ));
            }
        }
    }

    /// Returns every triangle incident on `v`, in CCW order, by pairing up
    /// consecutive edges from [`Self::get_ve`].
    ///
    /// # Errors
    /// Propagates [`Self::get_ve`]'s errors, or
    /// [`TerraError::InvariantViolation`] if two consecutive incident edges
    /// share no triangle.
    pub fn get_vt(&self, v: VertexId) -> TerraResult<Vec<TriangleId>> {
        let edges = self.get_ve(v)?;
        let n = edges.len();
        let vertex = self
            .vertex(v)
            .ok_or_else(|| TerraError::InvariantViolation("stale vertex in get_vt".into()))?;
        let on_hull = vertex
            .ve
            .iter()
            .all(|slot| slot.is_some_and(|e| self.edge(e).is_some_and(super::edge::Edge::is_hull_edge)));
        let pairs = if on_hull { n.saturating_sub(1) } else { n };
        let mut tris = Vec::with_capacity(pairs);
        for i in 0..pairs {
            let e0 = self.edge(edges[i]).unwrap();
            let e1 = self.edge(edges[(i + 1) % n]).unwrap();
            let common = e0
                .et
                .into_iter()
                .flatten()
                .find(|c| e1.et.contains(&Some(*c)))
                .ok_or_else(|| {
                    TerraError::InvariantViolation(
                        "get_vt: consecutive VE edges share no triangle".into(),
                    )
                })?;
            tris.push(common);
        }
        Ok(tris)
    }

    // ---- attach / detach -----------------------------------

    /// Links a freshly created triangle's `TE` edges back to it (`ET`), and
    /// seeds any still-empty `VE` slot on its vertices.
    fn attach_triangle(&mut self, t: TriangleId) -> TerraResult<()> {
        let (v0, v1, v2) = self.get_tv(t)?;
        let verts = [v0, v1, v2];
        let te = self.triangle(t).unwrap().te;
        for i in 0..3 {
            let a = verts[i];
            let b = verts[(i + 1) % 3];
            let e = te[i];
            let edge = self
                .edge_mut(e)
                .ok_or_else(|| TerraError::InvariantViolation("stale TE slot in attach".into()))?;
            // Triangle is to the left of a->b iff a->b matches ev[0]->ev[1].
            if edge.ev[0] == a && edge.ev[1] == b {
                edge.et[0] = Some(t);
            } else {
                edge.et[1] = Some(t);
            }
        }
        for &v in &verts {
            let vertex = self.vertex_mut(v).unwrap();
            if vertex.ve[0].is_none() {
                vertex.ve[0] = Some(te[0]);
            } else if vertex.ve[1].is_none() && vertex.ve[0] != Some(te[0]) {
                vertex.ve[1] = Some(te[0]);
            }
        }
        Ok(())
    }

    /// Clears every back-reference to `e` (its endpoints' `VE`, its
    /// adjacent triangles' `TE`), then frees the record. The caller must
    /// have already detached/freed both adjacent triangles.
    pub fn detach_edge(&mut self, e: EdgeId) {
        let Some(edge) = self.edge(e).cloned() else {
            return;
        };
        if edge.marks.has(Marks::CONSTRAINED) {
            for v in edge.ev {
                if let Some(vertex) = self.vertex_mut(v) {
                    vertex.n_inc_constr = vertex.n_inc_constr.saturating_sub(1);
                }
            }
        }
        for v in edge.ev {
            if let Some(vertex) = self.vertex_mut(v) {
                vertex.replace_ve(e, None);
            }
        }
        self.free_edge(e);
    }

    /// Pushes `e` onto the free list (or drops it if the free list is at
    /// capacity) and clears its slot.
    fn free_edge(&mut self, e: EdgeId) {
        self.edges[e.index()] = None;
        if self.free_edges.len() < self.free_list_capacity {
            self.free_edges.push(e);
        }
    }

    /// Detaches triangle `t`: clears the `ET` slot on each of its edges
    /// that still references it, spills its point bucket into `detached`,
    /// and frees the record.
    pub fn detach_triangle(
        &mut self,
        t: TriangleId,
        detached: &mut Vec<crate::mesh::bucket::BucketedPoint>,
    ) {
        let Some(mut tri) = self.triangles[t.index()].take() else {
            return;
        };
        detached.extend(tri.points.drain());
        for e in tri.te {
            if let Some(edge) = self.edge_mut(e) {
                for slot in &mut edge.et {
                    if *slot == Some(t) {
                        *slot = None;
                    }
                }
            }
        }
        if self.first_triangle == Some(t) {
            let next = self.triangle_ids().next();
            self.first_triangle = next;
        }
        if self.free_triangles.len() < self.free_list_capacity {
            self.free_triangles.push(t);
        }
        let _ = &mut tri; // dropped
    }

    // ---- debug invariants -----------------------------------------------

    /// Checks the store's global consistency invariants (arena
    /// cross-references, mark persistence, circumcircle caching). Intended
    /// for `debug_assert!` call sites and unit tests, not the hot path.
    ///
    /// # Errors
    /// Returns the first violated invariant found, as a descriptive
    /// [`TerraError::InvariantViolation`].
    pub fn debug_check_invariants(&self) -> TerraResult<()> {
        for t in self.triangle_ids() {
            let tri = self.triangle(t).unwrap();
            for &e in &tri.te {
                let edge = self
                    .edge(e)
                    .ok_or_else(|| TerraError::InvariantViolation(format!("triangle {t} references stale edge {e}")))?;
                if edge.et[0] != Some(t) && edge.et[1] != Some(t) {
                    return Err(TerraError::InvariantViolation(format!(
                        "edge {e} does not reference owning triangle {t}"
                    )));
                }
            }
            let (v0, v1, v2) = self.get_tv(t)?;
            if v0 == v1 || v1 == v2 || v0 == v2 {
                return Err(TerraError::InvariantViolation(format!(
                    "triangle {t} has repeated vertices"
                )));
            }
            let p0 = self.vertex(v0).unwrap().xy();
            let p1 = self.vertex(v1).unwrap().xy();
            let p2 = self.vertex(v2).unwrap().xy();
            if kernel::turn(p0, p1, p2, self.epsilon) == Turn::Right {
                return Err(TerraError::InvariantViolation(format!(
                    "triangle {t} is not CCW"
                )));
            }
        }
        for e in self.edge_ids() {
            let edge = self.edge(e).unwrap();
            match (edge.et[0], edge.et[1]) {
                (None, None) => {
                    return Err(TerraError::InvariantViolation(format!(
                        "edge {e} has no incident triangle on either side"
                    )));
                }
                (Some(a), Some(b)) => {
                    if a == b {
                        return Err(TerraError::InvariantViolation(format!(
                            "edge {e} references the same triangle on both sides"
                        )));
                    }
                }
                _ => {}
            }
        }
        let mut constrained_count = 0usize;
        for e in self.edge_ids() {
            if self.edge(e).unwrap().marks.has(Marks::CONSTRAINED) {
                constrained_count += 1;
            }
        }
        let n_inc: u32 = self.vertex_ids().map(|v| self.vertex(v).unwrap().n_inc_constr).sum();
        if n_inc as usize != 2 * constrained_count {
            return Err(TerraError::InvariantViolation(format!(
                "sum of n_inc_constr ({n_inc}) != 2 * constrained edge count ({constrained_count})"
            )));
        }
        Ok(())
    }
}

impl Default for MeshStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> (MeshStore, TriangleId) {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let b = store.new_vertex(1.0, 0.0, 0.0);
        let c = store.new_vertex(0.0, 1.0, 0.0);
        let e0 = store.new_edge(a, b);
        let e1 = store.new_edge(b, c);
        let e2 = store.new_edge(c, a);
        let t = store.new_triangle(e0, e1, e2).unwrap();
        (store, t)
    }

    #[test]
    fn new_triangle_is_ccw_regardless_of_input_order() {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let b = store.new_vertex(1.0, 0.0, 0.0);
        let c = store.new_vertex(0.0, 1.0, 0.0);
        // Provide edges so that the natural chain walk comes out CW.
        let e0 = store.new_edge(a, c);
        let e1 = store.new_edge(c, b);
        let e2 = store.new_edge(b, a);
        let t = store.new_triangle(e0, e1, e2).unwrap();
        let (v0, v1, v2) = store.get_tv(t).unwrap();
        let p0 = store.vertex(v0).unwrap().xy();
        let p1 = store.vertex(v1).unwrap().xy();
        let p2 = store.vertex(v2).unwrap().xy();
        assert_eq!(kernel::turn(p0, p1, p2, store.epsilon), Turn::Left);
    }

    #[test]
    fn attach_links_et_and_ve() {
        let (store, t) = unit_triangle();
        let (v0, _, _) = store.get_tv(t).unwrap();
        let vertex = store.vertex(v0).unwrap();
        assert!(vertex.ve[0].is_some());
        store.debug_check_invariants().unwrap();
    }

    #[test]
    fn detach_triangle_clears_et_and_spills_points() {
        let (mut store, t) = unit_triangle();
        let mut detached = Vec::new();
        store.detach_triangle(t, &mut detached);
        assert!(store.triangle(t).is_none());
        for e in store.edge_ids().collect::<Vec<_>>() {
            let edge = store.edge(e).unwrap();
            assert_ne!(edge.et[0], Some(t));
            assert_ne!(edge.et[1], Some(t));
        }
    }

    #[test]
    fn get_vt_returns_open_fan_for_hull_vertex() {
        let (store, t) = unit_triangle();
        let (v0, _, _) = store.get_tv(t).unwrap();
        let tris = store.get_vt(v0).unwrap();
        assert_eq!(tris, vec![t]);
    }

    #[test]
    fn edge_recycling_reuses_freed_slot() {
        let mut store = MeshStore::new();
        let a = store.new_vertex(0.0, 0.0, 0.0);
        let b = store.new_vertex(1.0, 0.0, 0.0);
        let e = store.new_edge(a, b);
        store.detach_edge(e);
        let c = store.new_vertex(2.0, 2.0, 0.0);
        let e2 = store.new_edge(a, c);
        assert_eq!(e2, e, "freed edge slot should be recycled");
    }
}
