//! Refinement driver: builds the hull, distributes the rest of
//! the input into point buckets, and repeatedly inserts the next candidate
//! until [`HistoryTracer::should_terminate`] says to stop.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::driver::{created_triangle_records, relocate_point, InputPoint, InputSegment};
use crate::errors::{TerraError, TerraResult};
use crate::geometry::kernel::{self, Turn};
use crate::history::{HistoryKind, HistoryTracer, Norm, Termination};
use crate::index::bst::{OrderedIndex, OrderedKey};
use crate::mesh::bucket::BucketedPoint;
use crate::mesh::ids::PointId;
use crate::mesh::{MeshStore, VertexId};
use crate::{constraint, influence};

/// Options governing how a refinement is built and driven.
#[derive(Debug, Clone, Copy)]
pub struct RefineConfig {
    /// Honor `segments` as CDT constraints rather than ignoring them.
    pub constrained: bool,
    /// Insert non-hull points in a fixed random order instead of picking
    /// the globally worst point each step.
    pub random: bool,
    /// Norm used to aggregate per-triangle error into a stopping signal.
    pub norm: Norm,
    /// When to stop requesting further updates.
    pub termination: Termination,
    /// Seed for the random insertion order; irrelevant when `random` is
    /// false.
    pub seed: u64,
}

#[derive(Debug)]
enum Selection {
    Random(Vec<InputPoint>),
    ErrorDriven {
        index: OrderedIndex<PointId>,
        coords: HashMap<PointId, (f64, f64, f64)>,
    },
}

impl Selection {
    fn pop(&mut self) -> Option<InputPoint> {
        match self {
            Self::Random(stack) => stack.pop(),
            Self::ErrorDriven { index, coords } => {
                let (_, pid) = index.remove_max()?;
                let (x, y, z) = coords.remove(&pid).expect("indexed point missing its coords");
                Some(InputPoint { pid, x, y, z })
            }
        }
    }

    fn push(&mut self, p: InputPoint, error: f64) {
        if let Self::ErrorDriven { index, coords } = self {
            index.insert(OrderedKey::new(error, p.x, p.y, p.z), p.pid);
            coords.insert(p.pid, (p.x, p.y, p.z));
        }
    }
}

/// Drives a single refinement from a fixed input point set to completion,
/// one influence-region update at a time.
#[derive(Debug)]
pub struct RefineDriver {
    store: MeshStore,
    history: HistoryTracer,
    selection: Selection,
    vertex_of: HashMap<PointId, VertexId>,
}

impl RefineDriver {
    /// Builds the convex hull, triangulates it, distributes every other
    /// point into the hull triangles' and edges' buckets, and — if
    /// `config.constrained` — inserts `segments` as CDT constraints.
    ///
    /// # Errors
    ///
    /// Returns [`TerraError::AllPointsAligned`] if fewer than three points
    /// are given or every point is collinear, or propagates a constraint
    /// rejection or mesh-traversal failure.
    pub fn build(points: &[InputPoint], segments: &[InputSegment], config: &RefineConfig) -> TerraResult<Self> {
        if points.len() < 3 {
            return Err(TerraError::AllPointsAligned);
        }
        let hull_order = convex_hull(points, kernel::DEFAULT_EPSILON);
        if hull_order.len() < 3 {
            return Err(TerraError::AllPointsAligned);
        }
        let hull_set: HashSet<PointId> = hull_order.iter().map(|p| p.pid).collect();

        let mut store = MeshStore::new();
        let mut vertex_of: HashMap<PointId, VertexId> = HashMap::new();

        let v0 = store.new_vertex(hull_order[0].x, hull_order[0].y, hull_order[0].z);
        let v1 = store.new_vertex(hull_order[1].x, hull_order[1].y, hull_order[1].z);
        let v2 = store.new_vertex(hull_order[2].x, hull_order[2].y, hull_order[2].z);
        vertex_of.insert(hull_order[0].pid, v0);
        vertex_of.insert(hull_order[1].pid, v1);
        vertex_of.insert(hull_order[2].pid, v2);
        let e01 = store.new_edge(v0, v1);
        let e12 = store.new_edge(v1, v2);
        let e20 = store.new_edge(v2, v0);
        store.new_triangle(e01, e12, e20)?;

        for h in &hull_order[3..] {
            let seed = store.first_triangle.unwrap();
            let (v, _update) = influence::insert_point(&mut store, seed, h.x, h.y, h.z)?;
            vertex_of.insert(h.pid, v);
        }

        let mut selection = if config.random {
            let mut rest: Vec<InputPoint> = points.iter().copied().filter(|p| !hull_set.contains(&p.pid)).collect();
            let mut rng = StdRng::seed_from_u64(config.seed);
            rest.shuffle(&mut rng);
            Selection::Random(rest)
        } else {
            Selection::ErrorDriven {
                index: OrderedIndex::new(),
                coords: HashMap::new(),
            }
        };

        for p in points.iter().filter(|p| !hull_set.contains(&p.pid)) {
            let bp = BucketedPoint {
                pid: p.pid,
                x: p.x,
                y: p.y,
                z: p.z,
                error: 0.0,
            };
            if let Some(error) = relocate_point(&mut store, bp)? {
                selection.push(*p, error);
            }
        }

        if config.constrained {
            for seg in segments {
                let va = *vertex_of
                    .get(&seg.a)
                    .ok_or_else(|| TerraError::ConstraintRejected { reason: "segment references an unplaced point".into() })?;
                let vb = *vertex_of
                    .get(&seg.b)
                    .ok_or_else(|| TerraError::ConstraintRejected { reason: "segment references an unplaced point".into() })?;
                constraint::add_constraint(&mut store, va, vb)?;
            }
        }

        let all_triangles: Vec<_> = store.triangle_ids().collect();
        let initial = created_triangle_records(&store, &all_triangles)?;
        let mut history = HistoryTracer::new(HistoryKind::Refining, config.norm, config.termination);
        history.record_initial(&initial);

        Ok(Self { store, history, selection, vertex_of })
    }

    /// Performs one refinement update (one point insertion), returning
    /// `false` once termination is reached or no candidate points remain.
    ///
    /// # Errors
    ///
    /// Propagates any mesh-traversal failure. A duplicate point among the
    /// pending candidates is logged and skipped, not an error.
    pub fn step(&mut self) -> TerraResult<bool> {
        loop {
            if self.history.should_terminate() {
                return Ok(false);
            }
            let Some(next) = self.selection.pop() else {
                return Ok(false);
            };
            let seed = self.store.first_triangle.unwrap();
            match influence::insert_point(&mut self.store, seed, next.x, next.y, next.z) {
                Ok((v, mut update)) => {
                    self.vertex_of.insert(next.pid, v);
                    let detached = std::mem::take(&mut update.detached_points);
                    for bp in detached {
                        if let Some(error) = relocate_point(&mut self.store, bp)? {
                            self.selection.push(InputPoint { pid: bp.pid, x: bp.x, y: bp.y, z: bp.z }, error);
                        }
                    }
                    let created = created_triangle_records(&self.store, &update.created_triangles)?;
                    self.history.record_update(&update.deleted_errors, &created);
                    return Ok(true);
                }
                Err(TerraError::DuplicatePoint { x, y }) => {
                    log::warn!("duplicate point at ({x}, {y}) during refinement, skipping");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Steps until termination or the candidate pool is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the first error any [`Self::step`] call returns.
    pub fn run_to_completion(&mut self) -> TerraResult<()> {
        while self.step()? {}
        Ok(())
    }

    /// The tracer recording this refinement's update sequence.
    #[must_use]
    pub const fn history(&self) -> &HistoryTracer {
        &self.history
    }

    /// The triangulation built so far.
    #[must_use]
    pub const fn store(&self) -> &MeshStore {
        &self.store
    }

    /// Consumes the driver, handing back its mesh and history.
    #[must_use]
    pub fn into_parts(self) -> (MeshStore, HistoryTracer) {
        (self.store, self.history)
    }
}

/// Andrew's monotone chain, built on [`kernel::turn`] so it shares the same
/// orientation predicate as the rest of the triangulator. Collinear hull
/// points are dropped (kept as ordinary interior points instead): the
/// initial triangle only needs three points that are not all aligned, and
/// the monotone chain already gives us that for free.
fn convex_hull(points: &[InputPoint], eps: f64) -> Vec<InputPoint> {
    let mut sorted: Vec<InputPoint> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps);

    fn half(pts: &[InputPoint], eps: f64) -> Vec<InputPoint> {
        let mut hull: Vec<InputPoint> = Vec::new();
        for &p in pts {
            while hull.len() >= 2 {
                let a = hull[hull.len() - 2].xy();
                let b = hull[hull.len() - 1].xy();
                if kernel::turn(a, b, p.xy(), eps) == Turn::Left {
                    break;
                }
                hull.pop();
            }
            hull.push(p);
        }
        hull
    }

    let lower = half(&sorted, eps);
    let mut rev = sorted;
    rev.reverse();
    let upper = half(&rev, eps);

    let mut hull = lower;
    hull.pop();
    let mut upper = upper;
    upper.pop();
    hull.extend(upper);
    hull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: i64) -> Vec<InputPoint> {
        let mut pts = Vec::new();
        let mut pid = 0u32;
        for i in 0..=n {
            for j in 0..=n {
                pts.push(InputPoint {
                    pid: PointId(pid),
                    x: i as f64,
                    y: j as f64,
                    z: ((i * j) as f64).sin(),
                });
                pid += 1;
            }
        }
        pts
    }

    fn cfg(termination: Termination, random: bool) -> RefineConfig {
        RefineConfig {
            constrained: false,
            random,
            norm: Norm::Max,
            termination,
            seed: 7,
        }
    }

    #[test]
    fn builds_a_valid_hull_triangulation_from_a_grid() {
        let pts = grid(4);
        let driver = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(Some(0)), false)).unwrap();
        driver.store().debug_check_invariants().unwrap();
        assert!(driver.store().vertex_count() >= 4);
    }

    #[test]
    fn error_driven_refinement_converges_to_zero_error() {
        let pts = grid(3);
        let mut driver = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(None), false)).unwrap();
        driver.run_to_completion().unwrap();
        driver.store().debug_check_invariants().unwrap();
        assert!(driver.history().total_error() < 1e-9);
        assert_eq!(driver.store().vertex_count(), pts.len());
    }

    #[test]
    fn random_refinement_also_inserts_every_point() {
        let pts = grid(3);
        let mut driver = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(None), true)).unwrap();
        driver.run_to_completion().unwrap();
        driver.store().debug_check_invariants().unwrap();
        assert_eq!(driver.store().vertex_count(), pts.len());
    }

    #[test]
    fn update_count_termination_stops_early() {
        let pts = grid(4);
        let mut driver = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(Some(3)), false)).unwrap();
        driver.run_to_completion().unwrap();
        assert_eq!(driver.history().update_count(), 3);
    }

    #[test]
    fn fewer_than_three_points_is_rejected() {
        let pts = vec![
            InputPoint { pid: PointId(0), x: 0.0, y: 0.0, z: 0.0 },
            InputPoint { pid: PointId(1), x: 1.0, y: 0.0, z: 0.0 },
        ];
        let err = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(None), false)).unwrap_err();
        assert_eq!(err, TerraError::AllPointsAligned);
    }

    #[test]
    fn all_collinear_points_are_rejected() {
        let pts = (0..5)
            .map(|i| InputPoint { pid: PointId(i), x: f64::from(i), y: 0.0, z: 0.0 })
            .collect::<Vec<_>>();
        let err = RefineDriver::build(&pts, &[], &cfg(Termination::UpdateCount(None), false)).unwrap_err();
        assert_eq!(err, TerraError::AllPointsAligned);
    }
}
