//! Decimation driver: coarsens an already-built triangulation
//! by repeatedly removing the vertex whose incident triangles currently
//! carry the least detail.
//!
//! The removal priority is the max `own_error()` across a vertex's
//! incident triangles, ascending: a vertex embedded in an already-flat
//! region is cheap to remove, one near a ridge is not. This is a proxy for
//! the error a removal would introduce rather than a lookahead simulation
//! of it — exact lookahead would mean speculatively retriangulating every
//! candidate's neighborhood before picking one, which the ears algorithm
//! here does not support without committing the change.

use std::collections::HashSet;

use crate::constraint::can_remove_vertex;
use crate::driver::{created_triangle_records, relocate_point};
use crate::errors::TerraResult;
use crate::history::{HistoryKind, HistoryTracer, Norm, Termination};
use crate::index::bst::{OrderedIndex, OrderedKey};
use crate::influence::{remove_vertex, OkTriangleMode, RegionUpdate};
use crate::mesh::{MeshStore, VertexId};

/// Options governing which vertices are eligible for removal.
#[derive(Debug, Clone, Copy)]
pub struct DecimateConfig {
    /// A vertex incident on more triangles than this is never removed
    /// (bounds the cost of the resulting ear-clip).
    pub max_degree: usize,
    /// Allow removing a vertex incident on exactly one constraint edge,
    /// shortening the feature it belongs to.
    pub allow_features_del: bool,
    /// Allow removing a vertex incident on exactly two constraint edges,
    /// breaking a constraint chain in two.
    pub allow_chain_brk: bool,
    /// Remove a greedily chosen independent set of vertices per step
    /// instead of one at a time.
    pub simultaneous: bool,
}

/// Drives decimation of an existing triangulation to completion, one
/// vertex removal (or batch of them) at a time.
pub struct DecimateDriver {
    store: MeshStore,
    history: HistoryTracer,
    config: DecimateConfig,
    candidates: OrderedIndex<VertexId>,
}

impl DecimateDriver {
    /// Wraps an existing triangulation, scanning every vertex for
    /// removability under `config` and seeding the candidate queue.
    ///
    /// # Errors
    ///
    /// Propagates a mesh-traversal failure encountered while scanning.
    pub fn build(store: MeshStore, config: DecimateConfig, norm: Norm, termination: Termination) -> TerraResult<Self> {
        let mut candidates = OrderedIndex::new();
        for v in store.vertex_ids().collect::<Vec<_>>() {
            if is_removable(&store, v, &config) {
                candidates.insert(removal_key(&store, v)?, v);
            }
        }
        let all_triangles: Vec<_> = store.triangle_ids().collect();
        let initial = created_triangle_records(&store, &all_triangles)?;
        let mut history = HistoryTracer::new(HistoryKind::Coarsening, norm, termination);
        history.record_initial(&initial);
        Ok(Self { store, history, config, candidates })
    }

    /// Removes the single cheapest remaining candidate, returning `false`
    /// once termination is reached or no candidate remains.
    ///
    /// # Errors
    ///
    /// Propagates a mesh-traversal failure from a successful removal's
    /// bookkeeping. A candidate that turns out not to be removable (its
    /// neighborhood changed since it was queued) is silently dropped.
    pub fn step(&mut self) -> TerraResult<bool> {
        loop {
            if self.history.should_terminate() {
                return Ok(false);
            }
            let Some((_, v)) = self.candidates.remove_min() else {
                return Ok(false);
            };
            if self.store.vertex(v).is_none() {
                continue;
            }
            match remove_vertex(&mut self.store, v, OkTriangleMode::Decimation, self.config.allow_chain_brk) {
                Ok(mut update) => {
                    self.absorb(&mut update)?;
                    return Ok(true);
                }
                Err(_) => continue,
            }
        }
    }

    /// Removes a greedily chosen independent set of candidates in one
    /// pass when `config.simultaneous`, otherwise behaves like
    /// [`Self::step`]. Returns the number of vertices actually removed.
    ///
    /// # Errors
    ///
    /// Propagates a mesh-traversal failure from a successful removal's
    /// bookkeeping.
    pub fn step_batch(&mut self) -> TerraResult<usize> {
        if !self.config.simultaneous {
            return Ok(usize::from(self.step()?));
        }
        if self.history.should_terminate() {
            return Ok(0);
        }

        let mut locked: HashSet<VertexId> = HashSet::new();
        let mut batch: Vec<VertexId> = Vec::new();
        let mut scratch = self.candidates.clone();
        while let Some((_, v)) = scratch.remove_min() {
            if locked.contains(&v) {
                continue;
            }
            if let Ok(tris) = self.store.get_vt(v) {
                for t in tris {
                    if let Ok((a, b, c)) = self.store.get_tv(t) {
                        locked.insert(a);
                        locked.insert(b);
                        locked.insert(c);
                    }
                }
            }
            batch.push(v);
        }

        let mut removed = 0usize;
        for v in batch {
            if self.history.should_terminate() {
                break;
            }
            if self.store.vertex(v).is_none() || !self.candidates.is_in(&v) {
                continue;
            }
            self.candidates.remove_value(v);
            if let Ok(mut update) = remove_vertex(&mut self.store, v, OkTriangleMode::Decimation, self.config.allow_chain_brk) {
                self.absorb(&mut update)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn absorb(&mut self, update: &mut RegionUpdate) -> TerraResult<()> {
        let detached = std::mem::take(&mut update.detached_points);
        for bp in detached {
            relocate_point(&mut self.store, bp)?;
        }
        let created = created_triangle_records(&self.store, &update.created_triangles)?;
        self.history.record_update(&update.deleted_errors, &created);
        self.refresh_candidates(update)
    }

    fn refresh_candidates(&mut self, update: &RegionUpdate) -> TerraResult<()> {
        let mut seen = HashSet::new();
        for &t in &update.created_triangles {
            let (v0, v1, v2) = self.store.get_tv(t)?;
            for v in [v0, v1, v2] {
                if seen.insert(v) {
                    self.candidates.remove_value(v);
                    if is_removable(&self.store, v, &self.config) {
                        self.candidates.insert(removal_key(&self.store, v)?, v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Steps until termination or the candidate pool is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the first error any [`Self::step_batch`] call returns.
    pub fn run_to_completion(&mut self) -> TerraResult<()> {
        while self.step_batch()? > 0 {}
        Ok(())
    }

    /// The tracer recording this decimation's update sequence.
    #[must_use]
    pub const fn history(&self) -> &HistoryTracer {
        &self.history
    }

    /// The triangulation as coarsened so far.
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

fn is_removable(store: &MeshStore, v: VertexId, config: &DecimateConfig) -> bool {
    let Ok(degree) = store.get_vt(v).map(|t| t.len()) else {
        return false;
    };
    degree <= config.max_degree && can_remove_vertex(store, v, config.allow_features_del, config.allow_chain_brk)
}

fn removal_key(store: &MeshStore, v: VertexId) -> TerraResult<OrderedKey> {
    let tris = store.get_vt(v)?;
    let error = tris
        .iter()
        .map(|&t| store.triangle(t).unwrap().own_error())
        .fold(0.0_f64, f64::max);
    let vertex = store.vertex(v).unwrap();
    Ok(OrderedKey::new(error, vertex.x, vertex.y, vertex.z))
}
