//! MT history tracer.
//!
//! Records one atomic update per call — a deletion set and a creation set
//! of triangles, the latter carrying each new triangle's three vertices and
//! its scalar error — and maintains the running global error under the
//! configured norm plus the termination predicate the driver consults
//! before every step.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mesh::VertexId;

/// A serializable snapshot of a [`HistoryTracer`], for reporting run
/// results alongside (or instead of) the output triangulation file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Whether the run refined or coarsened.
    pub kind: HistoryKind,
    /// Number of updates applied.
    pub update_count: u64,
    /// Final global error under the configured norm.
    pub total_error: f64,
}

/// How the global error of the whole triangulation is aggregated from
/// per-triangle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    /// The maximum per-triangle error.
    Max,
    /// The mean per-triangle error.
    Med,
    /// The root-mean-square per-triangle error.
    Sqm,
}

/// Whether the MT being built refines (adds detail) or coarsens (removes
/// it). Declared once at construction and propagated into the emitted
/// file; here it also selects which side of `errorLevel`
/// terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    /// Refinement: error decreases update over update.
    Refining,
    /// Decimation: error increases update over update.
    Coarsening,
}

/// The driver's termination predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Termination {
    /// Stop after this many updates. `None` means "all" (`numUpd = -1`):
    /// never stop on count, rely on the driver running out of candidates.
    UpdateCount(Option<u32>),
    /// Stop once `total_error` crosses `errorLevel`, in the direction
    /// dictated by [`HistoryKind`].
    ErrorLevel(f64),
}

/// One new triangle recorded by an update, as the MT library would store
/// it: its three vertices and its scalar error (no topology — topology is
/// reconstructed from the deletion/creation sets across the whole history).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatedTriangle {
    /// The triangle's three vertices.
    pub vertices: [VertexId; 3],
    /// The triangle's error (max of its own head and its three edges'
    /// heads).
    pub error: f64,
}

/// An f64 wrapped for `Ord`, used as the key of the MAX-norm multiset.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ErrKey(f64);
impl Eq for ErrKey {}
impl PartialOrd for ErrKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ErrKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Records the update sequence and maintains the running global error.
#[derive(Debug, Clone)]
pub struct HistoryTracer {
    kind: HistoryKind,
    norm: Norm,
    termination: Termination,
    n_upd: u64,
    n_triangles: u64,
    mean: f64,
    mean_sq: f64,
    max_multiset: BTreeMap<ErrKey, u32>,
}

impl HistoryTracer {
    /// Creates a tracer with no triangles recorded yet.
    #[must_use]
    pub fn new(kind: HistoryKind, norm: Norm, termination: Termination) -> Self {
        Self {
            kind,
            norm,
            termination,
            n_upd: 0,
            n_triangles: 0,
            mean: 0.0,
            mean_sq: 0.0,
            max_multiset: BTreeMap::new(),
        }
    }

    /// Number of updates recorded so far (excludes the initial
    /// triangulation).
    #[must_use]
    pub const fn update_count(&self) -> u64 {
        self.n_upd
    }

    /// The history's declared direction.
    #[must_use]
    pub const fn kind(&self) -> HistoryKind {
        self.kind
    }

    fn add_triangle(&mut self, error: f64) {
        let n = self.n_triangles;
        self.mean = (self.mean * n as f64 + error) / (n as f64 + 1.0);
        self.mean_sq = (self.mean_sq * n as f64 + error * error) / (n as f64 + 1.0);
        self.n_triangles += 1;
        *self.max_multiset.entry(ErrKey(error)).or_insert(0) += 1;
    }

    fn remove_triangle(&mut self, error: f64) {
        let n = self.n_triangles;
        if n <= 1 {
            self.mean = 0.0;
            self.mean_sq = 0.0;
        } else {
            self.mean = (self.mean * n as f64 - error) / (n as f64 - 1.0);
            self.mean_sq = (self.mean_sq * n as f64 - error * error) / (n as f64 - 1.0);
        }
        self.n_triangles = self.n_triangles.saturating_sub(1);
        if let Some(count) = self.max_multiset.get_mut(&ErrKey(error)) {
            *count -= 1;
            if *count == 0 {
                self.max_multiset.remove(&ErrKey(error));
            }
        }
    }

    /// Records the initial triangulation. Counts as the bottom of the MT,
    /// not as an update (`n_upd` is unaffected).
    pub fn record_initial(&mut self, created: &[CreatedTriangle]) {
        for t in created {
            self.add_triangle(t.error);
        }
    }

    /// Records one atomic update: `deleted_errors` are the errors of the
    /// triangles removed, `created` the triangles added. Increments
    /// `n_upd`.
    pub fn record_update(&mut self, deleted_errors: &[f64], created: &[CreatedTriangle]) {
        for &e in deleted_errors {
            self.remove_triangle(e);
        }
        for t in created {
            self.add_triangle(t.error);
        }
        self.n_upd += 1;
    }

    /// The current global error under the configured norm.
    #[must_use]
    pub fn total_error(&self) -> f64 {
        match self.norm {
            Norm::Max => self
                .max_multiset
                .keys()
                .next_back()
                .map_or(0.0, |k| k.0),
            Norm::Med => self.mean,
            Norm::Sqm => self.mean_sq.max(0.0).sqrt(),
        }
    }

    /// A serializable snapshot of this tracer's current state.
    #[must_use]
    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            kind: self.kind,
            update_count: self.n_upd,
            total_error: self.total_error(),
        }
    }

    /// True if the driver should stop requesting further updates.
    #[must_use]
    pub fn should_terminate(&self) -> bool {
        match self.termination {
            Termination::UpdateCount(Some(target)) => u64::from(target) <= self.n_upd,
            Termination::UpdateCount(None) => false,
            Termination::ErrorLevel(level) => match self.kind {
                HistoryKind::Refining => self.total_error() <= level,
                HistoryKind::Coarsening => self.total_error() >= level,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct(error: f64) -> CreatedTriangle {
        CreatedTriangle {
            vertices: [VertexId(0), VertexId(1), VertexId(2)],
            error,
        }
    }

    #[test]
    fn max_norm_tracks_running_maximum() {
        let mut h = HistoryTracer::new(HistoryKind::Refining, Norm::Max, Termination::UpdateCount(None));
        h.record_initial(&[ct(1.0), ct(5.0), ct(2.0)]);
        assert_eq!(h.total_error(), 5.0);
        h.record_update(&[5.0], &[ct(0.5), ct(0.3)]);
        assert_eq!(h.total_error(), 2.0);
    }

    #[test]
    fn med_norm_matches_recomputation_from_scratch() {
        let mut h = HistoryTracer::new(HistoryKind::Refining, Norm::Med, Termination::UpdateCount(None));
        let mut live = vec![1.0, 2.0, 3.0, 4.0];
        h.record_initial(&live.iter().map(|&e| ct(e)).collect::<Vec<_>>());
        for step in 0..200 {
            let removed = live.remove(step % live.len().max(1));
            let added = (step as f64).sin().abs() * 3.0;
            live.push(added);
            h.record_update(&[removed], &[ct(added)]);
            let recomputed: f64 = live.iter().sum::<f64>() / live.len() as f64;
            assert!(
                (h.total_error() - recomputed).abs() < 1e-6,
                "blended mean drifted at step {step}"
            );
        }
    }

    #[test]
    fn summary_reflects_recorded_updates() {
        let mut h = HistoryTracer::new(HistoryKind::Coarsening, Norm::Max, Termination::UpdateCount(None));
        h.record_initial(&[ct(1.0), ct(2.0)]);
        h.record_update(&[1.0], &[ct(3.0)]);
        let summary = h.summary();
        assert_eq!(summary.kind, HistoryKind::Coarsening);
        assert_eq!(summary.update_count, 1);
        assert_eq!(summary.total_error, 3.0);
    }

    #[test]
    fn termination_count_mode() {
        let mut h = HistoryTracer::new(
            HistoryKind::Refining,
            Norm::Max,
            Termination::UpdateCount(Some(2)),
        );
        assert!(!h.should_terminate());
        h.record_update(&[], &[ct(1.0)]);
        assert!(!h.should_terminate());
        h.record_update(&[], &[ct(1.0)]);
        assert!(h.should_terminate());
    }

    #[test]
    fn termination_error_mode_refining() {
        let mut h = HistoryTracer::new(
            HistoryKind::Refining,
            Norm::Max,
            Termination::ErrorLevel(0.01),
        );
        h.record_initial(&[ct(1.0)]);
        assert!(!h.should_terminate());
        h.record_update(&[1.0], &[ct(0.005)]);
        assert!(h.should_terminate());
    }
}
